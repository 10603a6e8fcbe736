// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use datachat_app::{DEFAULT_GREETING, DEFAULT_SESSION_ID};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const APP_NAME: &str = "datachat";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_LOG_LEVEL: &str = "info";
const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            backend: Backend::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
    pub session_id: Option<String>,
}

impl Default for Backend {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: None,
            session_id: Some(DEFAULT_SESSION_ID.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub greeting: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            greeting: Some(DEFAULT_GREETING.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub enabled: Option<bool>,
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            enabled: Some(true),
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("DATACHAT_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set DATACHAT_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and place values under [backend], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.backend.base_url {
            validate_base_url(base_url)
                .with_context(|| format!("backend.base_url in {}", path.display()))?;
        }

        if let Some(timeout) = &self.backend.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "backend.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(session_id) = &self.backend.session_id
            && session_id.trim().is_empty()
        {
            bail!("backend.session_id in {} must not be empty", path.display());
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.as_str())
        {
            bail!(
                "log.level in {} must be one of {}, got {:?}",
                path.display(),
                LOG_LEVELS.join("/"),
                level
            );
        }

        Ok(())
    }

    pub fn override_base_url(&mut self, base_url: &str) -> Result<()> {
        validate_base_url(base_url).context("--base-url")?;
        self.backend.base_url = Some(base_url.to_owned());
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.backend
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.backend.timeout.as_deref().map(parse_duration).transpose()
    }

    pub fn session_id(&self) -> &str {
        self.backend
            .session_id
            .as_deref()
            .unwrap_or(DEFAULT_SESSION_ID)
    }

    pub fn greeting(&self) -> Option<&str> {
        self.ui
            .greeting
            .as_deref()
            .filter(|greeting| !greeting.trim().is_empty())
    }

    pub fn log_enabled(&self) -> bool {
        self.log.enabled.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_local_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to an absolute path")
        })?;
        Ok(data_root.join(APP_NAME).join("datachat.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# datachat config\n# Place this file at: {}\n\nversion = 1\n\n[backend]\nbase_url = \"{}\"\n# Optional. Unset means requests wait for the backend indefinitely.\n# timeout = \"60s\"\nsession_id = \"{}\"\n\n[ui]\n# Empty string disables the opening message.\ngreeting = \"{}\"\n\n[log]\nenabled = true\nlevel = \"{}\"\n# Optional. Default is the platform data dir (for example ~/.local/share/datachat/datachat.log)\n# file = \"/absolute/path/to/datachat.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_SESSION_ID,
            DEFAULT_GREETING,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn validate_base_url(raw: &str) -> Result<()> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("invalid URL {raw:?}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("URL {raw:?} must use http or https");
    }
    Ok(())
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        let Some(secs) = mins.checked_mul(60) else {
            bail!("timeout duration {raw:?} is too large");
        };
        return Ok(Duration::from_secs(secs));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 30s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.session_id(), "default_session");
        assert_eq!(config.timeout()?, None);
        assert_eq!(config.greeting(), Some("Hello! How can I help you today?"));
        assert!(config.log_enabled());
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[backend]\nbase_url=\"http://db:8000\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[backend], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[backend]\nbase_url = \"https://agent.internal:9000/\"\ntimeout = \"500ms\"\nsession_id = \"analyst\"\n[ui]\ngreeting = \"\"\n[log]\nenabled = false\nlevel = \"debug\"\nfile = \"/tmp/datachat-test.log\"\n",
        )?;
        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "https://agent.internal:9000");
        assert_eq!(config.timeout()?, Some(Duration::from_millis(500)));
        assert_eq!(config.session_id(), "analyst");
        assert_eq!(config.greeting(), None);
        assert!(!config.log_enabled());
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_path()?, PathBuf::from("/tmp/datachat-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn non_http_base_url_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nbase_url = \"ftp://db\"\n")?;
        let error = Config::load(&path).expect_err("ftp url should fail");
        assert!(format!("{error:#}").contains("must use http or https"));
        Ok(())
    }

    #[test]
    fn blank_session_and_bad_log_level_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\nsession_id = \"  \"\n")?;
        let error = Config::load(&path).expect_err("blank session should fail");
        assert!(error.to_string().contains("must not be empty"));

        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("bad level should fail");
        assert!(error.to_string().contains("log.level"));
        Ok(())
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[backend]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn override_base_url_validates() -> Result<()> {
        let mut config = Config::default();
        config.override_base_url("http://10.0.0.5:8000")?;
        assert_eq!(config.base_url(), "http://10.0.0.5:8000");
        assert!(config.override_base_url("not a url").is_err());
        assert_eq!(config.base_url(), "http://10.0.0.5:8000");
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("DATACHAT_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("DATACHAT_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        assert!(parse_duration("oops").is_err());
        Ok(())
    }

    #[test]
    fn oversized_minutes_are_rejected_without_overflow() -> Result<()> {
        let error = parse_duration(&format!("{}m", u64::MAX)).expect_err("overflow should fail");
        assert!(error.to_string().contains("too large"));

        let (_temp, path) = write_config(&format!(
            "version = 1\n[backend]\ntimeout = \"{}m\"\n",
            u64::MAX / 2
        ))?;
        let error = Config::load(&path).expect_err("huge timeout should fail");
        assert!(error.to_string().contains("too large"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, Config::example_config(&path))?;
        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.session_id(), "default_session");
        Ok(())
    }
}
