// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use datachat_app::{
    ApiError, ChatPayload, ChatReply, ColumnsResponse, ConnectResponse, EMPTY_QUERY_MESSAGE,
    EMPTY_TABLE_NAME, TablesResponse,
};
use reqwest::StatusCode;
use reqwest::blocking::{Client as HttpClient, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Option<Duration>,
    http: HttpClient,
}

impl Client {
    /// `timeout: None` leaves calls pending until the backend answers.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("backend.base_url must not be empty");
        }
        let base_url =
            Url::parse(trimmed).with_context(|| format!("parse backend url {trimmed:?}"))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            bail!(
                "backend.base_url {trimmed:?} must use http or https, got {:?}",
                base_url.scheme()
            );
        }
        if base_url.cannot_be_a_base() {
            bail!("backend.base_url {trimmed:?} cannot carry a path");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn connect(&self) -> Result<ConnectResponse, ApiError> {
        let url = self.endpoint(&["connect"])?;
        self.execute(self.http.post(url))
    }

    pub fn list_tables(&self) -> Result<TablesResponse, ApiError> {
        let url = self.endpoint(&["tables"])?;
        self.execute(self.http.get(url))
    }

    pub fn list_columns(&self, table: &str) -> Result<ColumnsResponse, ApiError> {
        if table.trim().is_empty() {
            return Err(ApiError::new(EMPTY_TABLE_NAME));
        }
        let url = self.endpoint(&["tables", table, "columns"])?;
        self.execute(self.http.get(url))
    }

    pub fn send_chat_message(&self, session_id: &str, message: &str) -> Result<ChatReply, ApiError> {
        if message.trim().is_empty() {
            return Err(ApiError::new(EMPTY_QUERY_MESSAGE));
        }
        let url = self.endpoint(&["chat"])?;
        let payload = ChatPayload {
            session_id,
            message,
        };
        let body: serde_json::Value = self.execute(self.http.post(url).json(&payload))?;
        Ok(ChatReply::from_value(body))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::new(format!("invalid backend url {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let request = request
            .build()
            .map_err(|error| ApiError::new(format!("build request: {error}")))?;
        let url = request.url().path().to_owned();
        tracing::debug!(method = %request.method(), path = %url, "backend request");
        let response = self
            .http
            .execute(request)
            .map_err(|error| self.send_error(&url, &error))?;

        let status = response.status();
        tracing::debug!(status = status.as_u16(), path = %url, "backend responded");

        let body = match response.bytes() {
            Ok(body) => body,
            Err(error) if error.is_timeout() => return Err(self.send_error(&url, &error)),
            Err(error) => {
                let failure = ApiError::new(format!("read response body: {error}"));
                tracing::warn!(path = %url, detail = %failure.detail, "backend request failed");
                return Err(failure);
            }
        };

        if !status.is_success() {
            let failure = error_response(status, &body);
            tracing::warn!(
                status = status.as_u16(),
                path = %url,
                detail = %failure.detail,
                "backend request failed"
            );
            return Err(failure);
        }

        serde_json::from_slice(&body).map_err(|error| {
            tracing::warn!(path = %url, %error, "decode backend response");
            ApiError::unparsable_body()
        })
    }

    fn send_error(&self, path: &str, error: &reqwest::Error) -> ApiError {
        match self.timeout {
            Some(limit) if error.is_timeout() => {
                let failure = ApiError::new(format!("request to {path} timed out after {limit:?}"));
                tracing::warn!(detail = %failure.detail, "backend request timed out");
                failure
            }
            _ => connection_error(self.base_url(), error),
        }
    }
}

fn connection_error(base_url: &str, error: &reqwest::Error) -> ApiError {
    let failure = ApiError::new(format!(
        "cannot reach {base_url} -- is the backend running? ({error})"
    ));
    tracing::warn!(detail = %failure.detail, "backend unreachable");
    failure
}

fn error_response(status: StatusCode, body: &[u8]) -> ApiError {
    let Ok(parsed) = serde_json::from_slice::<serde_json::Value>(body) else {
        return ApiError::status(status.as_u16());
    };
    match parsed.get("detail").and_then(serde_json::Value::as_str) {
        Some(detail) if !detail.trim().is_empty() => ApiError::new(detail),
        _ => ApiError::unknown(),
    }
}
