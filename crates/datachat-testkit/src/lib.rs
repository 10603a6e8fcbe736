// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Loopback HTTP backend that answers a fixed script of requests and records
//! what it received, for exercising the real client against real sockets.

use anyhow::{Context, Result, anyhow, bail};
use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

const SCRIPT_WAIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub content_type: &'static str,
    pub delay: Duration,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "application/json",
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            content_type: "text/plain",
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn body_json(&self) -> Result<serde_json::Value> {
        serde_json::from_str(&self.body)
            .with_context(|| format!("decode request body {:?}", self.body))
    }
}

pub struct MockBackend {
    base_url: String,
    server: Arc<Server>,
    handle: Option<JoinHandle<Result<Vec<RecordedRequest>>>>,
}

impl MockBackend {
    pub fn serve(script: Vec<MockResponse>) -> Result<Self> {
        Self::serve_with_wait(script, SCRIPT_WAIT)
    }

    pub fn serve_with_wait(script: Vec<MockResponse>, wait: Duration) -> Result<Self> {
        let server = Server::http("127.0.0.1:0")
            .map_err(|error| anyhow!("start mock backend: {error}"))?;
        let server = Arc::new(server);
        let base_url = format!("http://{}", server.server_addr());

        let worker = Arc::clone(&server);
        let handle = thread::spawn(move || {
            let mut recorded = Vec::with_capacity(script.len());
            let expected = script.len();
            for (index, scripted) in script.into_iter().enumerate() {
                let Some(mut request) = worker
                    .recv_timeout(wait)
                    .context("receive mock request")?
                else {
                    bail!(
                        "mock backend got {index} of {expected} scripted requests; none arrived within {wait:?}"
                    );
                };
                let mut body = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut body)
                    .context("read mock request body")?;
                recorded.push(RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_owned(),
                    body,
                });

                let header = Header::from_bytes("Content-Type", scripted.content_type)
                    .map_err(|()| anyhow!("invalid content type header"))?;
                let response = Response::from_string(scripted.body)
                    .with_status_code(scripted.status)
                    .with_header(header);
                if !scripted.delay.is_zero() {
                    thread::sleep(scripted.delay);
                }
                request.respond(response).context("send mock response")?;
            }
            Ok(recorded)
        });

        Ok(Self {
            base_url,
            server,
            handle: Some(handle),
        })
    }

    pub fn silent() -> Result<Self> {
        Self::serve(Vec::new())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Waits for the script to finish and fails if any extra request arrives
    /// within `grace`.
    pub fn finish(mut self, grace: Duration) -> Result<Vec<RecordedRequest>> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| anyhow!("mock backend already finished"))?;
        let recorded = handle
            .join()
            .map_err(|_| anyhow!("mock backend thread panicked"))??;

        if let Some(extra) = self
            .server
            .recv_timeout(grace)
            .context("poll for unexpected requests")?
        {
            return Err(anyhow!(
                "unexpected request {} {}",
                extra.method(),
                extra.url()
            ));
        }
        Ok(recorded)
    }
}
