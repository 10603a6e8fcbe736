// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use datachat_api::Client;
use datachat_app::{
    ApiError, ApiRequest, ChatReply, ColumnsResponse, ConnectResponse, TablesResponse,
};
use datachat_tui::{AppRuntime, InternalEvent, run_request};
use std::sync::mpsc;
use std::thread;

pub struct ApiRuntime {
    client: Client,
}

impl ApiRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl AppRuntime for ApiRuntime {
    fn connect(&mut self) -> Result<ConnectResponse, ApiError> {
        self.client.connect()
    }

    fn list_tables(&mut self) -> Result<TablesResponse, ApiError> {
        self.client.list_tables()
    }

    fn list_columns(&mut self, table: &str) -> Result<ColumnsResponse, ApiError> {
        self.client.list_columns(table)
    }

    fn send_chat_message(
        &mut self,
        session_id: &str,
        message: &str,
    ) -> Result<ChatReply, ApiError> {
        self.client.send_chat_message(session_id, message)
    }

    fn spawn_request(&mut self, request: ApiRequest, tx: mpsc::Sender<InternalEvent>) -> Result<()> {
        let mut worker = Self::new(self.client.clone());
        thread::Builder::new()
            .name("datachat-request".to_owned())
            .spawn(move || {
                let outcome = run_request(&mut worker, request);
                if tx.send(InternalEvent::Api(outcome)).is_err() {
                    tracing::debug!("chat view closed before request settled");
                }
            })
            .context("spawn request worker")?;
        Ok(())
    }
}
