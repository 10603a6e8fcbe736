// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::MessageId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const EMPTY_TABLE_NAME: &str = "Table name cannot be empty.";
pub const MISSING_TABLE_NAME: &str = "Table name is required to fetch columns.";
pub const EMPTY_QUERY_MESSAGE: &str = "Query message cannot be empty.";
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";
pub const UNPARSABLE_SUCCESS_BODY: &str = "Failed to parse response JSON.";
pub const CONNECT_SUCCESS_STATUS: &str = "success";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
    System,
}

impl Sender {
    pub const fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Ai => "ai",
            Self::System => "sys",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub sender: Sender,
    pub detail: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{detail}")]
pub struct ApiError {
    pub detail: String,
}

impl ApiError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ERROR)
    }

    pub fn status(code: u16) -> Self {
        Self::new(format!("Request failed with status {code}"))
    }

    pub fn unparsable_body() -> Self {
        Self::new(UNPARSABLE_SUCCESS_BODY)
    }

    pub fn detail(&self) -> Option<&str> {
        let trimmed = self.detail.trim();
        (!trimmed.is_empty()).then_some(self.detail.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

impl ConnectResponse {
    pub fn is_success(&self) -> bool {
        self.status == CONNECT_SUCCESS_STATUS
    }

    pub fn message(&self) -> Option<&str> {
        (!self.message.trim().is_empty()).then_some(self.message.as_str())
    }
}

pub type TablesResponse = Vec<String>;
pub type ColumnsResponse = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatPayload<'a> {
    pub session_id: &'a str,
    pub message: &'a str,
}

pub fn truncate_label(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_owned();
    }
    let head: String = value.chars().take(max_chars).collect();
    format!("{head}...")
}
