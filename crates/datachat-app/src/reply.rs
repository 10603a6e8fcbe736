// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Deserialize;
use serde_json::Value;

pub const UNRECOGNIZED_REPLY: &str = "Sorry, I couldn't understand the response.";

/// A `/chat` body decoded by shape. Variant order is the precedence order:
/// serde tries each candidate in turn and keeps the first structural match.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ChatReply {
    Text(String),
    Response { response: String },
    Detail { detail: String },
    Message { message: String },
    Result { result: String },
    Unrecognized(Value),
}

impl ChatReply {
    pub fn from_value(value: Value) -> Self {
        // Untagged struct variants would also accept a one-element array.
        if !(value.is_string() || value.is_object()) {
            return Self::Unrecognized(value);
        }
        match serde_json::from_value(value.clone()) {
            Ok(reply) => reply,
            Err(_) => Self::Unrecognized(value),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Text(text)
            | Self::Response { response: text }
            | Self::Detail { detail: text }
            | Self::Message { message: text }
            | Self::Result { result: text } => text,
            Self::Unrecognized(_) => UNRECOGNIZED_REPLY,
        }
    }

    /// A 2xx body carrying `detail` without `response` is an application failure.
    pub fn soft_error(&self) -> Option<&str> {
        match self {
            Self::Detail { detail } => Some(detail),
            _ => None,
        }
    }
}

pub fn normalize_reply(value: &Value) -> String {
    ChatReply::from_value(value.clone()).text().to_owned()
}

#[cfg(test)]
mod tests {
    use super::{ChatReply, UNRECOGNIZED_REPLY, normalize_reply};
    use serde_json::json;

    #[test]
    fn each_recognized_shape_yields_its_text() {
        let shapes = [
            json!("X"),
            json!({"response": "X"}),
            json!({"detail": "X"}),
            json!({"message": "X"}),
            json!({"result": "X"}),
        ];
        for shape in shapes {
            assert_eq!(normalize_reply(&shape), "X", "shape {shape}");
        }
    }

    #[test]
    fn empty_object_falls_back_to_placeholder() {
        assert_eq!(normalize_reply(&json!({})), UNRECOGNIZED_REPLY);
        assert_eq!(normalize_reply(&json!(["a", "b"])), UNRECOGNIZED_REPLY);
        assert_eq!(normalize_reply(&json!(["solo"])), UNRECOGNIZED_REPLY);
        assert_eq!(normalize_reply(&json!(null)), UNRECOGNIZED_REPLY);
    }

    #[test]
    fn response_outranks_every_other_field() {
        let body = json!({
            "result": "r",
            "message": "m",
            "detail": "d",
            "response": "answer",
        });
        assert_eq!(normalize_reply(&body), "answer");
        assert_eq!(normalize_reply(&json!({"message": "m", "detail": "d"})), "d");
        assert_eq!(normalize_reply(&json!({"result": "r", "message": "m"})), "m");
    }

    #[test]
    fn non_string_fields_are_skipped() {
        let body = json!({"response": {"nested": true}, "message": "fallback"});
        assert_eq!(normalize_reply(&body), "fallback");
        assert_eq!(normalize_reply(&json!({"result": 42})), UNRECOGNIZED_REPLY);
    }

    #[test]
    fn detail_without_response_is_a_soft_error() {
        let reply = ChatReply::from_value(json!({"detail": "GOOGLE_API_KEY missing"}));
        assert_eq!(reply.soft_error(), Some("GOOGLE_API_KEY missing"));

        let reply = ChatReply::from_value(json!({"response": "hi", "detail": "note"}));
        assert_eq!(reply.soft_error(), None);
    }
}
