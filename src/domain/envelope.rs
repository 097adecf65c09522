//! Uniform result shape returned by every tool and resource
//!
//! An envelope carries a human-readable summary, an optional structured payload
//! and a failure flag. Payloads are normalized on construction so no reshaped
//! external data ever leaves the server with unsafe integers.

use rust_mcp_sdk::schema::{
    CallToolResult, ContentBlock, ReadResourceContent, ReadResourceResult, TextContent,
    TextResourceContents,
};
use serde_json::{Map, Value};

use crate::{domain::normalize::stringify_wide_integers, errors::AppError};

pub const JSON_MIME_TYPE: &str = "application/json";
pub const TEXT_MIME_TYPE: &str = "text/plain";

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub summary: String,
    pub payload: Option<Map<String, Value>>,
    pub failed: bool,
}

impl Envelope {
    /// Success without structured data, e.g. a lookup that found nothing.
    pub fn message(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            payload: None,
            failed: false,
        }
    }

    /// Non-object payloads are wrapped under `result`.
    pub fn with_payload(summary: impl Into<String>, payload: Value) -> Self {
        let payload = match stringify_wide_integers(payload) {
            Value::Object(map) => map,
            other => Map::from_iter([("result".to_string(), other)]),
        };

        Self {
            summary: summary.into(),
            payload: Some(payload),
            failed: false,
        }
    }

    /// `"<context>: <message>"`, flagged as a failure.
    pub fn failure(context: &str, error: &AppError) -> Self {
        Self {
            summary: format!("{context}: {error}"),
            payload: None,
            failed: true,
        }
    }

    pub fn rejected(error: &AppError) -> Self {
        Self::failure("Invalid input", error)
    }

    pub fn payload_value(&self) -> Option<Value> {
        self.payload.clone().map(Value::Object)
    }

    pub fn into_tool_result(self) -> CallToolResult {
        let mut content = vec![ContentBlock::from(TextContent::new(
            self.summary,
            None,
            None,
        ))];

        if let Some(payload) = &self.payload {
            let rendered = serde_json::to_string_pretty(payload)
                .expect("json object serialization");
            content.push(ContentBlock::from(TextContent::new(rendered, None, None)));
        }

        CallToolResult {
            content,
            is_error: self.failed.then_some(true),
            meta: None,
            structured_content: self.payload,
        }
    }

    pub fn into_resource_result(self, uri: &str) -> ReadResourceResult {
        let (mime_type, text) = match self.payload {
            Some(payload) => (
                JSON_MIME_TYPE,
                serde_json::to_string_pretty(&payload).expect("json object serialization"),
            ),
            None => (TEXT_MIME_TYPE, self.summary),
        };

        ReadResourceResult {
            contents: vec![ReadResourceContent::from(TextResourceContents {
                meta: None,
                mime_type: Some(mime_type.to_string()),
                text,
                uri: uri.to_string(),
            })],
            meta: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_is_normalized_on_construction() {
        let envelope = Envelope::with_payload(
            "created",
            json!({"order": {"version": 9_007_199_254_740_993_u64}}),
        );

        assert_eq!(
            envelope.payload_value().expect("payload")["order"]["version"],
            json!("9007199254740993")
        );
        assert!(!envelope.failed);
    }

    #[test]
    fn scalar_payload_is_wrapped() {
        let envelope = Envelope::with_payload("count", json!(3));
        assert_eq!(envelope.payload_value(), Some(json!({"result": 3})));
    }

    #[test]
    fn failure_prefixes_context() {
        let error = AppError::ExternalCall {
            service: "Square",
            message: "Invalid due date".to_string(),
        };
        let envelope = Envelope::failure("Error creating Square invoice", &error);

        assert_eq!(envelope.summary, "Error creating Square invoice: Invalid due date");
        assert!(envelope.failed);
        assert!(envelope.payload.is_none());
    }

    #[test]
    fn tool_result_carries_summary_and_structured_payload() {
        let result = Envelope::with_payload("Event found!", json!({"event": {"id": "evt_1"}}))
            .into_tool_result();
        let rendered = serde_json::to_value(&result).expect("serialize result");

        assert_eq!(rendered["content"][0]["text"], json!("Event found!"));
        assert_eq!(rendered["content"].as_array().map(Vec::len), Some(2));
        assert_eq!(rendered["structuredContent"]["event"]["id"], json!("evt_1"));
        assert!(rendered.get("isError").map_or(true, Value::is_null));
    }

    #[test]
    fn failed_tool_result_is_flagged() {
        let error = AppError::validation("customerId", "must not be empty");
        let result = Envelope::rejected(&error).into_tool_result();

        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.content.len(), 1);
        assert!(result.structured_content.is_none());
    }

    #[test]
    fn resource_result_uses_json_when_payload_present() {
        let result = Envelope::with_payload("ok", json!({"customers": []}))
            .into_resource_result("square://customer/listAll");
        let rendered = serde_json::to_value(&result).expect("serialize result");

        assert_eq!(rendered["contents"][0]["mimeType"], json!("application/json"));
        assert_eq!(rendered["contents"][0]["uri"], json!("square://customer/listAll"));
        let body: Value = serde_json::from_str(
            rendered["contents"][0]["text"].as_str().expect("text"),
        )
        .expect("json text");
        assert_eq!(body, json!({"customers": []}));
    }

    #[test]
    fn resource_result_falls_back_to_summary_text() {
        let result = Envelope::message("Customer not found")
            .into_resource_result("square://customer/by-id/C1");
        let rendered = serde_json::to_value(&result).expect("serialize result");

        assert_eq!(rendered["contents"][0]["mimeType"], json!("text/plain"));
        assert_eq!(rendered["contents"][0]["text"], json!("Customer not found"));
    }
}
