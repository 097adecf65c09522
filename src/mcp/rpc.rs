//! JSON-RPC envelopes and error mapping
//!
//! Protocol-level failures become JSON-RPC errors; tool-level failures never do.

use rust_mcp_sdk::schema::{
    JsonrpcErrorResponse, JsonrpcResultResponse, RequestId, Result as McpResult, RpcError,
};
use serde_json::{json, Value};

use crate::errors::AppError;

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
pub const UNAUTHORIZED: i32 = -32001;

pub fn is_json_rpc_error(value: &Value) -> bool {
    value.get("error").is_some()
}

pub fn app_error_to_json_rpc(id: Option<Value>, err: AppError) -> Value {
    match err {
        AppError::BadRequest { code, message } => json_rpc_error_with_data(
            id,
            INVALID_PARAMS,
            "Invalid params",
            Some(json!({"code": code, "message": message, "details": {}})),
        ),
        err @ (AppError::Validation { .. } | AppError::InvalidDateFormat { .. }) => {
            json_rpc_error_with_data(
                id,
                INVALID_PARAMS,
                "Invalid params",
                Some(json!({"code": "invalid_input", "message": err.to_string(), "details": {}})),
            )
        }
        AppError::Unauthorized { code, message } => json_rpc_error_with_data(
            id,
            UNAUTHORIZED,
            "Unauthorized",
            Some(json!({"code": code, "message": message, "details": {}})),
        ),
        other => {
            tracing::error!(error = %other, "request failed with internal error");
            json_rpc_error(id, INTERNAL_ERROR, "Internal error")
        }
    }
}

pub fn json_rpc_error(id: Option<Value>, code: i32, message: &str) -> Value {
    json_rpc_error_with_data(id, code, message, None)
}

pub fn json_rpc_error_with_data(
    id: Option<Value>,
    code: i32,
    message: &str,
    data: Option<Value>,
) -> Value {
    let response = JsonrpcErrorResponse::new(
        RpcError {
            code: i64::from(code),
            data,
            message: message.to_string(),
        },
        id.as_ref().and_then(value_to_request_id),
    );
    serde_json::to_value(response).expect("jsonrpc error response serialization")
}

pub fn json_rpc_result(id: Option<Value>, result: Value) -> Value {
    if let Some(request_id) = id.as_ref().and_then(value_to_request_id) {
        let extra = result.as_object().cloned();
        let response = JsonrpcResultResponse::new(request_id, McpResult { meta: None, extra });
        return serde_json::to_value(response).expect("jsonrpc result response serialization");
    }

    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result
    })
}

pub fn value_to_request_id(value: &Value) -> Option<RequestId> {
    if let Some(string_id) = value.as_str() {
        return Some(RequestId::String(string_id.to_string()));
    }

    value.as_i64().map(RequestId::Integer)
}

pub fn request_id_to_value(id: RequestId) -> Value {
    match id {
        RequestId::String(value) => Value::String(value),
        RequestId::Integer(value) => Value::Number(value.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_become_invalid_params() {
        let response = app_error_to_json_rpc(
            Some(json!(7)),
            AppError::validation("uri", "must not be empty"),
        );

        assert_eq!(response["id"], json!(7));
        assert_eq!(response["error"]["code"], json!(INVALID_PARAMS));
        assert_eq!(response["error"]["data"]["code"], json!("invalid_input"));
    }

    #[test]
    fn external_failures_are_internal_errors() {
        let response = app_error_to_json_rpc(
            Some(json!("req-1")),
            AppError::ExternalCall {
                service: "Square",
                message: "boom".to_string(),
            },
        );

        assert_eq!(response["error"]["code"], json!(INTERNAL_ERROR));
        assert_eq!(response["error"]["message"], json!("Internal error"));
    }

    #[test]
    fn request_ids_round_trip() {
        assert_eq!(
            request_id_to_value(value_to_request_id(&json!("abc")).expect("string id")),
            json!("abc")
        );
        assert_eq!(
            request_id_to_value(value_to_request_id(&json!(42)).expect("integer id")),
            json!(42)
        );
        assert!(value_to_request_id(&json!(1.5)).is_none());
    }
}
