use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::config::ConfigError;

pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Failure reported by an external collaborator (payments API, calendar API, database).
pub trait ExternalError: std::error::Error + Send + Sync {
    fn best_effort_message(&self) -> String;
}

/// Picks the reported message, else the serialized raw error, else [`UNKNOWN_ERROR`].
pub fn message_or_fallback<T: Serialize + ?Sized>(message: Option<&str>, raw: &T) -> String {
    if let Some(message) = message.map(str::trim).filter(|message| !message.is_empty()) {
        return message.to_string();
    }

    serde_json::to_string(raw)
        .ok()
        .filter(|serialized| !matches!(serialized.as_str(), "null" | "{}" | "[]" | "\"\""))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid `{field}`: {message}")]
    Validation { field: String, message: String },
    #[error("invalid date string: {value}")]
    InvalidDateFormat { value: String },
    #[error("{message}")]
    ExternalCall {
        service: &'static str,
        message: String,
    },
    #[error("no {resource} id returned from {service}")]
    MissingIdentifier {
        service: &'static str,
        resource: &'static str,
    },
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },
    #[error("unauthorized: {message}")]
    Unauthorized {
        code: &'static str,
        message: &'static str,
    },
    #[error("internal error")]
    Internal { code: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn external(service: &'static str, error: &dyn ExternalError) -> Self {
        Self::ExternalCall {
            service,
            message: error.best_effort_message(),
        }
    }

    pub fn missing_identifier(service: &'static str, resource: &'static str) -> Self {
        Self::MissingIdentifier { service, resource }
    }

    pub fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub fn unauthorized(code: &'static str, message: &'static str) -> Self {
        Self::Unauthorized { code, message }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidDateFormat { .. })
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized { code, message } => {
                (StatusCode::UNAUTHORIZED, code, message.to_string())
            }
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, code, message.to_string())
            }
            Self::Validation { .. } | Self::InvalidDateFormat { .. } => {
                (StatusCode::BAD_REQUEST, "invalid_input", self.to_string())
            }
            other => {
                tracing::error!(error = %other, "request failed with internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                code: code.to_string(),
                message,
                details: json!({}),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::{message_or_fallback, AppError, UNKNOWN_ERROR};
    use serde_json::json;

    #[test]
    fn prefers_reported_message() {
        let message = message_or_fallback(Some("card declined"), &json!({"code": "X"}));
        assert_eq!(message, "card declined");
    }

    #[test]
    fn falls_back_to_serialized_error() {
        let message = message_or_fallback(Some("   "), &json!([{"code": "NOT_FOUND"}]));
        assert_eq!(message, r#"[{"code":"NOT_FOUND"}]"#);
    }

    #[test]
    fn falls_back_to_unknown_error() {
        assert_eq!(message_or_fallback(None, &()), UNKNOWN_ERROR);
        assert_eq!(message_or_fallback(None, &json!({})), UNKNOWN_ERROR);
    }

    #[test]
    fn validation_error_names_field() {
        let error = AppError::validation("phoneNumber", "must contain between 9 and 16 digits");
        assert_eq!(
            error.to_string(),
            "invalid `phoneNumber`: must contain between 9 and 16 digits"
        );
        assert!(error.is_validation());
    }
}
