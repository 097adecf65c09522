use std::time::Instant;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "info";

/// Logs go to stderr: stdout carries the stdio transport's protocol stream.
pub fn init_logging() {
    fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .compact()
        .init();
}

/// Falls back to [`DEFAULT_LOG_FILTER`] when `RUST_LOG` is unset or unparseable.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

pub async fn request_logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = started_at.elapsed().as_millis();

    match status {
        StatusCode::UNAUTHORIZED => {
            warn!(%method, %path, "rejected unauthenticated request")
        }
        status if status.is_server_error() => {
            warn!(%method, %path, status = status.as_u16(), duration_ms, "http request failed")
        }
        _ if path == "/health" => {
            debug!(%method, %path, status = status.as_u16(), duration_ms, "health probe")
        }
        _ => info!(%method, %path, status = status.as_u16(), duration_ms, "http request handled"),
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_or_blank_filter_uses_default() {
        assert_eq!(log_filter(None).to_string(), DEFAULT_LOG_FILTER);
        assert_eq!(log_filter(Some("  ")).to_string(), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn explicit_filter_is_kept() {
        assert_eq!(log_filter(Some("smallbiz_mcp=debug")).to_string(), "smallbiz_mcp=debug");
    }
}
