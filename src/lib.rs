use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod auth;
pub mod calendar_client;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod google_auth;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod square_client;
pub mod stdio;

#[cfg(test)]
mod test_support;

use calendar_client::CalendarProvider;
use database::DatabaseProbe;
use square_client::PaymentsProvider;

/// Clients shared by every request, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub payments: Arc<dyn PaymentsProvider>,
    pub calendar: Arc<dyn CalendarProvider>,
    pub database: Arc<dyn DatabaseProbe>,
    /// Zone applied to new events that do not name one.
    pub calendar_time_zone: Arc<str>,
}

impl AppState {
    pub fn new(
        payments: Arc<dyn PaymentsProvider>,
        calendar: Arc<dyn CalendarProvider>,
        database: Arc<dyn DatabaseProbe>,
        calendar_time_zone: &str,
    ) -> Self {
        Self {
            payments,
            calendar,
            database,
            calendar_time_zone: Arc::from(calendar_time_zone),
        }
    }
}

#[derive(Clone)]
pub struct HttpState {
    pub api_token: Arc<str>,
    pub app: AppState,
}

pub fn build_app(app: AppState, api_token: String) -> Router {
    let state = HttpState {
        api_token: Arc::<str>::from(api_token),
        app,
    };

    let protected = Router::new()
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .merge(protected)
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
