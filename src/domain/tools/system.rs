use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    database::{DatabaseError, DatabaseProbe},
    domain::envelope::Envelope,
    errors::ExternalError,
};

#[macros::mcp_tool(name = "ping", description = "Check that the server is responding")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct PingTool {}

#[macros::mcp_tool(
    name = "health-check",
    description = "Check connectivity to the backing database"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct HealthCheckTool {}

pub fn ping() -> Envelope {
    Envelope::with_payload("pong", json!({"reply": "pong"}))
}

/// Always succeeds; a broken database is reported through `dbStatus`.
pub async fn health_check(database: &dyn DatabaseProbe) -> Envelope {
    let db_status = match database.ping().await {
        Ok(()) => "ok".to_string(),
        Err(DatabaseError::NotConfigured) => "not configured".to_string(),
        Err(err) => {
            warn!(error = %err, "database health check failed");
            format!("Connection failed. Error: {}", err.best_effort_message())
        }
    };

    Envelope::with_payload(
        format!("Database status: {db_status}"),
        json!({"dbStatus": db_status}),
    )
}
