//! Interactive tools exposed via Model Context Protocol
//!
//! Every tool follows the same path: deserialize arguments, validate, run the
//! handler against the injected clients, and wrap the outcome in an
//! [`Envelope`]. Tool-level failures are reported inside the envelope and
//! never as JSON-RPC errors.

use std::future::Future;

use rust_mcp_sdk::schema::{CallToolRequestParams, Tool};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::domain::{envelope::Envelope, validation::Validate};
use crate::errors::AppError;
use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_result, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::AppState;

pub mod calendar;
pub mod customers;
pub mod invoices;
pub mod system;

use calendar::{CreateEventTool, DeleteEventTool, LookupEventByIdTool, UpdateEventTool};
use customers::{
    CreateCustomerTool, DeleteCustomerTool, LookupCustomerByEmailTool, LookupCustomerByIdTool,
    UpdateCustomerTool,
};
use invoices::{
    CreateInvoiceTool, DeleteInvoiceTool, ListInvoicesTool, LookupInvoiceByCustomerTool,
    LookupInvoiceByIdTool, UpdateInvoiceTool,
};
use system::{HealthCheckTool, PingTool};

pub fn build_tools_list() -> Vec<Tool> {
    vec![
        PingTool::tool(),
        HealthCheckTool::tool(),
        CreateCustomerTool::tool(),
        UpdateCustomerTool::tool(),
        DeleteCustomerTool::tool(),
        LookupCustomerByIdTool::tool(),
        LookupCustomerByEmailTool::tool(),
        CreateInvoiceTool::tool(),
        UpdateInvoiceTool::tool(),
        DeleteInvoiceTool::tool(),
        LookupInvoiceByIdTool::tool(),
        LookupInvoiceByCustomerTool::tool(),
        ListInvoicesTool::tool(),
        CreateEventTool::tool(),
        UpdateEventTool::tool(),
        DeleteEventTool::tool(),
        LookupEventByIdTool::tool(),
    ]
}

/// Deserializes tool arguments; shape errors become validation failures.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(arguments))
        .map_err(|err| AppError::validation("arguments", err.to_string()))
}

/// Validates `input`, runs `handler` and folds any error into a failure envelope.
pub async fn run_tool<T, F, Fut>(
    tool: &str,
    input: Result<T, AppError>,
    failure_context: &str,
    handler: F,
) -> Envelope
where
    T: Validate,
    F: FnOnce(T) -> Fut,
    Fut: Future<Output = Result<Envelope, AppError>>,
{
    let input = match input.and_then(|input| input.validate().map(|()| input)) {
        Ok(input) => input,
        Err(err) => {
            debug!(tool, error = %err, "tool input rejected");
            return Envelope::rejected(&err);
        }
    };

    match handler(input).await {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(tool, error = %err, "tool call failed");
            Envelope::failure(failure_context, &err)
        }
    }
}

pub async fn handle_tools_call(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };

    let name = tool_call.name.as_str();
    let arguments = tool_call.arguments.unwrap_or_default();
    let payments = state.payments.as_ref();
    let events = state.calendar.as_ref();
    let time_zone = state.calendar_time_zone.as_ref();

    let envelope = match name {
        "ping" => system::ping(),
        "health-check" => system::health_check(state.database.as_ref()).await,
        "create-square-customer" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error creating Square customer",
                |input| customers::create_customer(payments, input),
            )
            .await
        }
        "update-square-customer" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error updating Square customer",
                |input| customers::update_customer(payments, input),
            )
            .await
        }
        "delete-square-customer" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error deleting Square customer",
                |input| customers::delete_customer(payments, input),
            )
            .await
        }
        "lookup-square-customer-by-id" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error looking up Square customer",
                |input| customers::lookup_customer_by_id(payments, input),
            )
            .await
        }
        "lookup-square-customer-by-email" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error looking up Square customer",
                |input| customers::lookup_customer_by_email(payments, input),
            )
            .await
        }
        "create-square-invoice" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error creating Square invoice",
                |input| invoices::create_invoice(payments, input),
            )
            .await
        }
        "update-square-invoice" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error updating Square invoice",
                |input| invoices::update_invoice(payments, input),
            )
            .await
        }
        "delete-square-invoice" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error deleting Square invoice",
                |input| invoices::delete_invoice(payments, input),
            )
            .await
        }
        "lookup-square-invoice-by-id" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error looking up Square invoice",
                |input| invoices::lookup_invoice_by_id(payments, input),
            )
            .await
        }
        "lookup-square-invoice-by-customer" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error looking up Square invoices",
                |input| invoices::lookup_invoices_by_customer(payments, input),
            )
            .await
        }
        "list-invoices" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Error listing Square invoices",
                |input| invoices::list_invoices(payments, input),
            )
            .await
        }
        "create-google-calendar-event" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Failed to create event",
                |input| calendar::create_event(events, time_zone, input),
            )
            .await
        }
        "update-google-calendar-event" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Failed to update event",
                |input| calendar::update_event(events, input),
            )
            .await
        }
        "delete-google-calendar-event" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Failed to delete event",
                |input| calendar::delete_event(events, input),
            )
            .await
        }
        "lookup-google-calendar-event-by-id" => {
            run_tool(
                name,
                parse_arguments(arguments),
                "Failed to look up event",
                |input| calendar::lookup_event_by_id(events, input),
            )
            .await
        }
        _ => {
            return json_rpc_error_with_data(
                id,
                METHOD_NOT_FOUND,
                "Method not found",
                Some(json!({
                    "code": "tool_not_found",
                    "message": format!("unknown tool `{name}`"),
                    "details": {}
                })),
            )
        }
    };

    json_rpc_result(
        id,
        serde_json::to_value(envelope.into_tool_result()).expect("tool result serialization"),
    )
}
