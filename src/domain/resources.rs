//! Model Context Protocol resources
//!
//! Two static listings plus URI templates that resolve to the same lookups
//! the tools perform. Template reads go through the tool input types so the
//! same validation applies to both surfaces.

use std::collections::HashMap;

use rust_mcp_sdk::schema::{ReadResourceRequestParams, Resource, ResourceTemplate};
use serde_json::{json, Value};

use crate::domain::{
    envelope::{Envelope, JSON_MIME_TYPE},
    tools::{
        calendar::{self, LookupEventByIdTool},
        customers::{self, LookupCustomerByEmailTool, LookupCustomerByIdTool},
        invoices::{self, ListInvoicesTool, LookupInvoiceByCustomerTool, LookupInvoiceByIdTool},
        run_tool,
    },
    utils::percent_decode,
};
use crate::errors::AppError;
use crate::mcp::rpc::{
    json_rpc_error, json_rpc_error_with_data, json_rpc_result, INVALID_PARAMS, METHOD_NOT_FOUND,
};
use crate::AppState;

pub const CUSTOMERS_RESOURCE_URI: &str = "square://customer/listAll";
pub const EVENTS_RESOURCE_URI: &str = "google://calendar/events/list";

struct TemplateBinding {
    name: &'static str,
    title: &'static str,
    uri_template: &'static str,
    description: &'static str,
}

const TEMPLATES: [TemplateBinding; 6] = [
    TemplateBinding {
        name: "lookup-square-customer-by-id",
        title: "Square Customer Lookup (ID)",
        uri_template: "square://customer/by-id/{id}",
        description: "A single Square customer by customer ID",
    },
    TemplateBinding {
        name: "lookup-square-customer-by-email",
        title: "Square Customer Lookup (Email)",
        uri_template: "square://customer/by-email/{email}",
        description: "Square customers with an exact email match",
    },
    TemplateBinding {
        name: "lookup-square-invoice-by-id",
        title: "Square Invoice Lookup (ID)",
        uri_template: "square://invoice/by-id/{invoiceId}",
        description: "A single Square invoice by invoice ID",
    },
    TemplateBinding {
        name: "list-square-invoices",
        title: "Square Invoices (Location)",
        uri_template: "square://invoice/by-location/{locationId}",
        description: "All Square invoices for a location",
    },
    TemplateBinding {
        name: "lookup-square-invoice-by-customer",
        title: "Square Invoices (Customer)",
        uri_template: "square://invoice/by-customer/{locationId}/{customerId}",
        description: "Square invoices for a customer at a location",
    },
    TemplateBinding {
        name: "lookup-google-calendar-event-by-id",
        title: "Google Calendar Event Lookup (ID)",
        uri_template: "google://calendar/event/{eventId}",
        description: "A single Google Calendar event by event ID",
    },
];

pub fn build_resources_list() -> Vec<Resource> {
    vec![
        Resource {
            annotations: None,
            description: Some("All Square customers, summarized".to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            name: "list-square-customers".to_string(),
            size: None,
            title: Some("List Square Customers".to_string()),
            uri: CUSTOMERS_RESOURCE_URI.to_string(),
        },
        Resource {
            annotations: None,
            description: Some("Upcoming Google Calendar events, soonest first".to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            name: "list-google-calendar-events".to_string(),
            size: None,
            title: Some("List Google Calendar Events".to_string()),
            uri: EVENTS_RESOURCE_URI.to_string(),
        },
    ]
}

pub fn build_resource_templates_list() -> Vec<ResourceTemplate> {
    TEMPLATES
        .iter()
        .map(|binding| ResourceTemplate {
            annotations: None,
            description: Some(binding.description.to_string()),
            icons: vec![],
            meta: None,
            mime_type: Some(JSON_MIME_TYPE.to_string()),
            name: binding.name.to_string(),
            title: Some(binding.title.to_string()),
            uri_template: binding.uri_template.to_string(),
        })
        .collect()
}

/// A captured template variable; comma-joined captures are lists.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    One(String),
    Many(Vec<String>),
}

impl TemplateValue {
    fn from_segment(segment: &str) -> Self {
        if segment.contains(',') {
            Self::Many(segment.split(',').map(str::to_string).collect())
        } else {
            Self::One(segment.to_string())
        }
    }

    pub fn first(&self) -> &str {
        match self {
            Self::One(value) => value,
            Self::Many(values) => values.first().map(String::as_str).unwrap_or_default(),
        }
    }
}

/// Matches `uri` against a template whose variables each span one path segment.
pub fn match_template(template: &str, uri: &str) -> Option<HashMap<String, TemplateValue>> {
    let (template_scheme, template_path) = template.split_once("://")?;
    let (uri_scheme, uri_path) = uri.split_once("://")?;
    if template_scheme != uri_scheme {
        return None;
    }

    let uri_path = uri_path.split(['?', '#']).next().unwrap_or_default();
    let template_segments: Vec<&str> = template_path.split('/').collect();
    let uri_segments: Vec<&str> = uri_path.split('/').collect();
    if template_segments.len() != uri_segments.len() {
        return None;
    }

    let mut captures = HashMap::new();
    for (expected, actual) in template_segments.iter().zip(&uri_segments) {
        match expected
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
        {
            Some(variable) => {
                if actual.is_empty() {
                    return None;
                }
                captures.insert(variable.to_string(), TemplateValue::from_segment(actual));
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(captures)
}

fn capture(captures: &HashMap<String, TemplateValue>, variable: &str) -> Result<String, AppError> {
    let value = captures
        .get(variable)
        .ok_or_else(|| AppError::validation(variable, "missing from resource uri"))?;
    percent_decode(variable, value.first())
}

pub async fn handle_resources_read(
    state: &AppState,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, INVALID_PARAMS, "Invalid params");
    };

    let resource_read: ReadResourceRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, INVALID_PARAMS, "Invalid params"),
    };
    let uri = resource_read.uri.as_str();

    let envelope = match uri {
        CUSTOMERS_RESOURCE_URI => customers::list_customers(state.payments.as_ref())
            .await
            .unwrap_or_else(|err| Envelope::failure("Error listing Square customers", &err)),
        EVENTS_RESOURCE_URI => calendar::list_upcoming_events(state.calendar.as_ref())
            .await
            .unwrap_or_else(|err| Envelope::failure("Error listing calendar events", &err)),
        _ => match read_template(state, uri).await {
            Some(envelope) => envelope,
            None => {
                return json_rpc_error_with_data(
                    id,
                    METHOD_NOT_FOUND,
                    "Method not found",
                    Some(json!({
                        "code": "resource_not_found",
                        "message": "unknown resource uri",
                        "details": {"uri": uri},
                    })),
                )
            }
        },
    };

    json_rpc_result(
        id,
        serde_json::to_value(envelope.into_resource_result(uri))
            .expect("read resource result serialization"),
    )
}

async fn read_template(state: &AppState, uri: &str) -> Option<Envelope> {
    let (binding, captures) = TEMPLATES.iter().find_map(|binding| {
        match_template(binding.uri_template, uri).map(|captures| (binding, captures))
    })?;
    let name = binding.name;
    let payments = state.payments.as_ref();

    let envelope = match name {
        "lookup-square-customer-by-id" => {
            run_tool(
                name,
                capture(&captures, "id").map(|customer_id| LookupCustomerByIdTool { customer_id }),
                "Error looking up Square customer",
                |input| customers::lookup_customer_by_id(payments, input),
            )
            .await
        }
        "lookup-square-customer-by-email" => {
            run_tool(
                name,
                capture(&captures, "email").map(|email| LookupCustomerByEmailTool { email }),
                "Error looking up Square customer",
                |input| customers::lookup_customer_by_email(payments, input),
            )
            .await
        }
        "lookup-square-invoice-by-id" => {
            run_tool(
                name,
                capture(&captures, "invoiceId").map(|invoice_id| LookupInvoiceByIdTool { invoice_id }),
                "Error looking up Square invoice",
                |input| invoices::lookup_invoice_by_id(payments, input),
            )
            .await
        }
        "list-square-invoices" => {
            run_tool(
                name,
                capture(&captures, "locationId").map(|location_id| ListInvoicesTool { location_id }),
                "Error listing Square invoices",
                |input| invoices::list_invoices(payments, input),
            )
            .await
        }
        "lookup-square-invoice-by-customer" => {
            let input = capture(&captures, "locationId").and_then(|location_id| {
                Ok(LookupInvoiceByCustomerTool {
                    location_id,
                    customer_id: capture(&captures, "customerId")?,
                })
            });
            run_tool(
                name,
                input,
                "Error looking up Square invoices",
                |input| invoices::lookup_invoices_by_customer(payments, input),
            )
            .await
        }
        "lookup-google-calendar-event-by-id" => {
            run_tool(
                name,
                capture(&captures, "eventId").map(|event_id| LookupEventByIdTool { event_id }),
                "Failed to look up event",
                |input| calendar::lookup_event_by_id(state.calendar.as_ref(), input),
            )
            .await
        }
        _ => return None,
    };
    Some(envelope)
}
