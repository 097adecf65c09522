//! Shared reshaping helpers for customer, invoice and event records

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

pub fn percent_decode(field: &str, value: &str) -> Result<String, AppError> {
    percent_decode_str(value)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| AppError::validation(field, "is not valid percent-encoded UTF-8"))
}

/// Non-empty `id` of an external record.
pub fn record_id(record: &Value) -> Option<String> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Treats empty strings like absent values.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn text(record: &Value, pointer: &str) -> Option<String> {
    record
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceSummary {
    pub id: Option<String>,
    pub invoice_number: Option<String>,
    pub title: Option<String>,
    pub status: Option<String>,
    pub customer_first_name: Option<String>,
    pub customer_last_name: Option<String>,
    pub customer_phone_number: Option<String>,
    pub customer_email: Option<String>,
    pub created_at: Option<String>,
    pub due_date: Option<String>,
    pub total_amount: Value,
}

impl InvoiceSummary {
    pub fn from_record(invoice: &Value) -> Self {
        Self {
            id: text(invoice, "/id"),
            invoice_number: text(invoice, "/invoice_number"),
            title: text(invoice, "/title"),
            status: text(invoice, "/status"),
            customer_first_name: text(invoice, "/primary_recipient/given_name"),
            customer_last_name: text(invoice, "/primary_recipient/family_name"),
            customer_phone_number: text(invoice, "/primary_recipient/phone_number"),
            customer_email: text(invoice, "/primary_recipient/email_address"),
            created_at: text(invoice, "/created_at"),
            due_date: text(invoice, "/payment_requests/0/due_date"),
            total_amount: invoice
                .pointer("/payment_requests/0/computed_amount_money/amount")
                .cloned()
                .unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSummary {
    pub id: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub created_at: Option<String>,
}

impl CustomerSummary {
    pub fn from_record(customer: &Value) -> Self {
        Self {
            id: text(customer, "/id"),
            given_name: text(customer, "/given_name"),
            family_name: text(customer, "/family_name"),
            email_address: text(customer, "/email_address"),
            phone_number: text(customer, "/phone_number"),
            created_at: text(customer, "/created_at"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventSummary {
    pub id: Option<String>,
    pub summary: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub attendees: String,
    pub description: Option<String>,
}

impl EventSummary {
    /// All-day events carry `date` instead of `dateTime`.
    pub fn from_record(event: &Value) -> Self {
        let boundary = |key: &str| {
            text(event, &format!("/{key}/dateTime")).or_else(|| text(event, &format!("/{key}/date")))
        };

        Self {
            id: text(event, "/id"),
            summary: text(event, "/summary"),
            start: boundary("start"),
            end: boundary("end"),
            attendees: event
                .get("attendees")
                .and_then(Value::as_array)
                .map(|attendees| {
                    attendees
                        .iter()
                        .filter_map(|attendee| text(attendee, "/email"))
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default(),
            description: text(event, "/description"),
        }
    }
}
