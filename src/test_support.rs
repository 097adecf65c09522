//! In-process doubles for the external clients

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::{
    calendar_client::{CalendarError, CalendarProvider, CalendarResponse, EventBody},
    database::{DatabaseError, DatabaseProbe},
    square_client::{
        CustomerFields, Invoice, Order, PaymentsProvider, SquareError, SquareErrorDetail,
    },
    AppState,
};

fn recorded<T: Clone>(items: &Mutex<Vec<T>>) -> Vec<T> {
    items.lock().expect("mock lock").clone()
}

fn record<T>(items: &Mutex<Vec<T>>, item: T) {
    items.lock().expect("mock lock").push(item);
}

fn square_rejection(detail: &str) -> SquareError {
    SquareError::Api {
        status: 400,
        errors: vec![SquareErrorDetail {
            category: Some("INVALID_REQUEST_ERROR".to_string()),
            code: Some("BAD_REQUEST".to_string()),
            detail: Some(detail.to_string()),
            field: None,
        }],
    }
}

fn with_id(record: Value, id: &str, omit: bool) -> Value {
    let mut record = match record {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if !omit {
        record.insert("id".to_string(), json!(id));
    }
    Value::Object(record)
}

#[derive(Default)]
pub struct MockPayments {
    pub customers: Vec<Value>,
    pub invoices: Vec<Value>,
    pub reject_customers: bool,
    pub reject_invoices: bool,
    pub omit_created_ids: bool,
    pub(crate) calls: Mutex<Vec<String>>,
    pub(crate) created_customers: Mutex<Vec<CustomerFields>>,
    pub(crate) created_orders: Mutex<Vec<Order>>,
    pub(crate) created_invoices: Mutex<Vec<Invoice>>,
}

impl MockPayments {
    pub fn with_customers(customers: Vec<Value>) -> Self {
        Self {
            customers,
            ..Self::default()
        }
    }

    pub fn with_invoices(invoices: Vec<Value>) -> Self {
        Self {
            invoices,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        recorded(&self.calls)
    }

    pub fn created_customers(&self) -> Vec<CustomerFields> {
        recorded(&self.created_customers)
    }

    pub fn created_orders(&self) -> Vec<Order> {
        recorded(&self.created_orders)
    }

    pub fn created_invoices(&self) -> Vec<Invoice> {
        recorded(&self.created_invoices)
    }

    fn call(&self, call: impl Into<String>) {
        record(&self.calls, call.into());
    }

    fn find(records: &[Value], id: &str) -> Option<Value> {
        records
            .iter()
            .find(|record| record.get("id").and_then(Value::as_str) == Some(id))
            .cloned()
    }
}

#[async_trait]
impl PaymentsProvider for MockPayments {
    async fn create_customer(
        &self,
        customer: &CustomerFields,
        _idempotency_key: &str,
    ) -> Result<Value, SquareError> {
        self.call("create_customer");
        if self.reject_customers {
            return Err(square_rejection("Email address is already in use"));
        }
        record(&self.created_customers, customer.clone());
        let body = serde_json::to_value(customer).unwrap_or_default();
        Ok(with_id(body, "CUST_NEW", self.omit_created_ids))
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        customer: &CustomerFields,
    ) -> Result<Value, SquareError> {
        match customer.version {
            Some(version) => self.call(format!("update_customer:{customer_id}:v{version}")),
            None => self.call(format!("update_customer:{customer_id}")),
        }
        if self.reject_customers {
            return Err(square_rejection("Customer version is stale"));
        }
        let body = serde_json::to_value(customer).unwrap_or_default();
        Ok(with_id(body, customer_id, false))
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), SquareError> {
        self.call(format!("delete_customer:{customer_id}"));
        Ok(())
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Value>, SquareError> {
        self.call(format!("get_customer:{customer_id}"));
        Ok(Self::find(&self.customers, customer_id))
    }

    async fn list_customers(&self) -> Result<Vec<Value>, SquareError> {
        self.call("list_customers");
        Ok(self.customers.clone())
    }

    async fn search_customers_by_email(&self, email: &str) -> Result<Vec<Value>, SquareError> {
        self.call(format!("search_customers_by_email:{email}"));
        Ok(self
            .customers
            .iter()
            .filter(|customer| customer.get("email_address").and_then(Value::as_str) == Some(email))
            .cloned()
            .collect())
    }

    async fn create_order(&self, order: &Order, _idempotency_key: &str) -> Result<Value, SquareError> {
        self.call("create_order");
        record(&self.created_orders, order.clone());
        Ok(with_id(json!({"state": "OPEN"}), "ORDER_NEW", self.omit_created_ids))
    }

    async fn create_invoice(
        &self,
        invoice: &Invoice,
        _idempotency_key: &str,
    ) -> Result<Value, SquareError> {
        self.call("create_invoice");
        if self.reject_invoices {
            return Err(square_rejection("Invoice due date is in the past"));
        }
        record(&self.created_invoices, invoice.clone());
        Ok(with_id(
            json!({"version": 0, "status": "DRAFT"}),
            "INV_NEW",
            self.omit_created_ids,
        ))
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Value>, SquareError> {
        self.call(format!("get_invoice:{invoice_id}"));
        Ok(Self::find(&self.invoices, invoice_id))
    }

    async fn update_invoice(
        &self,
        invoice_id: &str,
        invoice: &Invoice,
        _idempotency_key: &str,
    ) -> Result<Value, SquareError> {
        match invoice.version {
            Some(version) => self.call(format!("update_invoice:{invoice_id}:v{version}")),
            None => self.call(format!("update_invoice:{invoice_id}")),
        }
        if self.reject_invoices {
            return Err(square_rejection("Invoice version is stale"));
        }
        let version = invoice.version.unwrap_or_default() + 1;
        Ok(json!({"id": invoice_id, "version": version, "title": invoice.title}))
    }

    async fn delete_invoice(
        &self,
        invoice_id: &str,
        _version: Option<i64>,
    ) -> Result<(), SquareError> {
        self.call(format!("delete_invoice:{invoice_id}"));
        Ok(())
    }

    async fn list_invoices(&self, location_id: &str) -> Result<Vec<Value>, SquareError> {
        self.call(format!("list_invoices:{location_id}"));
        Ok(self.invoices.clone())
    }

    async fn search_invoices(
        &self,
        location_id: &str,
        customer_id: &str,
    ) -> Result<Vec<Value>, SquareError> {
        self.call(format!("search_invoices:{location_id}:{customer_id}"));
        Ok(self
            .invoices
            .iter()
            .filter(|invoice| {
                invoice
                    .pointer("/primary_recipient/customer_id")
                    .and_then(Value::as_str)
                    == Some(customer_id)
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MockCalendar {
    pub events: Vec<Value>,
    /// Every call fails with this status and message.
    pub fail_with: Option<(u16, String)>,
    pub(crate) inserted: Mutex<Vec<EventBody>>,
    pub(crate) patched: Mutex<Vec<(String, EventBody)>>,
    pub(crate) list_limits: Mutex<Vec<u32>>,
}

impl MockCalendar {
    pub fn with_events(events: Vec<Value>) -> Self {
        Self {
            events,
            ..Self::default()
        }
    }

    pub fn inserted(&self) -> Vec<EventBody> {
        recorded(&self.inserted)
    }

    pub fn patched(&self) -> Vec<(String, EventBody)> {
        recorded(&self.patched)
    }

    pub fn list_limits(&self) -> Vec<u32> {
        recorded(&self.list_limits)
    }

    fn check(&self) -> Result<(), CalendarError> {
        match &self.fail_with {
            Some((status, message)) => Err(google_error(*status, message)),
            None => Ok(()),
        }
    }

    fn event_link(event_id: &str) -> String {
        format!("https://calendar.google.com/event?eid={event_id}")
    }
}

fn google_error(status: u16, message: &str) -> CalendarError {
    CalendarError::Api {
        status,
        message: Some(message.to_string()),
        body: json!({"error": {"code": status, "message": message}}),
    }
}

fn ok(status: u16, body: Value) -> Result<CalendarResponse, CalendarError> {
    Ok(CalendarResponse { status, body })
}

#[async_trait]
impl CalendarProvider for MockCalendar {
    async fn list_upcoming_events(
        &self,
        _time_min: DateTime<Utc>,
        max_results: u32,
    ) -> Result<CalendarResponse, CalendarError> {
        self.check()?;
        record(&self.list_limits, max_results);
        ok(200, json!({"kind": "calendar#events", "items": self.events}))
    }

    async fn get_event(&self, event_id: &str) -> Result<CalendarResponse, CalendarError> {
        self.check()?;
        self.events
            .iter()
            .find(|event| event.get("id").and_then(Value::as_str) == Some(event_id))
            .map(|event| CalendarResponse {
                status: 200,
                body: event.clone(),
            })
            .ok_or_else(|| google_error(404, "Not Found"))
    }

    async fn insert_event(&self, event: &EventBody) -> Result<CalendarResponse, CalendarError> {
        self.check()?;
        record(&self.inserted, event.clone());
        ok(
            200,
            json!({
                "id": "evt_new",
                "htmlLink": Self::event_link("evt_new"),
                "summary": event.summary,
            }),
        )
    }

    async fn patch_event(
        &self,
        event_id: &str,
        event: &EventBody,
    ) -> Result<CalendarResponse, CalendarError> {
        self.check()?;
        record(&self.patched, (event_id.to_string(), event.clone()));
        ok(
            200,
            json!({"id": event_id, "htmlLink": Self::event_link(event_id)}),
        )
    }

    async fn delete_event(&self, _event_id: &str) -> Result<CalendarResponse, CalendarError> {
        self.check()?;
        ok(204, Value::Null)
    }
}

pub struct MockDatabase {
    reachable: bool,
}

impl MockDatabase {
    pub fn healthy() -> Self {
        Self { reachable: true }
    }

    pub fn unreachable() -> Self {
        Self { reachable: false }
    }
}

#[async_trait]
impl DatabaseProbe for MockDatabase {
    async fn ping(&self) -> Result<(), DatabaseError> {
        if self.reachable {
            Ok(())
        } else {
            Err(DatabaseError::Query(sqlx::Error::PoolTimedOut))
        }
    }
}

/// Shared handles on the doubles behind an [`AppState`].
pub struct TestContext {
    pub payments: Arc<MockPayments>,
    pub calendar: Arc<MockCalendar>,
    pub database: Arc<MockDatabase>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            payments: Arc::new(MockPayments::default()),
            calendar: Arc::new(MockCalendar::default()),
            database: Arc::new(MockDatabase::healthy()),
        }
    }

    pub fn with_payments(mut self, payments: Arc<MockPayments>) -> Self {
        self.payments = payments;
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<MockCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_database(mut self, database: Arc<MockDatabase>) -> Self {
        self.database = database;
        self
    }

    pub fn state(&self) -> AppState {
        AppState {
            payments: self.payments.clone(),
            calendar: self.calendar.clone(),
            database: self.database.clone(),
            calendar_time_zone: Arc::from("America/Chicago"),
        }
    }
}
