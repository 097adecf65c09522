use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Client, RequestBuilder,
};
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::{
    domain::utils::encode_path_segment,
    errors::{message_or_fallback, AppError, ExternalError},
};

pub const SQUARE_API_VERSION: &str = "2025-01-23";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SquareError {
    #[error("square request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("square access token contains characters not allowed in a header")]
    InvalidAccessToken,
    #[error("square returned a non-json body with status {status}")]
    UnexpectedBody { status: u16 },
    #[error("square api returned status {status}")]
    Api {
        status: u16,
        errors: Vec<SquareErrorDetail>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SquareErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl SquareError {
    fn from_body(status: u16, body: &Value) -> Self {
        let errors = body
            .get("errors")
            .cloned()
            .and_then(|errors| serde_json::from_value(errors).ok())
            .unwrap_or_default();
        Self::Api { status, errors }
    }
}

impl ExternalError for SquareError {
    fn best_effort_message(&self) -> String {
        match self {
            Self::Api { status, errors } if errors.is_empty() => {
                format!("Square API returned HTTP {status}")
            }
            Self::Api { errors, .. } => {
                let detail = errors.iter().find_map(|error| error.detail.as_deref());
                message_or_fallback(detail, errors)
            }
            other => other.to_string(),
        }
    }
}

impl From<SquareError> for AppError {
    fn from(error: SquareError) -> Self {
        AppError::external("Square", &error)
    }
}

/// Postal address in Square's own field layout.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, macros::JsonSchema)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_3: Option<String>,
    /// City or town
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sublocality: Option<String>,
    /// State or province
    #[serde(skip_serializing_if = "Option::is_none")]
    pub administrative_district_level_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    /// Two-letter ISO 3166 country code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CustomerFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub location_id: String,
    pub customer_id: String,
    pub state: &'static str,
    pub line_items: Vec<OrderLineItem>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub taxes: Vec<OrderTax>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub discounts: Vec<OrderDiscount>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub service_charges: Vec<OrderServiceCharge>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderLineItem {
    pub name: String,
    pub quantity: String,
    pub base_price_money: Money,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied_taxes: Vec<AppliedTax>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub applied_discounts: Vec<AppliedDiscount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedTax {
    pub tax_uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedDiscount {
    pub discount_uid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderTax {
    pub uid: String,
    pub name: String,
    pub percentage: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDiscount {
    pub uid: String,
    pub name: String,
    #[serde(rename = "type")]
    pub discount_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_money: Option<Money>,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderServiceCharge {
    pub name: String,
    pub amount_money: Money,
    pub calculation_phase: &'static str,
    pub taxable: bool,
}

/// Sparse invoice: absent fields are left untouched on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Invoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_recipient: Option<InvoiceRecipient>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_requests: Option<Vec<PaymentRequest>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_payment_methods: Option<AcceptedPaymentMethods>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_or_service_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_payment_method_enabled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecipient {
    pub customer_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PaymentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipping_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automatic_payment_source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage_requested: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_amount_requested_money: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<Vec<PaymentReminder>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentReminder {
    pub relative_scheduled_days: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AcceptedPaymentMethods {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub square_gift_card: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_account: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy_now_pay_later: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_app_pay: Option<bool>,
}

/// Payments backend used by the customer and invoice operations.
///
/// Single-resource reads return the inner object (`customer`, `invoice`, ...),
/// or `None` when the backend reports it does not exist.
#[async_trait]
pub trait PaymentsProvider: Send + Sync {
    async fn create_customer(
        &self,
        customer: &CustomerFields,
        idempotency_key: &str,
    ) -> Result<Value, SquareError>;
    async fn update_customer(
        &self,
        customer_id: &str,
        customer: &CustomerFields,
    ) -> Result<Value, SquareError>;
    async fn delete_customer(&self, customer_id: &str) -> Result<(), SquareError>;
    async fn get_customer(&self, customer_id: &str) -> Result<Option<Value>, SquareError>;
    async fn list_customers(&self) -> Result<Vec<Value>, SquareError>;
    async fn search_customers_by_email(&self, email: &str) -> Result<Vec<Value>, SquareError>;
    async fn create_order(&self, order: &Order, idempotency_key: &str) -> Result<Value, SquareError>;
    async fn create_invoice(
        &self,
        invoice: &Invoice,
        idempotency_key: &str,
    ) -> Result<Value, SquareError>;
    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Value>, SquareError>;
    async fn update_invoice(
        &self,
        invoice_id: &str,
        invoice: &Invoice,
        idempotency_key: &str,
    ) -> Result<Value, SquareError>;
    async fn delete_invoice(&self, invoice_id: &str, version: Option<i64>)
        -> Result<(), SquareError>;
    async fn list_invoices(&self, location_id: &str) -> Result<Vec<Value>, SquareError>;
    async fn search_invoices(
        &self,
        location_id: &str,
        customer_id: &str,
    ) -> Result<Vec<Value>, SquareError>;
}

#[derive(Debug, Clone)]
pub struct SquareClient {
    http: Client,
    base_url: String,
}

impl SquareClient {
    pub fn new(access_token: &str, base_url: impl Into<String>) -> Result<Self, SquareError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}"))
                .map_err(|_| SquareError::InvalidAccessToken)?,
        );
        headers.insert(
            HeaderName::from_static("square-version"),
            HeaderValue::from_static(SQUARE_API_VERSION),
        );

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, SquareError> {
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        let body = if bytes.is_empty() {
            json!({})
        } else {
            serde_json::from_slice(&bytes).map_err(|_| SquareError::UnexpectedBody {
                status: status.as_u16(),
            })?
        };

        if !status.is_success() {
            debug!(status = status.as_u16(), "square request rejected");
            return Err(SquareError::from_body(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn send_optional(
        &self,
        request: RequestBuilder,
        field: &str,
    ) -> Result<Option<Value>, SquareError> {
        match self.send(request).await {
            Ok(body) => Ok(Some(take_field(body, field))),
            Err(SquareError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn take_field(mut body: Value, field: &str) -> Value {
    body.get_mut(field).map(Value::take).unwrap_or(Value::Null)
}

fn take_list(body: Value, field: &str) -> Vec<Value> {
    match take_field(body, field) {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

#[derive(Serialize)]
struct CreateCustomerBody<'a> {
    idempotency_key: &'a str,
    #[serde(flatten)]
    customer: &'a CustomerFields,
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    order: &'a Order,
    idempotency_key: &'a str,
}

#[derive(Serialize)]
struct InvoiceBody<'a> {
    invoice: &'a Invoice,
    idempotency_key: &'a str,
}

#[async_trait]
impl PaymentsProvider for SquareClient {
    async fn create_customer(
        &self,
        customer: &CustomerFields,
        idempotency_key: &str,
    ) -> Result<Value, SquareError> {
        let body = CreateCustomerBody {
            idempotency_key,
            customer,
        };
        let response = self
            .send(self.http.post(self.url("/v2/customers")).json(&body))
            .await?;
        Ok(take_field(response, "customer"))
    }

    async fn update_customer(
        &self,
        customer_id: &str,
        customer: &CustomerFields,
    ) -> Result<Value, SquareError> {
        let path = format!("/v2/customers/{}", encode_path_segment(customer_id));
        let response = self
            .send(self.http.put(self.url(&path)).json(customer))
            .await?;
        Ok(take_field(response, "customer"))
    }

    async fn delete_customer(&self, customer_id: &str) -> Result<(), SquareError> {
        let path = format!("/v2/customers/{}", encode_path_segment(customer_id));
        self.send(self.http.delete(self.url(&path))).await?;
        Ok(())
    }

    async fn get_customer(&self, customer_id: &str) -> Result<Option<Value>, SquareError> {
        let path = format!("/v2/customers/{}", encode_path_segment(customer_id));
        self.send_optional(self.http.get(self.url(&path)), "customer")
            .await
    }

    async fn list_customers(&self) -> Result<Vec<Value>, SquareError> {
        let response = self.send(self.http.get(self.url("/v2/customers"))).await?;
        Ok(take_list(response, "customers"))
    }

    async fn search_customers_by_email(&self, email: &str) -> Result<Vec<Value>, SquareError> {
        let body = json!({
            "query": {"filter": {"email_address": {"exact": email}}},
            "limit": 100
        });
        let response = self
            .send(self.http.post(self.url("/v2/customers/search")).json(&body))
            .await?;
        Ok(take_list(response, "customers"))
    }

    async fn create_order(&self, order: &Order, idempotency_key: &str) -> Result<Value, SquareError> {
        let body = CreateOrderBody {
            order,
            idempotency_key,
        };
        let response = self
            .send(self.http.post(self.url("/v2/orders")).json(&body))
            .await?;
        Ok(take_field(response, "order"))
    }

    async fn create_invoice(
        &self,
        invoice: &Invoice,
        idempotency_key: &str,
    ) -> Result<Value, SquareError> {
        let body = InvoiceBody {
            invoice,
            idempotency_key,
        };
        let response = self
            .send(self.http.post(self.url("/v2/invoices")).json(&body))
            .await?;
        Ok(take_field(response, "invoice"))
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Value>, SquareError> {
        let path = format!("/v2/invoices/{}", encode_path_segment(invoice_id));
        self.send_optional(self.http.get(self.url(&path)), "invoice")
            .await
    }

    async fn update_invoice(
        &self,
        invoice_id: &str,
        invoice: &Invoice,
        idempotency_key: &str,
    ) -> Result<Value, SquareError> {
        let path = format!("/v2/invoices/{}", encode_path_segment(invoice_id));
        let body = InvoiceBody {
            invoice,
            idempotency_key,
        };
        let response = self
            .send(self.http.put(self.url(&path)).json(&body))
            .await?;
        Ok(take_field(response, "invoice"))
    }

    async fn delete_invoice(
        &self,
        invoice_id: &str,
        version: Option<i64>,
    ) -> Result<(), SquareError> {
        let path = format!("/v2/invoices/{}", encode_path_segment(invoice_id));
        let mut request = self.http.delete(self.url(&path));
        if let Some(version) = version {
            request = request.query(&[("version", version)]);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn list_invoices(&self, location_id: &str) -> Result<Vec<Value>, SquareError> {
        let request = self
            .http
            .get(self.url("/v2/invoices"))
            .query(&[("location_id", location_id)]);
        let response = self.send(request).await?;
        Ok(take_list(response, "invoices"))
    }

    async fn search_invoices(
        &self,
        location_id: &str,
        customer_id: &str,
    ) -> Result<Vec<Value>, SquareError> {
        let body = json!({
            "query": {
                "filter": {
                    "location_ids": [location_id],
                    "customer_ids": [customer_id]
                }
            }
        });
        let response = self
            .send(self.http.post(self.url("/v2/invoices/search")).json(&body))
            .await?;
        Ok(take_list(response, "invoices"))
    }
}
