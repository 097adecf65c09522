//! Square invoice tools
//!
//! Creating an invoice takes two calls: an order carrying the priced line
//! items, then the invoice that bills it. Square has no order deletion, so an
//! invoice failure leaves the order behind and the failure names it.

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::{
    domain::{
        envelope::Envelope,
        normalize::{idempotency_key, to_date_only_or_today, to_iso_or_now},
        utils::{present, record_id, InvoiceSummary},
        validation::{
            require_non_empty, validate_amount, validate_currency, validate_date_like,
            validate_date_only, validate_max_chars, validate_one_of, validate_percentage,
            validate_rfc3339, Validate,
        },
    },
    errors::{AppError, ExternalError},
    square_client::{
        AcceptedPaymentMethods, AppliedDiscount, AppliedTax, Invoice, InvoiceRecipient, Money,
        Order, OrderDiscount, OrderLineItem, OrderServiceCharge, OrderTax, PaymentReminder,
        PaymentRequest, PaymentsProvider,
    },
};

const SCOPES: [&str; 2] = ["ORDER", "LINE_ITEM"];
const DISCOUNT_TYPES: [&str; 4] = [
    "FIXED_AMOUNT",
    "FIXED_PERCENTAGE",
    "VARIABLE_PERCENTAGE",
    "VARIABLE_AMOUNT",
];
const DELIVERY_METHODS: [&str; 3] = ["EMAIL", "SHARE_MANUALLY", "SMS"];
const PAYMENT_SOURCES: [&str; 3] = ["NONE", "CARD_ON_FILE", "BANK_ON_FILE"];
const REQUEST_TYPES: [&str; 3] = ["BALANCE", "DEPOSIT", "INSTALLMENT"];
const MAX_INVOICE_NUMBER_CHARS: usize = 7;
const DUE_TOMORROW_REMINDER: &str =
    "Hello, this is just a friendly reminder to let you know that your invoice is due tomorrow.";

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct MoneyInput {
    /// Smallest currency unit, e.g. cents
    pub amount: i64,
    /// ISO 4217 code such as USD
    pub currency: String,
}

impl MoneyInput {
    fn validate(&self, field: &str) -> Result<(), AppError> {
        validate_amount(&format!("{field}.amount"), self.amount)?;
        validate_currency(
            &format!("{field}.currency"),
            &self.currency.trim().to_ascii_uppercase(),
        )
    }

    fn to_wire(&self) -> Money {
        Money {
            amount: self.amount,
            currency: self.currency.trim().to_ascii_uppercase(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct InvoiceItemInput {
    pub name: String,
    /// At least 1; fractional quantities are allowed
    pub quantity: f64,
    #[serde(rename = "basePriceMoney")]
    pub base_price_money: MoneyInput,
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct ServiceChargeInput {
    pub name: String,
    pub amount: i64,
    pub currency: String,
    /// Defaults to true
    pub taxable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct TaxInput {
    pub uid: String,
    pub name: String,
    /// Decimal string, e.g. "8.25"
    pub percentage: String,
    /// ORDER or LINE_ITEM
    pub scope: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct DiscountInput {
    pub uid: String,
    /// FIXED_AMOUNT, FIXED_PERCENTAGE, VARIABLE_PERCENTAGE or VARIABLE_AMOUNT
    #[serde(rename = "type")]
    pub discount_type: String,
    pub name: String,
    /// Required for FIXED_PERCENTAGE
    pub percentage: Option<String>,
    /// Required for FIXED_AMOUNT
    #[serde(rename = "amountMoney")]
    pub amount_money: Option<MoneyInput>,
    /// ORDER or LINE_ITEM
    pub scope: String,
}

#[macros::mcp_tool(
    name = "create-square-invoice",
    description = "Create a new invoice in Square for a customer given their customer ID. The invoice is emailed to the customer with a reminder the day before it is due."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CreateInvoiceTool {
    #[serde(rename = "locationID")]
    pub location_id: String,
    #[serde(rename = "customerId")]
    pub customer_id: String,
    #[serde(rename = "invoiceTitle")]
    pub invoice_title: String,
    #[serde(rename = "invoiceDescription")]
    pub invoice_description: Option<String>,
    /// When the invoice is sent; defaults to now
    #[serde(rename = "invoiceScheduledDate")]
    pub invoice_scheduled_date: Option<String>,
    /// Defaults to today
    #[serde(rename = "invoiceDueDate")]
    pub invoice_due_date: Option<String>,
    #[serde(rename = "invoiceItems")]
    pub invoice_items: Vec<InvoiceItemInput>,
    #[serde(rename = "serviceCharge")]
    pub service_charge: Option<ServiceChargeInput>,
    pub tax: Option<Vec<TaxInput>>,
    pub discount: Option<Vec<DiscountInput>>,
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct RecipientInput {
    #[serde(rename = "customerId")]
    pub customer_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct AcceptedPaymentMethodsInput {
    pub card: Option<bool>,
    #[serde(rename = "squareGiftCard")]
    pub square_gift_card: Option<bool>,
    #[serde(rename = "bankAccount")]
    pub bank_account: Option<bool>,
    #[serde(rename = "buyNowPayLater")]
    pub buy_now_pay_later: Option<bool>,
    #[serde(rename = "cashAppPay")]
    pub cash_app_pay: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct PaymentRequestInput {
    /// Identifies an existing payment request to change
    pub uid: Option<String>,
    /// BALANCE, DEPOSIT or INSTALLMENT
    #[serde(rename = "requestType")]
    pub request_type: Option<String>,
    /// YYYY-MM-DD
    #[serde(rename = "dueDate")]
    pub due_date: Option<String>,
    #[serde(rename = "tippingEnabled")]
    pub tipping_enabled: Option<bool>,
    /// NONE, CARD_ON_FILE or BANK_ON_FILE
    #[serde(rename = "automaticPaymentSource")]
    pub automatic_payment_source: Option<String>,
    #[serde(rename = "cardId")]
    pub card_id: Option<String>,
    /// Whole percentage of the total, 0 to 100
    #[serde(rename = "percentageRequested")]
    pub percentage_requested: Option<i64>,
    #[serde(rename = "fixedAmountRequestedMoney")]
    pub fixed_amount_requested_money: Option<MoneyInput>,
}

/// Invoice fields to change; omitted fields keep their current value.
#[derive(Debug, Clone, Deserialize, Serialize, macros::JsonSchema)]
pub struct InvoicePatchInput {
    #[serde(rename = "acceptedPaymentMethods")]
    pub accepted_payment_methods: Option<AcceptedPaymentMethodsInput>,
    #[serde(rename = "paymentRequests")]
    pub payment_requests: Option<Vec<PaymentRequestInput>>,
    #[serde(rename = "primaryRecipient")]
    pub primary_recipient: Option<RecipientInput>,
    /// EMAIL, SHARE_MANUALLY or SMS
    #[serde(rename = "deliveryMethod")]
    pub delivery_method: Option<String>,
    pub description: Option<String>,
    /// At most 7 characters
    #[serde(rename = "invoiceNumber")]
    pub invoice_number: Option<String>,
    #[serde(rename = "locationId")]
    pub location_id: Option<String>,
    #[serde(rename = "orderId")]
    pub order_id: Option<String>,
    /// RFC 3339 timestamp
    #[serde(rename = "scheduledAt")]
    pub scheduled_at: Option<String>,
    /// YYYY-MM-DD
    #[serde(rename = "saleOrServiceDate")]
    pub sale_or_service_date: Option<String>,
    #[serde(rename = "storePaymentMethodEnabled")]
    pub store_payment_method_enabled: Option<bool>,
    pub title: Option<String>,
}

#[macros::mcp_tool(
    name = "update-square-invoice",
    description = "Update an invoice in Square given its invoice ID. The current version is fetched when none is provided."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateInvoiceTool {
    #[serde(rename = "invoiceID")]
    pub invoice_id: String,
    pub invoice: InvoicePatchInput,
    pub version: Option<i64>,
}

#[macros::mcp_tool(
    name = "delete-square-invoice",
    description = "Delete a draft Square invoice given its invoice ID"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DeleteInvoiceTool {
    #[serde(rename = "invoiceId")]
    pub invoice_id: String,
    pub version: Option<i64>,
}

#[macros::mcp_tool(
    name = "lookup-square-invoice-by-id",
    description = "Lookup a Square invoice by invoice ID"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct LookupInvoiceByIdTool {
    #[serde(rename = "invoiceId")]
    pub invoice_id: String,
}

#[macros::mcp_tool(
    name = "lookup-square-invoice-by-customer",
    description = "Lookup Square invoices by customer ID and location ID"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct LookupInvoiceByCustomerTool {
    /// The location the invoices belong to
    #[serde(rename = "locationId")]
    pub location_id: String,
    #[serde(rename = "customerId")]
    pub customer_id: String,
}

#[macros::mcp_tool(
    name = "list-invoices",
    description = "Retrieve a list of all Square invoices by location ID"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListInvoicesTool {
    #[serde(rename = "locationId")]
    pub location_id: String,
}

impl Validate for CreateInvoiceTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("locationID", &self.location_id)?;
        require_non_empty("customerId", &self.customer_id)?;
        require_non_empty("invoiceTitle", &self.invoice_title)?;
        if let Some(scheduled) = &self.invoice_scheduled_date {
            validate_date_like("invoiceScheduledDate", scheduled)?;
        }
        if let Some(due) = &self.invoice_due_date {
            validate_date_like("invoiceDueDate", due)?;
        }

        if self.invoice_items.is_empty() {
            return Err(AppError::validation(
                "invoiceItems",
                "at least one item is required",
            ));
        }
        for (index, item) in self.invoice_items.iter().enumerate() {
            let field = format!("invoiceItems[{index}]");
            require_non_empty(&format!("{field}.name"), &item.name)?;
            if !item.quantity.is_finite() || item.quantity < 1.0 {
                return Err(AppError::validation(
                    format!("{field}.quantity"),
                    "must be at least 1",
                ));
            }
            item.base_price_money
                .validate(&format!("{field}.basePriceMoney"))?;
        }

        if let Some(charge) = &self.service_charge {
            require_non_empty("serviceCharge.name", &charge.name)?;
            validate_amount("serviceCharge.amount", charge.amount)?;
            validate_currency(
                "serviceCharge.currency",
                &charge.currency.trim().to_ascii_uppercase(),
            )?;
        }

        for (index, tax) in self.tax.iter().flatten().enumerate() {
            let field = format!("tax[{index}]");
            require_non_empty(&format!("{field}.uid"), &tax.uid)?;
            require_non_empty(&format!("{field}.name"), &tax.name)?;
            validate_percentage(&format!("{field}.percentage"), &tax.percentage)?;
            validate_one_of(&format!("{field}.scope"), &tax.scope, &SCOPES)?;
        }

        for (index, discount) in self.discount.iter().flatten().enumerate() {
            let field = format!("discount[{index}]");
            require_non_empty(&format!("{field}.uid"), &discount.uid)?;
            require_non_empty(&format!("{field}.name"), &discount.name)?;
            validate_one_of(&format!("{field}.type"), &discount.discount_type, &DISCOUNT_TYPES)?;
            validate_one_of(&format!("{field}.scope"), &discount.scope, &SCOPES)?;
            if let Some(percentage) = &discount.percentage {
                validate_percentage(&format!("{field}.percentage"), percentage)?;
            }
            if let Some(money) = &discount.amount_money {
                money.validate(&format!("{field}.amountMoney"))?;
            }
            match discount.discount_type.as_str() {
                "FIXED_PERCENTAGE" if discount.percentage.is_none() => {
                    return Err(AppError::validation(
                        format!("{field}.percentage"),
                        "is required for FIXED_PERCENTAGE discounts",
                    ));
                }
                "FIXED_AMOUNT" if discount.amount_money.is_none() => {
                    return Err(AppError::validation(
                        format!("{field}.amountMoney"),
                        "is required for FIXED_AMOUNT discounts",
                    ));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

impl CreateInvoiceTool {
    /// Line-item scoped taxes and discounts are attached to every item;
    /// order scoped ones Square applies by itself.
    fn order(&self) -> Order {
        let taxes: Vec<OrderTax> = self
            .tax
            .iter()
            .flatten()
            .map(|tax| OrderTax {
                uid: tax.uid.trim().to_string(),
                name: tax.name.trim().to_string(),
                percentage: tax.percentage.clone(),
                scope: tax.scope.clone(),
            })
            .collect();
        let discounts: Vec<OrderDiscount> = self
            .discount
            .iter()
            .flatten()
            .map(|discount| OrderDiscount {
                uid: discount.uid.trim().to_string(),
                name: discount.name.trim().to_string(),
                discount_type: discount.discount_type.clone(),
                percentage: discount.percentage.clone(),
                amount_money: discount.amount_money.as_ref().map(MoneyInput::to_wire),
                scope: discount.scope.clone(),
            })
            .collect();

        let line_items = self
            .invoice_items
            .iter()
            .map(|item| OrderLineItem {
                name: item.name.trim().to_string(),
                quantity: item.quantity.to_string(),
                base_price_money: item.base_price_money.to_wire(),
                applied_taxes: taxes
                    .iter()
                    .filter(|tax| tax.scope == "LINE_ITEM")
                    .map(|tax| AppliedTax {
                        tax_uid: tax.uid.clone(),
                    })
                    .collect(),
                applied_discounts: discounts
                    .iter()
                    .filter(|discount| discount.scope == "LINE_ITEM")
                    .map(|discount| AppliedDiscount {
                        discount_uid: discount.uid.clone(),
                    })
                    .collect(),
            })
            .collect();

        let service_charges = self
            .service_charge
            .iter()
            .map(|charge| OrderServiceCharge {
                name: charge.name.trim().to_string(),
                amount_money: Money {
                    amount: charge.amount,
                    currency: charge.currency.trim().to_ascii_uppercase(),
                },
                calculation_phase: "TOTAL_PHASE",
                taxable: charge.taxable.unwrap_or(true),
            })
            .collect();

        Order {
            location_id: self.location_id.trim().to_string(),
            customer_id: self.customer_id.trim().to_string(),
            state: "OPEN",
            line_items,
            taxes,
            discounts,
            service_charges,
        }
    }
}

impl PaymentRequestInput {
    fn validate(&self, field: &str) -> Result<(), AppError> {
        if let Some(request_type) = &self.request_type {
            validate_one_of(&format!("{field}.requestType"), request_type, &REQUEST_TYPES)?;
        }
        if let Some(due_date) = &self.due_date {
            validate_date_only(&format!("{field}.dueDate"), due_date)?;
        }
        if let Some(source) = &self.automatic_payment_source {
            validate_one_of(
                &format!("{field}.automaticPaymentSource"),
                source,
                &PAYMENT_SOURCES,
            )?;
        }
        if let Some(percentage) = self.percentage_requested {
            if !(0..=100).contains(&percentage) {
                return Err(AppError::validation(
                    format!("{field}.percentageRequested"),
                    "must be between 0 and 100",
                ));
            }
        }
        if let Some(money) = &self.fixed_amount_requested_money {
            money.validate(&format!("{field}.fixedAmountRequestedMoney"))?;
        }
        Ok(())
    }

    fn to_wire(&self) -> PaymentRequest {
        PaymentRequest {
            uid: present(self.uid.clone()),
            request_type: self.request_type.clone(),
            due_date: self.due_date.clone(),
            tipping_enabled: self.tipping_enabled,
            automatic_payment_source: self.automatic_payment_source.clone(),
            card_id: present(self.card_id.clone()),
            percentage_requested: self.percentage_requested.map(|value| value.to_string()),
            fixed_amount_requested_money: self
                .fixed_amount_requested_money
                .as_ref()
                .map(MoneyInput::to_wire),
            reminders: None,
        }
    }
}

impl InvoicePatchInput {
    fn to_wire(&self) -> Invoice {
        Invoice {
            version: None,
            location_id: present(self.location_id.clone()),
            order_id: present(self.order_id.clone()),
            primary_recipient: self.primary_recipient.as_ref().map(|recipient| {
                InvoiceRecipient {
                    customer_id: recipient.customer_id.trim().to_string(),
                }
            }),
            payment_requests: self
                .payment_requests
                .as_ref()
                .map(|requests| requests.iter().map(PaymentRequestInput::to_wire).collect()),
            delivery_method: self.delivery_method.clone(),
            invoice_number: present(self.invoice_number.clone()),
            title: present(self.title.clone()),
            description: self.description.clone(),
            scheduled_at: self.scheduled_at.clone(),
            accepted_payment_methods: self.accepted_payment_methods.as_ref().map(|methods| {
                AcceptedPaymentMethods {
                    card: methods.card,
                    square_gift_card: methods.square_gift_card,
                    bank_account: methods.bank_account,
                    buy_now_pay_later: methods.buy_now_pay_later,
                    cash_app_pay: methods.cash_app_pay,
                }
            }),
            sale_or_service_date: self.sale_or_service_date.clone(),
            store_payment_method_enabled: self.store_payment_method_enabled,
        }
    }
}

impl Validate for UpdateInvoiceTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("invoiceID", &self.invoice_id)?;
        let patch = &self.invoice;

        if let Some(method) = &patch.delivery_method {
            validate_one_of("invoice.deliveryMethod", method, &DELIVERY_METHODS)?;
        }
        if let Some(number) = &patch.invoice_number {
            validate_max_chars("invoice.invoiceNumber", number, MAX_INVOICE_NUMBER_CHARS)?;
        }
        if let Some(date) = &patch.sale_or_service_date {
            validate_date_only("invoice.saleOrServiceDate", date)?;
        }
        if let Some(scheduled_at) = &patch.scheduled_at {
            validate_rfc3339("invoice.scheduledAt", scheduled_at)?;
        }
        if let Some(recipient) = &patch.primary_recipient {
            require_non_empty("invoice.primaryRecipient.customerId", &recipient.customer_id)?;
        }
        for (index, request) in patch.payment_requests.iter().flatten().enumerate() {
            request.validate(&format!("invoice.paymentRequests[{index}]"))?;
        }

        if patch.to_wire() == Invoice::default() {
            return Err(AppError::validation(
                "invoice",
                "no fields to update were provided",
            ));
        }
        Ok(())
    }
}

impl Validate for DeleteInvoiceTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("invoiceId", &self.invoice_id)
    }
}

impl Validate for LookupInvoiceByIdTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("invoiceId", &self.invoice_id)
    }
}

impl Validate for LookupInvoiceByCustomerTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("locationId", &self.location_id)?;
        require_non_empty("customerId", &self.customer_id)
    }
}

impl Validate for ListInvoicesTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("locationId", &self.location_id)
    }
}

pub async fn create_invoice(
    payments: &dyn PaymentsProvider,
    input: CreateInvoiceTool,
) -> Result<Envelope, AppError> {
    let scheduled_at = to_iso_or_now(input.invoice_scheduled_date.as_deref())?;
    let due_date = to_date_only_or_today(input.invoice_due_date.as_deref())?;
    let sale_or_service_date = to_date_only_or_today(None)?;

    let order = payments
        .create_order(&input.order(), &idempotency_key())
        .await?;
    let order_id = record_id(&order).ok_or(AppError::missing_identifier("Square", "order"))?;

    let invoice = Invoice {
        location_id: Some(input.location_id.trim().to_string()),
        order_id: Some(order_id.clone()),
        primary_recipient: Some(InvoiceRecipient {
            customer_id: input.customer_id.trim().to_string(),
        }),
        payment_requests: Some(vec![PaymentRequest {
            request_type: Some("BALANCE".to_string()),
            due_date: Some(due_date),
            tipping_enabled: Some(true),
            automatic_payment_source: Some("NONE".to_string()),
            reminders: Some(vec![PaymentReminder {
                relative_scheduled_days: -1,
                message: Some(DUE_TOMORROW_REMINDER.to_string()),
            }]),
            ..PaymentRequest::default()
        }]),
        delivery_method: Some("EMAIL".to_string()),
        title: Some(input.invoice_title.trim().to_string()),
        description: present(input.invoice_description),
        scheduled_at: Some(scheduled_at),
        accepted_payment_methods: Some(AcceptedPaymentMethods {
            card: Some(true),
            square_gift_card: Some(false),
            bank_account: Some(false),
            buy_now_pay_later: Some(true),
            cash_app_pay: Some(false),
        }),
        sale_or_service_date: Some(sale_or_service_date),
        store_payment_method_enabled: Some(false),
        ..Invoice::default()
    };

    let created = match payments.create_invoice(&invoice, &idempotency_key()).await {
        Ok(created) => created,
        Err(err) => {
            warn!(order_id = %order_id, error = %err, "invoice creation failed, order left without invoice");
            return Err(AppError::ExternalCall {
                service: "Square",
                message: format!(
                    "{} (order {order_id} was created and is not attached to an invoice)",
                    err.best_effort_message()
                ),
            });
        }
    };
    let invoice_id =
        record_id(&created).ok_or(AppError::missing_identifier("Square", "invoice"))?;

    Ok(Envelope::with_payload(
        format!("Square invoice created successfully! Invoice ID: {invoice_id}"),
        json!({"invoice": created, "orderId": order_id}),
    ))
}

pub async fn update_invoice(
    payments: &dyn PaymentsProvider,
    input: UpdateInvoiceTool,
) -> Result<Envelope, AppError> {
    let invoice_id = input.invoice_id.trim();
    let version = match input.version {
        Some(version) => version,
        None => current_version(payments, invoice_id).await?,
    };

    let invoice = Invoice {
        version: Some(version),
        ..input.invoice.to_wire()
    };
    let updated = payments
        .update_invoice(invoice_id, &invoice, &idempotency_key())
        .await?;
    let updated_id = record_id(&updated).unwrap_or_else(|| invoice_id.to_string());

    Ok(Envelope::with_payload(
        format!("Invoice updated successfully! Invoice ID: {updated_id}"),
        json!({"invoice": updated}),
    ))
}

async fn current_version(
    payments: &dyn PaymentsProvider,
    invoice_id: &str,
) -> Result<i64, AppError> {
    let not_found = || AppError::ExternalCall {
        service: "Square",
        message: format!("invoice {invoice_id} not found"),
    };
    let invoice = payments.get_invoice(invoice_id).await?.ok_or_else(not_found)?;

    invoice
        .get("version")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| AppError::ExternalCall {
            service: "Square",
            message: format!("invoice {invoice_id} has no version"),
        })
}

pub async fn delete_invoice(
    payments: &dyn PaymentsProvider,
    input: DeleteInvoiceTool,
) -> Result<Envelope, AppError> {
    let invoice_id = input.invoice_id.trim();
    payments.delete_invoice(invoice_id, input.version).await?;

    Ok(Envelope::with_payload(
        format!("Square invoice deleted successfully! Invoice ID: {invoice_id}"),
        json!({"invoiceId": invoice_id, "deleted": true}),
    ))
}

pub async fn lookup_invoice_by_id(
    payments: &dyn PaymentsProvider,
    input: LookupInvoiceByIdTool,
) -> Result<Envelope, AppError> {
    let invoice_id = input.invoice_id.trim();
    let Some(invoice) = payments.get_invoice(invoice_id).await? else {
        return Ok(Envelope::message(format!("No invoice found for: {invoice_id}")));
    };

    Ok(Envelope::with_payload(
        format!("Found Square invoice {invoice_id}"),
        json!({"invoice": InvoiceSummary::from_record(&invoice)}),
    ))
}

pub async fn lookup_invoices_by_customer(
    payments: &dyn PaymentsProvider,
    input: LookupInvoiceByCustomerTool,
) -> Result<Envelope, AppError> {
    let location_id = input.location_id.trim();
    let customer_id = input.customer_id.trim();
    let invoices = payments.search_invoices(location_id, customer_id).await?;
    if invoices.is_empty() {
        return Ok(Envelope::message(format!(
            "No invoice found for: {location_id} and {customer_id}"
        )));
    }

    let summaries: Vec<InvoiceSummary> = invoices.iter().map(InvoiceSummary::from_record).collect();
    Ok(Envelope::with_payload(
        format!("Found {} invoice(s) for customer {customer_id}", summaries.len()),
        json!({"invoices": summaries}),
    ))
}

pub async fn list_invoices(
    payments: &dyn PaymentsProvider,
    input: ListInvoicesTool,
) -> Result<Envelope, AppError> {
    let location_id = input.location_id.trim();
    let invoices = payments.list_invoices(location_id).await?;
    if invoices.is_empty() {
        return Ok(Envelope::message(format!(
            "No invoices found for location ID: {location_id}."
        )));
    }

    let summaries: Vec<InvoiceSummary> = invoices.iter().map(InvoiceSummary::from_record).collect();
    Ok(Envelope::with_payload(
        format!("Found {} invoice(s) for location ID: {location_id}", summaries.len()),
        json!({"invoices": summaries}),
    ))
}
