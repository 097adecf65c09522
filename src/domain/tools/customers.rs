use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    domain::{
        envelope::Envelope,
        normalize::idempotency_key,
        utils::{present, record_id, CustomerSummary},
        validation::{
            require_non_empty, validate_country, validate_date_only, validate_email,
            validate_max_chars, validate_phone, Validate, MAX_NOTE_CHARS,
        },
    },
    errors::AppError,
    square_client::{Address, CustomerFields, PaymentsProvider},
};

const MAX_NAME_CHARS: usize = 300;

#[macros::mcp_tool(
    name = "create-square-customer",
    description = "Create a customer in Square. Provide at least one of givenName, familyName, companyName, emailAddress or phoneNumber."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CreateCustomerTool {
    /// First name
    #[serde(rename = "givenName")]
    pub given_name: Option<String>,
    /// Last name
    #[serde(rename = "familyName")]
    pub family_name: Option<String>,
    #[serde(rename = "companyName")]
    pub company_name: Option<String>,
    pub nickname: Option<String>,
    #[serde(rename = "emailAddress")]
    pub email_address: Option<String>,
    /// Digits with optional spaces, dots, dashes, parentheses and a leading +
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    /// YYYY-MM-DD
    pub birthday: Option<String>,
    pub note: Option<String>,
    /// Your own identifier for this customer
    #[serde(rename = "referenceId")]
    pub reference_id: Option<String>,
}

#[macros::mcp_tool(
    name = "update-square-customer",
    description = "Update fields of an existing Square customer. Omitted fields are left unchanged."
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateCustomerTool {
    #[serde(rename = "customerId")]
    pub customer_id: String,
    /// Current customer version, for optimistic concurrency
    pub version: Option<i64>,
    #[serde(rename = "givenName")]
    pub given_name: Option<String>,
    #[serde(rename = "familyName")]
    pub family_name: Option<String>,
    #[serde(rename = "companyName")]
    pub company_name: Option<String>,
    pub nickname: Option<String>,
    #[serde(rename = "emailAddress")]
    pub email_address: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
    pub address: Option<Address>,
    pub birthday: Option<String>,
    pub note: Option<String>,
    #[serde(rename = "referenceId")]
    pub reference_id: Option<String>,
}

#[macros::mcp_tool(
    name = "delete-square-customer",
    description = "Delete a Square customer by id"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct DeleteCustomerTool {
    #[serde(rename = "customerId")]
    pub customer_id: String,
}

#[macros::mcp_tool(
    name = "lookup-square-customer-by-id",
    description = "Fetch a single Square customer by id"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct LookupCustomerByIdTool {
    #[serde(rename = "customerId")]
    pub customer_id: String,
}

#[macros::mcp_tool(
    name = "lookup-square-customer-by-email",
    description = "Find Square customers whose email address matches exactly"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct LookupCustomerByEmailTool {
    pub email: String,
}

impl CreateCustomerTool {
    fn fields(&self) -> CustomerFields {
        CustomerFields {
            given_name: present(self.given_name.clone()),
            family_name: present(self.family_name.clone()),
            company_name: present(self.company_name.clone()),
            nickname: present(self.nickname.clone()),
            email_address: present(self.email_address.clone()),
            phone_number: present(self.phone_number.clone()),
            address: self.address.clone(),
            birthday: present(self.birthday.clone()),
            note: present(self.note.clone()),
            reference_id: present(self.reference_id.clone()),
            version: None,
        }
    }
}

impl UpdateCustomerTool {
    fn fields(&self) -> CustomerFields {
        CustomerFields {
            given_name: present(self.given_name.clone()),
            family_name: present(self.family_name.clone()),
            company_name: present(self.company_name.clone()),
            nickname: present(self.nickname.clone()),
            email_address: present(self.email_address.clone()),
            phone_number: present(self.phone_number.clone()),
            address: self.address.clone(),
            birthday: present(self.birthday.clone()),
            note: present(self.note.clone()),
            reference_id: present(self.reference_id.clone()),
            version: self.version,
        }
    }
}

fn validate_details(fields: &CustomerFields) -> Result<(), AppError> {
    for (field, value) in [
        ("givenName", &fields.given_name),
        ("familyName", &fields.family_name),
        ("companyName", &fields.company_name),
        ("nickname", &fields.nickname),
    ] {
        if let Some(value) = value {
            validate_max_chars(field, value, MAX_NAME_CHARS)?;
        }
    }
    if let Some(email) = &fields.email_address {
        validate_email("emailAddress", email)?;
    }
    if let Some(phone) = &fields.phone_number {
        validate_phone("phoneNumber", phone)?;
    }
    if let Some(birthday) = &fields.birthday {
        validate_date_only("birthday", birthday)?;
    }
    if let Some(note) = &fields.note {
        validate_max_chars("note", note, MAX_NOTE_CHARS)?;
    }
    if let Some(country) = fields.address.as_ref().and_then(|address| address.country.as_deref()) {
        validate_country("address.country", country)?;
    }
    Ok(())
}

impl Validate for CreateCustomerTool {
    fn validate(&self) -> Result<(), AppError> {
        let fields = self.fields();
        let identified = [
            &fields.given_name,
            &fields.family_name,
            &fields.company_name,
            &fields.email_address,
            &fields.phone_number,
        ]
        .iter()
        .any(|value| value.is_some());

        if !identified {
            return Err(AppError::validation(
                "givenName",
                "at least one of givenName, familyName, companyName, emailAddress or phoneNumber is required",
            ));
        }
        validate_details(&fields)
    }
}

impl Validate for UpdateCustomerTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("customerId", &self.customer_id)?;
        let fields = self.fields();
        if fields == (CustomerFields { version: self.version, ..CustomerFields::default() }) {
            return Err(AppError::validation(
                "customerId",
                "no fields to update were provided",
            ));
        }
        validate_details(&fields)
    }
}

impl Validate for DeleteCustomerTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("customerId", &self.customer_id)
    }
}

impl Validate for LookupCustomerByIdTool {
    fn validate(&self) -> Result<(), AppError> {
        require_non_empty("customerId", &self.customer_id)
    }
}

impl Validate for LookupCustomerByEmailTool {
    fn validate(&self) -> Result<(), AppError> {
        validate_email("email", &self.email)
    }
}

pub async fn create_customer(
    payments: &dyn PaymentsProvider,
    input: CreateCustomerTool,
) -> Result<Envelope, AppError> {
    let customer = payments
        .create_customer(&input.fields(), &idempotency_key())
        .await?;
    let customer_id =
        record_id(&customer).ok_or(AppError::missing_identifier("Square", "customer"))?;

    Ok(Envelope::with_payload(
        format!("Square customer created successfully! Customer ID: {customer_id}"),
        json!({"customer": customer}),
    ))
}

pub async fn update_customer(
    payments: &dyn PaymentsProvider,
    input: UpdateCustomerTool,
) -> Result<Envelope, AppError> {
    let customer = payments
        .update_customer(input.customer_id.trim(), &input.fields())
        .await?;
    let customer_id =
        record_id(&customer).ok_or(AppError::missing_identifier("Square", "customer"))?;

    Ok(Envelope::with_payload(
        format!("Square customer updated successfully! Customer ID: {customer_id}"),
        json!({"customer": customer}),
    ))
}

pub async fn delete_customer(
    payments: &dyn PaymentsProvider,
    input: DeleteCustomerTool,
) -> Result<Envelope, AppError> {
    let customer_id = input.customer_id.trim();
    payments.delete_customer(customer_id).await?;

    Ok(Envelope::with_payload(
        format!("Square customer deleted successfully! Customer ID: {customer_id}"),
        json!({"customerId": customer_id, "deleted": true}),
    ))
}

pub async fn lookup_customer_by_id(
    payments: &dyn PaymentsProvider,
    input: LookupCustomerByIdTool,
) -> Result<Envelope, AppError> {
    let customer_id = input.customer_id.trim();
    let Some(customer) = payments.get_customer(customer_id).await? else {
        return Ok(Envelope::message("Customer not found"));
    };

    Ok(Envelope::with_payload(
        format!("Found Square customer {customer_id}"),
        json!({"customer": customer}),
    ))
}

pub async fn lookup_customer_by_email(
    payments: &dyn PaymentsProvider,
    input: LookupCustomerByEmailTool,
) -> Result<Envelope, AppError> {
    let email = input.email.trim();
    let customers = payments.search_customers_by_email(email).await?;
    if customers.is_empty() {
        return Ok(Envelope::message(format!("No customer found for email: {email}")));
    }

    let summaries: Vec<CustomerSummary> =
        customers.iter().map(CustomerSummary::from_record).collect();
    Ok(Envelope::with_payload(
        format!("Found {} customer(s) for email: {email}", summaries.len()),
        json!({"customers": summaries}),
    ))
}

pub async fn list_customers(payments: &dyn PaymentsProvider) -> Result<Envelope, AppError> {
    let customers = payments.list_customers().await?;
    let summaries: Vec<CustomerSummary> =
        customers.iter().map(CustomerSummary::from_record).collect();

    Ok(Envelope::with_payload(
        format!("Returned {} Square customers", summaries.len()),
        json!({"customers": summaries}),
    ))
}
