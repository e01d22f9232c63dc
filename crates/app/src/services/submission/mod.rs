//! Submission reconciler.
//!
//! Turns a storefront form post into Shopify records:
//!
//! 1. Resolve the form by code and check it belongs to the posting shop.
//! 2. Parse the posted values into a [`Submission`].
//! 3. Resolve the shop's session and check its token and scopes.
//! 4. In company mode, run one `companyCreate` (company, location and main
//!    contact). If the shop's plan cannot hold companies, or the call never
//!    reaches Shopify, create a plain customer whose note and addresses carry
//!    the company details instead. On success, tag the contact's customer
//!    with `customerUpdate`.
//! 5. In standard mode, run one `customerCreate`.
//!
//! The branch is chosen once from the parsed submission. No mutation is
//! retried and nothing is persisted; identical posts create two customers.
//!
//! Storage and Shopify are reached through the [`FormSource`],
//! [`SessionSource`] and [`AdminConnect`] seams.

pub mod note;
pub mod parse;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use shopiform_core::{FormCode, ShopDomain};

use crate::db::{FormRepository, RepositoryError, SessionRepository};
use crate::models::{Form, ShopSession};
use crate::shopify::mutations::{
    CompanyAddressInput, CompanyContactInput, CompanyCreateInput, CompanyInput,
    CompanyLocationInput, CustomerInput, MailingAddressInput,
};
use crate::shopify::{
    AdminClient, AdminConnector, AdminShopifyError, Company, CompanyCreatePayload,
    CompanyLocation, Customer, CustomerPayload, GraphQLError, UserError,
};

pub use parse::{AddressParts, CompanyDetails, Contact, Submission, SubmissionParseError};

/// Scope needed to create customers.
pub const WRITE_CUSTOMERS: &str = "write_customers";
/// Scope needed to create companies.
pub const WRITE_COMPANIES: &str = "write_companies";

// =============================================================================
// Seams
// =============================================================================

/// Where forms are looked up by code.
pub trait FormSource {
    fn form_by_code(
        &self,
        code: &FormCode,
    ) -> impl Future<Output = Result<Option<Form>, RepositoryError>> + Send;
}

/// Where a shop's session is resolved.
pub trait SessionSource {
    fn session_for_shop(
        &self,
        shop: &ShopDomain,
    ) -> impl Future<Output = Result<Option<ShopSession>, RepositoryError>> + Send;
}

/// The three Admin API mutations the reconciler issues.
pub trait ShopifyAdmin {
    fn create_company(
        &self,
        input: &CompanyCreateInput,
    ) -> impl Future<Output = Result<CompanyCreatePayload, AdminShopifyError>> + Send;

    fn create_customer(
        &self,
        input: &CustomerInput,
    ) -> impl Future<Output = Result<CustomerPayload, AdminShopifyError>> + Send;

    fn update_customer(
        &self,
        input: &CustomerInput,
    ) -> impl Future<Output = Result<CustomerPayload, AdminShopifyError>> + Send;
}

/// Builds a [`ShopifyAdmin`] for one shop.
pub trait AdminConnect {
    type Client: ShopifyAdmin + Send + Sync;

    fn admin_for(&self, shop: &ShopDomain, access_token: SecretString) -> Self::Client;
}

impl FormSource for FormRepository<'_> {
    fn form_by_code(
        &self,
        code: &FormCode,
    ) -> impl Future<Output = Result<Option<Form>, RepositoryError>> + Send {
        self.find_by_code(code)
    }
}

impl SessionSource for SessionRepository<'_> {
    fn session_for_shop(
        &self,
        shop: &ShopDomain,
    ) -> impl Future<Output = Result<Option<ShopSession>, RepositoryError>> + Send {
        self.find_for_shop(shop)
    }
}

impl ShopifyAdmin for AdminClient {
    fn create_company(
        &self,
        input: &CompanyCreateInput,
    ) -> impl Future<Output = Result<CompanyCreatePayload, AdminShopifyError>> + Send {
        self.company_create(input)
    }

    fn create_customer(
        &self,
        input: &CustomerInput,
    ) -> impl Future<Output = Result<CustomerPayload, AdminShopifyError>> + Send {
        self.customer_create(input)
    }

    fn update_customer(
        &self,
        input: &CustomerInput,
    ) -> impl Future<Output = Result<CustomerPayload, AdminShopifyError>> + Send {
        self.customer_update(input)
    }
}

impl AdminConnect for AdminConnector {
    type Client = AdminClient;

    fn admin_for(&self, shop: &ShopDomain, access_token: SecretString) -> AdminClient {
        self.connect(shop, access_token)
    }
}

// =============================================================================
// Request / outcome
// =============================================================================

/// A storefront post: the form code, the shop, and every other posted value.
#[derive(Debug, Clone, Default)]
pub struct SubmissionRequest {
    pub form_code: String,
    pub shop: String,
    pub values: HashMap<String, String>,
}

impl SubmissionRequest {
    /// Split `formCode` and `shop` out of a flat map of posted values.
    #[must_use]
    pub fn from_fields(mut fields: HashMap<String, String>) -> Self {
        Self {
            form_code: fields.remove("formCode").unwrap_or_default(),
            shop: fields.remove("shop").unwrap_or_default(),
            values: fields,
        }
    }
}

/// A successful submission.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub success: bool,
    pub message: &'static str,
    pub customer: Option<Customer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_location: Option<CompanyLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_shopify_plus: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
    pub submission_data: BTreeMap<String, String>,
}

impl IntoResponse for SubmissionOutcome {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Errors reported by Shopify, passed back to the caller unchanged.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProviderErrors {
    GraphQL(Vec<GraphQLError>),
    User(Vec<UserError>),
}

/// Every way a submission can fail.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Form code and shop are required")]
    MissingCodeOrShop,

    #[error("Form not found")]
    FormNotFound,

    #[error(transparent)]
    Invalid(#[from] SubmissionParseError),

    #[error("No shop session found")]
    NoSession { submission_data: BTreeMap<String, String> },

    #[error("Invalid session")]
    InvalidSession { submission_data: BTreeMap<String, String> },

    #[error("Missing required permissions")]
    MissingScope,

    #[error("Failed to create company")]
    CompanyRejected(ProviderErrors),

    #[error("Failed to create customer")]
    CustomerRejected(ProviderErrors),

    #[error("Failed to tag customer")]
    TagRejected(ProviderErrors),

    #[error("Failed to create customer: no customer returned")]
    NoCustomerReturned,

    #[error("Shopify request failed: {0}")]
    Upstream(AdminShopifyError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl SubmissionError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingCodeOrShop
            | Self::Invalid(_)
            | Self::CompanyRejected(_)
            | Self::CustomerRejected(_)
            | Self::TagRejected(_) => StatusCode::BAD_REQUEST,
            Self::FormNotFound => StatusCode::NOT_FOUND,
            Self::NoSession { .. } | Self::InvalidSession { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::MissingScope => StatusCode::FORBIDDEN,
            Self::NoCustomerReturned | Self::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_data: Option<BTreeMap<String, String>>,
}

impl FailureBody {
    const fn new(error: String) -> Self {
        Self {
            success: false,
            error,
            message: None,
            note: None,
            details: None,
            submission_data: None,
        }
    }
}

impl IntoResponse for SubmissionError {
    fn into_response(self) -> Response {
        let status = self.status();

        if matches!(
            self,
            Self::Repository(_) | Self::Upstream(_) | Self::NoCustomerReturned
        ) {
            let event_id = sentry::capture_error(&self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "submission failed");
        } else if matches!(
            self,
            Self::CompanyRejected(_) | Self::CustomerRejected(_) | Self::TagRejected(_)
        ) {
            tracing::warn!(error = %self, "Shopify rejected submission");
        }

        let body = match self {
            Self::Invalid(SubmissionParseError::InvalidEmail(_)) => {
                FailureBody::new("Invalid email address".to_string())
            }
            Self::NoSession { submission_data } => FailureBody {
                message: Some(note::MSG_NO_SESSION),
                note: Some(note::NOTE_NO_SESSION),
                submission_data: Some(submission_data),
                ..FailureBody::new("No shop session found".to_string())
            },
            Self::InvalidSession { submission_data } => FailureBody {
                message: Some(note::MSG_INVALID_SESSION),
                submission_data: Some(submission_data),
                ..FailureBody::new("Invalid session".to_string())
            },
            Self::MissingScope => FailureBody {
                message: Some(note::MSG_MISSING_SCOPE),
                note: Some(note::NOTE_MISSING_SCOPE),
                ..FailureBody::new("Missing required permissions".to_string())
            },
            Self::CompanyRejected(ref errors)
            | Self::CustomerRejected(ref errors)
            | Self::TagRejected(ref errors) => FailureBody {
                details: serde_json::to_value(errors).ok(),
                ..FailureBody::new(self.to_string())
            },
            Self::NoCustomerReturned => FailureBody {
                details: Some(serde_json::Value::from("No customer object returned from API")),
                ..FailureBody::new("Failed to create customer".to_string())
            },
            Self::Upstream(_) => FailureBody::new("Failed to reach Shopify".to_string()),
            Self::Repository(_) => FailureBody::new("Internal server error".to_string()),
            other => FailureBody::new(other.to_string()),
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Reconciler
// =============================================================================

/// Processes storefront submissions.
pub struct Reconciler<F, S, C> {
    forms: F,
    sessions: S,
    admin: C,
}

impl<F, S, C> Reconciler<F, S, C>
where
    F: FormSource + Sync,
    S: SessionSource + Sync,
    C: AdminConnect + Sync,
{
    pub const fn new(forms: F, sessions: S, admin: C) -> Self {
        Self {
            forms,
            sessions,
            admin,
        }
    }

    /// Process one submission to completion.
    ///
    /// # Errors
    ///
    /// Returns a [`SubmissionError`] for invalid input, an unknown form, a
    /// missing or under-scoped session, or a Shopify rejection. Plan
    /// restrictions on company creation are not errors.
    #[instrument(skip_all, fields(form_code = %request.form_code, shop = %request.shop))]
    pub async fn submit(
        &self,
        request: SubmissionRequest,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let code = request.form_code.trim();
        let shop = request.shop.trim();
        if code.is_empty() || shop.is_empty() {
            return Err(SubmissionError::MissingCodeOrShop);
        }
        let (Ok(code), Ok(shop)) = (FormCode::parse(code), ShopDomain::parse(shop)) else {
            return Err(SubmissionError::FormNotFound);
        };

        let form = self
            .forms
            .form_by_code(&code)
            .await?
            .filter(|form| form.shop == shop)
            .ok_or(SubmissionError::FormNotFound)?;

        let submission = Submission::parse(&form, &request.values)?;

        let Some(session) = self.sessions.session_for_shop(&shop).await? else {
            tracing::warn!(shop = %shop, "no session for shop");
            return Err(SubmissionError::NoSession {
                submission_data: submission.data,
            });
        };
        if !session.has_access_token() {
            tracing::warn!(shop = %shop, session_id = %session.id, "session has no access token");
            return Err(SubmissionError::InvalidSession {
                submission_data: submission.data,
            });
        }
        if !session.has_scope(WRITE_CUSTOMERS) {
            tracing::warn!(shop = %shop, scope = ?session.scope, "session lacks write_customers");
            return Err(SubmissionError::MissingScope);
        }

        let admin = self.admin.admin_for(&shop, session.access_token.clone());

        match &submission.company {
            Some(company) => {
                if !session.has_scope(WRITE_COMPANIES) {
                    tracing::warn!(shop = %shop, "session lacks write_companies; company creation may be refused");
                }
                company_mode(&admin, &form, &submission, company).await
            }
            None => standard_mode(&admin, &form, &submission).await,
        }
    }
}

async fn standard_mode<A: ShopifyAdmin + Sync>(
    admin: &A,
    form: &Form,
    submission: &Submission,
) -> Result<SubmissionOutcome, SubmissionError> {
    let input = standard_customer_input(form, &submission.contact);
    let customer = require_customer(admin.create_customer(&input).await)?;
    tracing::info!(form_code = %form.code, customer_id = %customer.id, "customer created");

    Ok(SubmissionOutcome {
        success: true,
        message: note::MSG_STANDARD_SUCCESS,
        customer: Some(customer),
        company: None,
        company_location: None,
        is_shopify_plus: None,
        note: None,
        submission_data: submission.data.clone(),
    })
}

async fn company_mode<A: ShopifyAdmin + Sync>(
    admin: &A,
    form: &Form,
    submission: &Submission,
    details: &CompanyDetails,
) -> Result<SubmissionOutcome, SubmissionError> {
    let input = company_create_input(&form.code, &submission.contact, details);

    match admin.create_company(&input).await {
        Ok(payload) if !payload.user_errors.is_empty() => {
            if payload.user_errors.iter().any(UserError::is_plan_restriction) {
                tracing::info!(form_code = %form.code, "companies unavailable on this plan, saving company on customer");
                fallback_mode(admin, form, submission, details).await
            } else {
                Err(SubmissionError::CompanyRejected(ProviderErrors::User(
                    payload.user_errors,
                )))
            }
        }
        Ok(CompanyCreatePayload {
            company: Some(company),
            ..
        }) => plus_mode(admin, form, submission, company).await,
        Ok(_) => {
            tracing::warn!(form_code = %form.code, "companyCreate returned no company, saving company on customer");
            fallback_mode(admin, form, submission, details).await
        }
        Err(e) if e.is_plan_restriction() => {
            tracing::info!(form_code = %form.code, "companies unavailable on this plan, saving company on customer");
            fallback_mode(admin, form, submission, details).await
        }
        Err(AdminShopifyError::GraphQL(errors)) => Err(SubmissionError::CompanyRejected(
            ProviderErrors::GraphQL(errors),
        )),
        Err(e) => {
            tracing::warn!(error = %e, "companyCreate failed, saving company on customer");
            fallback_mode(admin, form, submission, details).await
        }
    }
}

async fn plus_mode<A: ShopifyAdmin + Sync>(
    admin: &A,
    form: &Form,
    submission: &Submission,
    company: Company,
) -> Result<SubmissionOutcome, SubmissionError> {
    let location = company.locations.first().cloned();
    let mut customer = company
        .main_contact
        .as_ref()
        .and_then(|contact| contact.customer.clone());

    if let Some(contact) = customer.as_mut() {
        let input = CustomerInput {
            id: Some(contact.id.clone()),
            tags: note::customer_tags(&form.code, submission.company.as_ref()),
            note: Some(note::provenance_note(&form.title, &form.code)),
            ..CustomerInput::default()
        };
        let payload = admin
            .update_customer(&input)
            .await
            .map_err(|e| match e {
                AdminShopifyError::GraphQL(errors) => {
                    SubmissionError::TagRejected(ProviderErrors::GraphQL(errors))
                }
                other => SubmissionError::Upstream(other),
            })?;
        if !payload.user_errors.is_empty() {
            return Err(SubmissionError::TagRejected(ProviderErrors::User(
                payload.user_errors,
            )));
        }
        if let Some(updated) = payload.customer {
            contact.tags = updated.tags;
        }
    } else {
        tracing::warn!(company_id = %company.id, "company has no main contact customer, skipping tags");
    }

    tracing::info!(
        form_code = %form.code,
        company_id = %company.id,
        location_id = location.as_ref().map(|l| l.id.as_str()),
        "company, location and contact created"
    );

    Ok(SubmissionOutcome {
        success: true,
        message: note::MSG_PLUS_SUCCESS,
        customer,
        company: Some(company),
        company_location: location,
        is_shopify_plus: Some(true),
        note: None,
        submission_data: submission.data.clone(),
    })
}

async fn fallback_mode<A: ShopifyAdmin + Sync>(
    admin: &A,
    form: &Form,
    submission: &Submission,
    details: &CompanyDetails,
) -> Result<SubmissionOutcome, SubmissionError> {
    let input = fallback_customer_input(form, &submission.contact, details);
    let customer = require_customer(admin.create_customer(&input).await)?;
    tracing::info!(form_code = %form.code, customer_id = %customer.id, "customer created with company details");

    Ok(SubmissionOutcome {
        success: true,
        message: note::MSG_FALLBACK_SUCCESS,
        customer: Some(customer),
        company: None,
        company_location: None,
        is_shopify_plus: Some(false),
        note: Some(note::NOTE_FALLBACK),
        submission_data: submission.data.clone(),
    })
}

fn require_customer(
    result: Result<CustomerPayload, AdminShopifyError>,
) -> Result<Customer, SubmissionError> {
    let payload = result.map_err(|e| match e {
        AdminShopifyError::GraphQL(errors) => {
            SubmissionError::CustomerRejected(ProviderErrors::GraphQL(errors))
        }
        other => SubmissionError::Upstream(other),
    })?;

    if !payload.user_errors.is_empty() {
        return Err(SubmissionError::CustomerRejected(ProviderErrors::User(
            payload.user_errors,
        )));
    }

    payload
        .customer
        .filter(|c| !c.id.is_empty())
        .ok_or(SubmissionError::NoCustomerReturned)
}

// =============================================================================
// Mutation inputs
// =============================================================================

fn standard_customer_input(form: &Form, contact: &Contact) -> CustomerInput {
    CustomerInput {
        email: Some(contact.email.to_string()),
        first_name: contact.first_name.clone(),
        last_name: contact.last_name.clone(),
        phone: contact.phone.clone(),
        tags: note::customer_tags(&form.code, None),
        note: Some(note::provenance_note(&form.title, &form.code)),
        ..CustomerInput::default()
    }
}

fn fallback_customer_input(form: &Form, contact: &Contact, company: &CompanyDetails) -> CustomerInput {
    let mailing = |parts: &AddressParts| MailingAddressInput {
        address1: parts.street.clone(),
        address2: parts.apartment.clone(),
        city: parts.city.clone(),
        province: parts.province.clone(),
        zip: parts.postal_code.clone(),
        country: parts.country.clone(),
        company: Some(company.name.clone()),
        phone: parts.phone.clone().or_else(|| contact.phone.clone()),
    };

    let addresses = std::iter::once(&company.billing)
        .filter(|billing| billing.is_complete())
        .chain(company.shipping.as_ref())
        .map(mailing)
        .collect();

    CustomerInput {
        email: Some(contact.email.to_string()),
        first_name: contact.first_name.clone(),
        last_name: contact.last_name.clone(),
        phone: contact.phone.clone(),
        tags: note::customer_tags(&form.code, Some(company)),
        note: Some(note::fallback_note(&form.title, &form.code, company)),
        addresses,
        ..CustomerInput::default()
    }
}

fn company_create_input(
    code: &FormCode,
    contact: &Contact,
    company: &CompanyDetails,
) -> CompanyCreateInput {
    let address = |parts: &AddressParts| CompanyAddressInput {
        first_name: contact.first_name.clone(),
        last_name: contact.last_name.clone(),
        address1: parts.street.clone(),
        address2: parts.apartment.clone(),
        city: parts.city.clone(),
        zone_code: parts.province.clone(),
        zip: parts.postal_code.clone(),
        country_code: parts.country.clone(),
        phone: parts.phone.clone().or_else(|| contact.phone.clone()),
    };

    let separate_shipping = company.shipping.is_some();
    CompanyCreateInput {
        company: CompanyInput {
            name: company.name.clone(),
            external_id: code.to_string(),
        },
        company_location: CompanyLocationInput {
            name: format!("{} - Main Location", company.name),
            shipping_address: address(company.shipping_or_billing()),
            billing_same_as_shipping: !separate_shipping,
            billing_address: (separate_shipping && company.billing.is_complete())
                .then(|| address(&company.billing)),
        },
        company_contact: CompanyContactInput {
            email: contact.email.to_string(),
            first_name: contact.first_name.clone(),
            last_name: contact.last_name.clone(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::future::ready;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use shopiform_core::{FieldType, FormId};

    use super::*;
    use crate::models::FormField;
    use crate::shopify::{CompanyContact, Connection, Edge};

    // -------------------------------------------------------------------------
    // Fakes
    // -------------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum Call {
        CompanyCreate(CompanyCreateInput),
        CustomerCreate(CustomerInput),
        CustomerUpdate(CustomerInput),
    }

    type Queue<T> = Mutex<VecDeque<Result<T, AdminShopifyError>>>;

    #[derive(Default)]
    struct FakeShopify {
        companies: Queue<CompanyCreatePayload>,
        creates: Queue<CustomerPayload>,
        updates: Queue<CustomerPayload>,
        calls: Mutex<Vec<Call>>,
    }

    impl FakeShopify {
        fn with_company(self, r: Result<CompanyCreatePayload, AdminShopifyError>) -> Self {
            self.companies.lock().unwrap().push_back(r);
            self
        }

        fn with_create(self, r: Result<CustomerPayload, AdminShopifyError>) -> Self {
            self.creates.lock().unwrap().push_back(r);
            self
        }

        fn with_update(self, r: Result<CustomerPayload, AdminShopifyError>) -> Self {
            self.updates.lock().unwrap().push_back(r);
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }

        fn company_creates(&self) -> usize {
            self.count(|c| matches!(c, Call::CompanyCreate(_)))
        }

        fn customer_creates(&self) -> usize {
            self.count(|c| matches!(c, Call::CustomerCreate(_)))
        }

        fn customer_updates(&self) -> usize {
            self.count(|c| matches!(c, Call::CustomerUpdate(_)))
        }

        fn next<T>(queue: &Queue<T>) -> Result<T, AdminShopifyError> {
            queue.lock().unwrap().pop_front().unwrap_or(Err(AdminShopifyError::Status {
                status: 500,
                body: "unexpected call".to_string(),
            }))
        }
    }

    impl ShopifyAdmin for Arc<FakeShopify> {
        fn create_company(
            &self,
            input: &CompanyCreateInput,
        ) -> impl Future<Output = Result<CompanyCreatePayload, AdminShopifyError>> + Send {
            self.calls.lock().unwrap().push(Call::CompanyCreate(input.clone()));
            ready(FakeShopify::next(&self.companies))
        }

        fn create_customer(
            &self,
            input: &CustomerInput,
        ) -> impl Future<Output = Result<CustomerPayload, AdminShopifyError>> + Send {
            self.calls.lock().unwrap().push(Call::CustomerCreate(input.clone()));
            ready(FakeShopify::next(&self.creates))
        }

        fn update_customer(
            &self,
            input: &CustomerInput,
        ) -> impl Future<Output = Result<CustomerPayload, AdminShopifyError>> + Send {
            self.calls.lock().unwrap().push(Call::CustomerUpdate(input.clone()));
            ready(FakeShopify::next(&self.updates))
        }
    }

    struct FakeConnector(Arc<FakeShopify>);

    impl AdminConnect for FakeConnector {
        type Client = Arc<FakeShopify>;

        fn admin_for(&self, _shop: &ShopDomain, _access_token: SecretString) -> Self::Client {
            Arc::clone(&self.0)
        }
    }

    struct FakeForms(Option<Form>);

    impl FormSource for FakeForms {
        fn form_by_code(
            &self,
            code: &FormCode,
        ) -> impl Future<Output = Result<Option<Form>, RepositoryError>> + Send {
            ready(Ok(self.0.clone().filter(|f| &f.code == code)))
        }
    }

    struct FakeSessions(Option<ShopSession>);

    impl SessionSource for FakeSessions {
        fn session_for_shop(
            &self,
            shop: &ShopDomain,
        ) -> impl Future<Output = Result<Option<ShopSession>, RepositoryError>> + Send {
            ready(Ok(self.0.clone().filter(|s| &s.shop == shop)))
        }
    }

    // -------------------------------------------------------------------------
    // Fixtures
    // -------------------------------------------------------------------------

    const SHOP: &str = "acme.myshopify.com";

    fn field(id: &str, field_type: FieldType, label: &str, required: bool) -> FormField {
        FormField {
            id: id.to_string(),
            field_type,
            label: label.to_string(),
            placeholder: None,
            required,
            options: None,
        }
    }

    fn form(fields: Vec<FormField>) -> Form {
        Form {
            id: FormId::new(1),
            code: FormCode::parse("12345").unwrap(),
            shop: ShopDomain::parse(SHOP).unwrap(),
            title: "Wholesale".to_string(),
            description: None,
            fields,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn contact_form() -> Form {
        form(vec![
            field("field-1", FieldType::Email, "Email", true),
            field("field-2", FieldType::Text, "First Name", false),
        ])
    }

    fn company_form() -> Form {
        form(vec![
            field("field-1", FieldType::Email, "Email", true),
            field("field-2", FieldType::Text, "First Name", false),
            field("field-3", FieldType::Company, "Company", false),
        ])
    }

    fn session(scope: &str, token: &str) -> ShopSession {
        ShopSession {
            id: "offline_acme.myshopify.com".to_string(),
            shop: ShopDomain::parse(SHOP).unwrap(),
            is_online: false,
            scope: Some(scope.to_string()),
            expires: None,
            access_token: SecretString::from(token),
            created_at: Utc::now(),
        }
    }

    fn good_session() -> ShopSession {
        session("write_customers,write_companies", "shpat_token")
    }

    fn request(pairs: &[(&str, &str)]) -> SubmissionRequest {
        let mut fields: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        fields.entry("formCode".to_string()).or_insert_with(|| "12345".to_string());
        fields.entry("shop".to_string()).or_insert_with(|| SHOP.to_string());
        SubmissionRequest::from_fields(fields)
    }

    fn company_request(name: &str) -> SubmissionRequest {
        request(&[
            ("field-1", "jane@x.com"),
            ("field-2", "Jane"),
            ("field-3_billing_company_name", name),
            ("field-3_billing_street", "1 Main St"),
            ("field-3_billing_city", "Austin"),
            ("field-3_billing_country", "US"),
        ])
    }

    fn customer(id: &str, email: &str) -> Customer {
        Customer {
            id: id.to_string(),
            email: Some(email.to_string()),
            first_name: None,
            last_name: None,
            phone: None,
            addresses: vec![],
            tags: vec![],
        }
    }

    fn created(email: &str) -> Result<CustomerPayload, AdminShopifyError> {
        Ok(CustomerPayload {
            customer: Some(customer("gid://shopify/Customer/1", email)),
            user_errors: vec![],
        })
    }

    fn access_denied() -> Result<CompanyCreatePayload, AdminShopifyError> {
        Err(AdminShopifyError::GraphQL(vec![GraphQLError {
            extensions: Some(serde_json::json!({ "code": "ACCESS_DENIED" })),
            ..GraphQLError::message("Access denied for companyCreate field.")
        }]))
    }

    fn user_error(message: &str, code: Option<&str>) -> UserError {
        UserError {
            field: Some(vec!["input".to_string()]),
            message: message.to_string(),
            code: code.map(str::to_string),
        }
    }

    fn plus_company() -> CompanyCreatePayload {
        CompanyCreatePayload {
            company: Some(Company {
                id: "gid://shopify/Company/1".to_string(),
                name: "Acme Corp".to_string(),
                external_id: Some("12345".to_string()),
                main_contact: Some(CompanyContact {
                    id: "gid://shopify/CompanyContact/1".to_string(),
                    customer: Some(customer("gid://shopify/Customer/9", "jane@x.com")),
                }),
                locations: Connection {
                    edges: vec![Edge {
                        node: CompanyLocation {
                            id: "gid://shopify/CompanyLocation/1".to_string(),
                            name: "Acme Corp - Main Location".to_string(),
                            shipping_address: None,
                            billing_address: None,
                        },
                    }],
                },
            }),
            user_errors: vec![],
        }
    }

    fn reconciler(
        form: Form,
        session: Option<ShopSession>,
        shopify: &Arc<FakeShopify>,
    ) -> Reconciler<FakeForms, FakeSessions, FakeConnector> {
        Reconciler::new(
            FakeForms(Some(form)),
            FakeSessions(session),
            FakeConnector(Arc::clone(shopify)),
        )
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    // -------------------------------------------------------------------------
    // Standard mode
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_standard_submission_creates_customer() {
        let shopify = Arc::new(FakeShopify::default().with_create(created("jane@x.com")));
        let outcome = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.message, note::MSG_STANDARD_SUCCESS);
        assert_eq!(
            outcome.customer.as_ref().and_then(|c| c.email.as_deref()),
            Some("jane@x.com")
        );
        assert_eq!(outcome.is_shopify_plus, None);
        assert_eq!(shopify.customer_creates(), 1);
        assert_eq!(shopify.company_creates(), 0);

        let calls = shopify.calls();
        let Call::CustomerCreate(input) = &calls[0] else {
            panic!("expected customerCreate");
        };
        assert_eq!(input.email.as_deref(), Some("jane@x.com"));
        assert_eq!(input.tags, vec!["form-12345", "form-submission"]);
        assert_eq!(
            input.note.as_deref(),
            Some("Created via ShopiForm: Wholesale (Code: 12345)")
        );
        assert!(input.addresses.is_empty());
    }

    #[tokio::test]
    async fn test_standard_success_envelope() {
        let shopify = Arc::new(FakeShopify::default().with_create(created("jane@x.com")));
        let outcome = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap();

        let json = body_json(outcome.into_response()).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["customer"]["email"], "jane@x.com");
        assert_eq!(json["submissionData"]["Email"], "jane@x.com");
        assert_eq!(json["submissionData"]["field-1"], "jane@x.com");
        assert!(json.get("company").is_none());
        assert!(json.get("isShopifyPlus").is_none());
    }

    #[tokio::test]
    async fn test_standard_graphql_errors_abort_with_400() {
        let shopify = Arc::new(FakeShopify::default().with_create(Err(
            AdminShopifyError::GraphQL(vec![GraphQLError::message("Throttled")]),
        )));
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::CustomerRejected(ProviderErrors::GraphQL(_))));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Failed to create customer");
        assert_eq!(json["details"][0]["message"], "Throttled");
    }

    #[tokio::test]
    async fn test_standard_user_errors_abort_with_400() {
        let shopify = Arc::new(FakeShopify::default().with_create(Ok(CustomerPayload {
            customer: None,
            user_errors: vec![user_error("Email has already been taken", None)],
        })));
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["details"][0]["message"], "Email has already been taken");
    }

    #[tokio::test]
    async fn test_customer_without_id_is_500() {
        let shopify = Arc::new(FakeShopify::default().with_create(Ok(CustomerPayload::default())));
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::NoCustomerReturned));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_customer_transport_failure_is_502() {
        let shopify = Arc::new(FakeShopify::default().with_create(Err(AdminShopifyError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })));
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "Failed to reach Shopify");
    }

    #[tokio::test]
    async fn test_identical_submissions_are_not_deduplicated() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_create(created("jane@x.com"))
                .with_create(created("jane@x.com")),
        );
        let reconciler = reconciler(contact_form(), Some(good_session()), &shopify);
        reconciler.submit(request(&[("field-1", "jane@x.com")])).await.unwrap();
        reconciler.submit(request(&[("field-1", "jane@x.com")])).await.unwrap();

        assert_eq!(shopify.customer_creates(), 2);
    }

    // -------------------------------------------------------------------------
    // Validation and session
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_code_or_shop() {
        let shopify = Arc::new(FakeShopify::default());
        let mut req = request(&[("field-1", "jane@x.com")]);
        req.shop = "  ".to_string();
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(req)
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "Form code and shop are required");
    }

    #[tokio::test]
    async fn test_form_from_other_shop_is_not_found() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("shop", "other.myshopify.com"), ("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::FormNotFound));
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_code_is_not_found() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("formCode", "abc"), ("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::FormNotFound));
    }

    #[tokio::test]
    async fn test_missing_email_is_400_without_calls() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-2", "Jane")]))
            .await
            .unwrap_err();

        assert!(shopify.calls().is_empty());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Email is required to create a customer");
    }

    #[tokio::test]
    async fn test_invalid_email_is_400() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), Some(good_session()), &shopify)
            .submit(request(&[("field-1", "jane at x")]))
            .await
            .unwrap_err();

        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "Invalid email address");
    }

    #[tokio::test]
    async fn test_no_session_is_503_with_submission_data() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), None, &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert!(shopify.calls().is_empty());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "No shop session found");
        assert_eq!(json["message"], note::MSG_NO_SESSION);
        assert_eq!(json["submissionData"]["Email"], "jane@x.com");
    }

    #[tokio::test]
    async fn test_empty_token_is_invalid_session() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), Some(session("write_customers", "")), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "Invalid session");
    }

    #[tokio::test]
    async fn test_missing_write_customers_is_403() {
        let shopify = Arc::new(FakeShopify::default());
        let err = reconciler(contact_form(), Some(session("read_customers", "shpat_token")), &shopify)
            .submit(request(&[("field-1", "jane@x.com")]))
            .await
            .unwrap_err();

        assert!(shopify.calls().is_empty());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Missing required permissions");
        assert_eq!(json["note"], note::NOTE_MISSING_SCOPE);
    }

    // -------------------------------------------------------------------------
    // Company mode
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn test_empty_company_name_takes_standard_path() {
        let shopify = Arc::new(FakeShopify::default().with_create(created("jane@x.com")));
        let outcome = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request(""))
            .await
            .unwrap();

        assert_eq!(outcome.message, note::MSG_STANDARD_SUCCESS);
        assert_eq!(shopify.company_creates(), 0);
        assert_eq!(shopify.customer_creates(), 1);
    }

    #[tokio::test]
    async fn test_plus_path_creates_company_and_tags_contact() {
        let mut updated = customer("gid://shopify/Customer/9", "jane@x.com");
        updated.tags = vec!["form-12345".to_string(), "company-customer".to_string()];
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(Ok(plus_company()))
                .with_update(Ok(CustomerPayload {
                    customer: Some(updated),
                    user_errors: vec![],
                })),
        );
        let outcome = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap();

        assert_eq!(shopify.company_creates(), 1);
        assert_eq!(shopify.customer_updates(), 1);
        assert_eq!(shopify.customer_creates(), 0);

        assert_eq!(outcome.message, note::MSG_PLUS_SUCCESS);
        assert_eq!(outcome.is_shopify_plus, Some(true));
        assert_eq!(outcome.note, None);
        let customer = outcome.customer.unwrap();
        assert_eq!(customer.id, "gid://shopify/Customer/9");
        assert!(customer.tags.contains(&"company-customer".to_string()));
        assert_eq!(
            outcome.company_location.map(|l| l.id),
            Some("gid://shopify/CompanyLocation/1".to_string())
        );

        let calls = shopify.calls();
        let Call::CustomerUpdate(input) = &calls[1] else {
            panic!("expected customerUpdate");
        };
        assert_eq!(input.id.as_deref(), Some("gid://shopify/Customer/9"));
        assert_eq!(
            input.tags,
            vec!["form-12345", "form-submission", "company-customer", "company:Acme Corp"]
        );
    }

    #[tokio::test]
    async fn test_company_input_shape() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(Ok(plus_company()))
                .with_update(created("jane@x.com")),
        );
        let mut req = company_request("Acme Corp");
        for (k, v) in [
            ("field-3_shipping_street", "9 Dock Rd"),
            ("field-3_shipping_city", "Houston"),
            ("field-3_shipping_country", "US"),
            ("field-3_shipping_province", "TX"),
        ] {
            req.values.insert(k.to_string(), v.to_string());
        }
        reconciler(company_form(), Some(good_session()), &shopify)
            .submit(req)
            .await
            .unwrap();

        let calls = shopify.calls();
        let Call::CompanyCreate(input) = &calls[0] else {
            panic!("expected companyCreate");
        };
        assert_eq!(input.company.name, "Acme Corp");
        assert_eq!(input.company.external_id, "12345");
        assert_eq!(input.company_location.name, "Acme Corp - Main Location");
        assert!(!input.company_location.billing_same_as_shipping);
        assert_eq!(input.company_location.shipping_address.address1.as_deref(), Some("9 Dock Rd"));
        assert_eq!(input.company_location.shipping_address.zone_code.as_deref(), Some("TX"));
        assert_eq!(
            input.company_location.billing_address.as_ref().and_then(|a| a.address1.as_deref()),
            Some("1 Main St")
        );
        assert_eq!(input.company_contact.email, "jane@x.com");
        assert_eq!(input.company_contact.first_name.as_deref(), Some("Jane"));
    }

    #[tokio::test]
    async fn test_billing_only_company_ships_to_billing() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(Ok(plus_company()))
                .with_update(created("jane@x.com")),
        );
        reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap();

        let calls = shopify.calls();
        let Call::CompanyCreate(input) = &calls[0] else {
            panic!("expected companyCreate");
        };
        assert!(input.company_location.billing_same_as_shipping);
        assert!(input.company_location.billing_address.is_none());
        assert_eq!(input.company_location.shipping_address.address1.as_deref(), Some("1 Main St"));
        assert_eq!(input.company_location.shipping_address.country_code.as_deref(), Some("US"));
    }

    #[tokio::test]
    async fn test_access_denied_falls_back_to_customer() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(access_denied())
                .with_create(created("jane@x.com")),
        );
        let outcome = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.is_shopify_plus, Some(false));
        assert!(outcome.note.unwrap().contains("Shopify Plus"));
        assert!(outcome.company.is_none());
        assert!(outcome.customer.is_some());
        assert_eq!(shopify.company_creates(), 1);
        assert_eq!(shopify.customer_creates(), 1);

        let calls = shopify.calls();
        let Call::CustomerCreate(input) = &calls[1] else {
            panic!("expected customerCreate");
        };
        assert!(input.tags.contains(&"company-customer".to_string()));
        assert!(input.tags.contains(&"company:Acme Corp".to_string()));
        assert!(input.note.as_deref().unwrap().contains("- Company: Acme Corp"));
        assert_eq!(input.addresses.len(), 1);
        assert_eq!(input.addresses[0].company.as_deref(), Some("Acme Corp"));
        assert_eq!(input.addresses[0].address1.as_deref(), Some("1 Main St"));

        let json = body_json(outcome.into_response()).await;
        assert_eq!(json["isShopifyPlus"], false);
        assert!(json.get("company").is_none());
    }

    #[tokio::test]
    async fn test_plan_restriction_user_error_falls_back() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(Ok(CompanyCreatePayload {
                    company: None,
                    user_errors: vec![user_error(
                        "B2B features are only available on Shopify Plus",
                        None,
                    )],
                }))
                .with_create(created("jane@x.com")),
        );
        let outcome = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap();

        assert_eq!(outcome.message, note::MSG_FALLBACK_SUCCESS);
        assert_eq!(shopify.company_creates(), 1);
    }

    #[tokio::test]
    async fn test_company_transport_failure_falls_back_without_retry() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(Err(AdminShopifyError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                }))
                .with_create(created("jane@x.com")),
        );
        let outcome = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap();

        assert_eq!(outcome.is_shopify_plus, Some(false));
        assert_eq!(shopify.company_creates(), 1);
        assert_eq!(shopify.customer_creates(), 1);
    }

    #[tokio::test]
    async fn test_fallback_includes_separate_shipping_address() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(access_denied())
                .with_create(created("jane@x.com")),
        );
        let mut req = company_request("Acme Corp");
        for (k, v) in [
            ("field-3_shipping_street", "9 Dock Rd"),
            ("field-3_shipping_city", "Houston"),
            ("field-3_shipping_country", "US"),
        ] {
            req.values.insert(k.to_string(), v.to_string());
        }
        reconciler(company_form(), Some(good_session()), &shopify)
            .submit(req)
            .await
            .unwrap();

        let calls = shopify.calls();
        let Call::CustomerCreate(input) = &calls[1] else {
            panic!("expected customerCreate");
        };
        let streets: Vec<_> = input
            .addresses
            .iter()
            .map(|a| a.address1.as_deref().unwrap())
            .collect();
        assert_eq!(streets, vec!["1 Main St", "9 Dock Rd"]);
        assert!(input.note.as_deref().unwrap().contains("Shipping Address:"));
    }

    #[tokio::test]
    async fn test_other_company_user_errors_are_400() {
        let shopify = Arc::new(FakeShopify::default().with_company(Ok(CompanyCreatePayload {
            company: None,
            user_errors: vec![user_error("Name is too long", Some("TOO_LONG"))],
        })));
        let err = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap_err();

        assert_eq!(shopify.customer_creates(), 0);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Failed to create company");
        assert_eq!(json["details"][0]["code"], "TOO_LONG");
    }

    #[tokio::test]
    async fn test_other_company_graphql_errors_are_400() {
        let shopify = Arc::new(FakeShopify::default().with_company(Err(
            AdminShopifyError::GraphQL(vec![GraphQLError::message("Field 'foo' doesn't exist")]),
        )));
        let err = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::CompanyRejected(ProviderErrors::GraphQL(_))));
        assert_eq!(shopify.customer_creates(), 0);
    }

    #[tokio::test]
    async fn test_tag_user_errors_are_400() {
        let shopify = Arc::new(
            FakeShopify::default()
                .with_company(Ok(plus_company()))
                .with_update(Ok(CustomerPayload {
                    customer: None,
                    user_errors: vec![user_error("Note is too long", None)],
                })),
        );
        let err = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmissionError::TagRejected(_)));
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "Failed to tag customer");
    }

    #[tokio::test]
    async fn test_company_without_contact_customer_skips_tagging() {
        let mut payload = plus_company();
        if let Some(company) = payload.company.as_mut() {
            company.main_contact = None;
        }
        let shopify = Arc::new(FakeShopify::default().with_company(Ok(payload)));
        let outcome = reconciler(company_form(), Some(good_session()), &shopify)
            .submit(company_request("Acme Corp"))
            .await
            .unwrap();

        assert_eq!(shopify.customer_updates(), 0);
        assert!(outcome.customer.is_none());
        assert!(outcome.company.is_some());
    }
}
