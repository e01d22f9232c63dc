//! Turns a flat map of posted values into a typed [`Submission`].
//!
//! Values are looked up by field id. The company field posts its address
//! parts under `{field_id}_billing_*` and `{field_id}_shipping_*`.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use shopiform_core::{Email, EmailError, FieldType};

use crate::models::{Form, FormField};

/// Why a submission was rejected before any Shopify call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionParseError {
    #[error("Email is required to create a customer")]
    EmailRequired,

    #[error("Invalid email address: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Please fill in the following required fields: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
}

/// Who submitted the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email: Email,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// One address block of the company field. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: Option<String>,
    pub apartment: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
}

impl AddressParts {
    /// Street, city and country are all present.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.street.is_some() && self.city.is_some() && self.country.is_some()
    }

    /// `street[, apartment]`, if there is a street.
    #[must_use]
    pub fn street_line(&self) -> Option<String> {
        let street = self.street.as_deref()?;
        Some(match self.apartment.as_deref() {
            Some(apartment) => format!("{street}, {apartment}"),
            None => street.to_string(),
        })
    }
}

/// Company details posted through a `company` field with a company name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyDetails {
    pub name: String,
    pub billing: AddressParts,
    /// Only set when the shipping block is complete.
    pub shipping: Option<AddressParts>,
}

impl CompanyDetails {
    /// The address a company location ships to.
    #[must_use]
    pub fn shipping_or_billing(&self) -> &AddressParts {
        self.shipping.as_ref().unwrap_or(&self.billing)
    }
}

/// A validated submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub contact: Contact,
    /// Present only in company mode.
    pub company: Option<CompanyDetails>,
    /// Every non-empty field value, keyed by both label and field id.
    pub data: BTreeMap<String, String>,
}

impl Submission {
    /// Parse `values` against `form`'s fields.
    ///
    /// # Errors
    ///
    /// Fails when no email can be found, when the email is malformed, or when
    /// a required field has no value. A required `company` field counts as
    /// filled when its billing company name is.
    pub fn parse(
        form: &Form,
        values: &HashMap<String, String>,
    ) -> Result<Self, SubmissionParseError> {
        let lookup = |key: &str| -> Option<String> {
            values
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let mut data = BTreeMap::new();
        let mut by_id: HashMap<&str, String> = HashMap::new();
        for field in &form.fields {
            if let Some(value) = lookup(&field.id) {
                data.insert(field.label.clone(), value.clone());
                data.insert(field.id.clone(), value.clone());
                by_id.insert(field.id.as_str(), value);
            }
        }

        let by_label = |label: &str| data.get(label).cloned();
        let by_type = |field_type: FieldType| {
            form.fields
                .iter()
                .filter(|f| f.field_type == field_type)
                .find_map(|f| by_id.get(f.id.as_str()).cloned())
        };

        let phone = by_label("Phone").or_else(|| by_type(FieldType::Phone));
        let email = by_label("Email")
            .or_else(|| by_type(FieldType::Email))
            .ok_or(SubmissionParseError::EmailRequired)?;
        let email = Email::parse(&email)?;

        let contact = Contact {
            email,
            first_name: by_label("First Name").or_else(|| by_label("Name")),
            last_name: by_label("Last Name"),
            phone,
        };

        let company = form
            .company_field()
            .and_then(|field| parse_company(field, &lookup, contact.phone.as_deref()));

        let missing: Vec<String> = form
            .fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| match f.field_type {
                FieldType::Company => lookup(&company_key(f, "billing_company_name")).is_none(),
                _ => !by_id.contains_key(f.id.as_str()),
            })
            .map(|f| f.label.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SubmissionParseError::MissingRequired(missing));
        }

        Ok(Self {
            contact,
            company,
            data,
        })
    }
}

fn company_key(field: &FormField, suffix: &str) -> String {
    format!("{}_{suffix}", field.id)
}

fn parse_company(
    field: &FormField,
    lookup: &impl Fn(&str) -> Option<String>,
    contact_phone: Option<&str>,
) -> Option<CompanyDetails> {
    let name = lookup(&company_key(field, "billing_company_name"))?;

    let block = |prefix: &str| AddressParts {
        street: lookup(&company_key(field, &format!("{prefix}_street"))),
        apartment: lookup(&company_key(field, &format!("{prefix}_apartment"))),
        postal_code: lookup(&company_key(field, &format!("{prefix}_postal_code"))),
        city: lookup(&company_key(field, &format!("{prefix}_city"))),
        province: lookup(&company_key(field, &format!("{prefix}_province"))),
        country: lookup(&company_key(field, &format!("{prefix}_country"))),
        phone: lookup(&company_key(field, &format!("{prefix}_phone")))
            .or_else(|| contact_phone.map(str::to_string)),
    };

    let shipping = block("shipping");
    Some(CompanyDetails {
        name,
        billing: block("billing"),
        shipping: shipping.is_complete().then_some(shipping),
    })
}
