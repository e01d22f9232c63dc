//! Response types for the Admin API mutations.
//!
//! These mirror the selection sets in [`super::mutations`] and are echoed
//! back to the storefront as-is, so field names stay in Shopify's camelCase.

use serde::{Deserialize, Serialize};

/// A mutation `userErrors` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl UserError {
    /// Whether this error says B2B features are unavailable on the shop's plan.
    #[must_use]
    pub fn is_plan_restriction(&self) -> bool {
        super::is_plan_restriction(&self.message, self.code.as_deref())
    }
}

/// A relay-style connection; only `edges { node }` is selected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection<T> {
    #[serde(default = "Vec::new")]
    pub edges: Vec<Edge<T>>,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self { edges: Vec::new() }
    }
}

impl<T> Connection<T> {
    /// The first node, if any.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.edges.first().map(|e| &e.node)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge<T> {
    pub node: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MailingAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A customer address as returned by `customerCreate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailingAddress {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub main_contact: Option<CompanyContact>,
    #[serde(default)]
    pub locations: Connection<CompanyLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyContact {
    pub id: String,
    #[serde(default)]
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub shipping_address: Option<CompanyAddress>,
    #[serde(default)]
    pub billing_address: Option<CompanyAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyAddress {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub address1: Option<String>,
    #[serde(default)]
    pub address2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Payload of `customerCreate` and `customerUpdate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

/// Payload of `companyCreate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyCreatePayload {
    #[serde(default)]
    pub company: Option<Company>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}
