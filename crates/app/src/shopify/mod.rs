//! Shopify Admin GraphQL API client.
//!
//! One [`AdminClient`] is built per submission from the shop's session token.
//! It issues the three mutations the reconciler needs (`companyCreate`,
//! `customerCreate`, `customerUpdate`) and returns each mutation's payload so
//! callers can inspect `userErrors` themselves. Top-level GraphQL errors come
//! back as [`AdminShopifyError::GraphQL`] with the provider's error objects
//! intact.

mod client;
pub mod mutations;
pub mod types;

pub use client::{AdminClient, AdminConnector};
pub use types::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when interacting with Shopify Admin API.
#[derive(Debug, Error)]
pub enum AdminShopifyError {
    /// HTTP request failed (connect error, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Non-success HTTP status other than 401/429.
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response had data but not the mutation's payload.
    #[error("Missing payload: {0}")]
    MissingPayload(&'static str),
}

impl AdminShopifyError {
    /// Whether Shopify refused the operation because the shop's plan lacks it.
    ///
    /// Only GraphQL errors can carry that signal; transport failures cannot.
    #[must_use]
    pub fn is_plan_restriction(&self) -> bool {
        match self {
            Self::GraphQL(errors) => errors.iter().any(GraphQLError::is_plan_restriction),
            _ => false,
        }
    }
}

/// A GraphQL error returned by the Shopify Admin API.
///
/// Serialized back to callers unchanged as failure `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    /// Provider-specific extras such as `code`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl GraphQLError {
    /// Builds an error with only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: vec![],
            path: vec![],
            extensions: None,
        }
    }

    /// `extensions.code`, if present.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.extensions
            .as_ref()
            .and_then(|e| e.get("code"))
            .and_then(serde_json::Value::as_str)
    }

    /// Whether this error says B2B features are unavailable on the shop's plan.
    #[must_use]
    pub fn is_plan_restriction(&self) -> bool {
        is_plan_restriction(&self.message, self.code())
    }
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

const ACCESS_DENIED: &str = "ACCESS_DENIED";

/// Shared by GraphQL errors and mutation `userErrors`.
fn is_plan_restriction(message: &str, code: Option<&str>) -> bool {
    message.contains("Shopify Plus")
        || message.contains("not available")
        || code == Some(ACCESS_DENIED)
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}
