//! Business logic that sits between the routes and the repositories.
//!
//! - [`code`] - Unique public form codes
//! - [`submission`] - Storefront submissions into Shopify customers and companies

pub mod code;
pub mod submission;
