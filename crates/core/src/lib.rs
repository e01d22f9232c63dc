//! ShopiForm Core - Shared domain types.
//!
//! This crate provides the types shared by every ShopiForm component:
//! - `app` - Embedded admin API, app proxy endpoints and the submission reconciler
//! - `cli` - Command-line tools for migrations and shop session management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Validation happens once, at construction, so the rest
//! of the workspace can rely on a `FormCode` or `ShopDomain` being well formed.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for form ids, form codes, shop domains,
//!   emails and field types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
