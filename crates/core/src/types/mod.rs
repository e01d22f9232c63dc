//! Core types for ShopiForm.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod code;
pub mod email;
pub mod field;
pub mod id;
pub mod shop;

pub use code::{FormCode, FormCodeError};
pub use email::{Email, EmailError};
pub use field::{FieldType, FieldTypeError};
pub use id::*;
pub use shop::{ShopDomain, ShopDomainError};
