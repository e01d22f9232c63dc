//! Form and field models.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shopiform_core::{FieldType, FormCode, FormId, ShopDomain};

/// A form with its fields in position order.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub id: FormId,
    pub code: FormCode,
    pub shop: ShopDomain,
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    /// The first field of type `company`, if the form has one.
    #[must_use]
    pub fn company_field(&self) -> Option<&FormField> {
        self.fields
            .iter()
            .find(|f| f.field_type == FieldType::Company)
    }
}

/// A single form field.
///
/// `id` is chosen by the form builder (e.g. `field-1700000000000`) and is the
/// key the storefront posts the value under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Row for the form list: no fields, just how many.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSummary {
    pub id: FormId,
    pub code: FormCode,
    pub title: String,
    pub description: Option<String>,
    pub field_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a create or update request.
#[derive(Debug, Clone, Deserialize)]
pub struct FormInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FormField>,
}

/// Why a [`FormInput`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormInputError {
    #[error("Form title is required")]
    EmptyTitle,
    #[error("Field {position} is missing an id")]
    EmptyFieldId { position: usize },
    #[error("Field id '{0}' is used more than once")]
    DuplicateFieldId(String),
    #[error("Field '{0}' is missing a label")]
    EmptyLabel(String),
}

/// A validated form body, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormDraft {
    pub title: String,
    pub description: Option<String>,
    pub fields: Vec<FormField>,
}

impl FormInput {
    /// Validate and normalize the input.
    ///
    /// Titles and labels are trimmed, blank descriptions and placeholders
    /// become `None`, and options are dropped for field types that do not
    /// use them.
    ///
    /// # Errors
    ///
    /// Returns [`FormInputError`] for a blank title, a blank or repeated
    /// field id, or a blank label.
    pub fn into_draft(self) -> Result<FormDraft, FormInputError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(FormInputError::EmptyTitle);
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for (position, field) in self.fields.into_iter().enumerate() {
            let id = field.id.trim().to_string();
            if id.is_empty() {
                return Err(FormInputError::EmptyFieldId { position });
            }
            if !seen.insert(id.clone()) {
                return Err(FormInputError::DuplicateFieldId(id));
            }
            let label = field.label.trim().to_string();
            if label.is_empty() {
                return Err(FormInputError::EmptyLabel(id));
            }

            let options = if field.field_type.supports_options() {
                field.options.map(|opts| {
                    opts.into_iter()
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
            } else {
                None
            };

            fields.push(FormField {
                id,
                field_type: field.field_type,
                label,
                placeholder: non_blank(field.placeholder),
                required: field.required,
                options,
            });
        }

        Ok(FormDraft {
            title,
            description: non_blank(self.description),
            fields,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
