//! Form repository.
//!
//! A form and its fields are always written together inside one transaction,
//! so a form is never observed with a partial field list.

use chrono::{DateTime, Utc};
use rand::Rng;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};

use shopiform_core::{FieldType, FormCode, FormId, ShopDomain};

use super::RepositoryError;
use crate::models::{Form, FormDraft, FormField, FormSummary};
use crate::services::code::{CodeGenerationError, generate_unique_code};

/// Unique constraint on `forms.code`.
const CODE_CONSTRAINT: &str = "forms_code_key";
/// Inserts retried when another request claims the same code first.
const INSERT_ATTEMPTS: usize = 3;

/// Shown to the merchant when no code could be reserved.
const CODE_UNAVAILABLE: &str = "No form code is free right now, please try again";

const FORM_COLUMNS: &str = "id, code, shop, title, description, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct FormRow {
    id: i32,
    code: String,
    shop: String,
    title: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FormRow {
    fn into_form(self, fields: Vec<FormField>) -> Result<Form, RepositoryError> {
        let code = FormCode::parse(&self.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid form code in database: {e}"))
        })?;
        let shop = ShopDomain::parse(&self.shop).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shop in database: {e}"))
        })?;

        Ok(Form {
            id: FormId::new(self.id),
            code,
            shop,
            title: self.title,
            description: self.description,
            fields,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FieldRow {
    id: String,
    field_type: FieldType,
    label: String,
    placeholder: Option<String>,
    required: bool,
    options: Option<Json<Vec<String>>>,
}

impl From<FieldRow> for FormField {
    fn from(row: FieldRow) -> Self {
        Self {
            id: row.id,
            field_type: row.field_type,
            label: row.label,
            placeholder: row.placeholder,
            required: row.required,
            options: row.options.map(|Json(options)| options),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FormSummaryRow {
    id: i32,
    code: String,
    title: String,
    description: Option<String>,
    field_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FormSummaryRow> for FormSummary {
    type Error = RepositoryError;

    fn try_from(row: FormSummaryRow) -> Result<Self, Self::Error> {
        let code = FormCode::parse(&row.code).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid form code in database: {e}"))
        })?;

        Ok(Self {
            id: FormId::new(row.id),
            code,
            title: row.title,
            description: row.description,
            field_count: row.field_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for forms and their fields.
#[derive(Clone, Copy)]
pub struct FormRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> FormRepository<'a> {
    /// Create a new form repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List a shop's forms, newest first, with field counts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_shop(&self, shop: &ShopDomain) -> Result<Vec<FormSummary>, RepositoryError> {
        let rows = sqlx::query_as::<_, FormSummaryRow>(
            r"
            SELECT f.id, f.code, f.title, f.description, f.created_at, f.updated_at,
                   COUNT(ff.id) AS field_count
            FROM forms f
            LEFT JOIN form_fields ff ON ff.form_id = f.id
            WHERE f.shop = $1
            GROUP BY f.id
            ORDER BY f.created_at DESC, f.id DESC
            ",
        )
        .bind(shop)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get a form by id, only if it belongs to `shop`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_for_shop(
        &self,
        id: FormId,
        shop: &ShopDomain,
    ) -> Result<Option<Form>, RepositoryError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM forms WHERE id = $1 AND shop = $2"
        ))
        .bind(id)
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        self.with_fields(row).await
    }

    /// Get a form by its public code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn find_by_code(&self, code: &FormCode) -> Result<Option<Form>, RepositoryError> {
        let row = sqlx::query_as::<_, FormRow>(&format!(
            "SELECT {FORM_COLUMNS} FROM forms WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        self.with_fields(row).await
    }

    /// Whether any form already holds `code`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn code_exists(&self, code: &FormCode) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM forms WHERE code = $1)",
        )
        .bind(code)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Create a form with a freshly generated code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if no free code could be found or
    /// every insert lost a race for its code.
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn create<R: Rng + Send>(
        &self,
        shop: &ShopDomain,
        draft: &FormDraft,
        rng: &mut R,
    ) -> Result<Form, RepositoryError> {
        let repo = *self;

        for attempt in 1..=INSERT_ATTEMPTS {
            let code = generate_unique_code(rng, move |code| async move {
                repo.code_exists(&code).await
            })
            .await
            .map_err(code_generation_failed)?;

            match self.insert(shop, &code, draft).await {
                Ok(form) => {
                    tracing::info!(form_id = %form.id, code = %form.code, shop = %shop, "form created");
                    return Ok(form);
                }
                Err(e) if e.is_unique_violation(CODE_CONSTRAINT) => {
                    tracing::warn!(code = %code, attempt, "form code claimed concurrently, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(shop = %shop, attempts = INSERT_ATTEMPTS, "every insert lost its form code");
        Err(RepositoryError::Conflict(CODE_UNAVAILABLE.to_string()))
    }

    /// Update title and description and replace the field list.
    ///
    /// Returns `None` if the form does not exist or belongs to another shop.
    /// The code is never changed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails; nothing is written
    /// in that case.
    pub async fn update(
        &self,
        id: FormId,
        shop: &ShopDomain,
        draft: &FormDraft,
    ) -> Result<Option<Form>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(row) = sqlx::query_as::<_, FormRow>(&format!(
            r"
            UPDATE forms
            SET title = $3, description = $4, updated_at = NOW()
            WHERE id = $1 AND shop = $2
            RETURNING {FORM_COLUMNS}
            "
        ))
        .bind(id)
        .bind(shop)
        .bind(&draft.title)
        .bind(draft.description.as_deref())
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        sqlx::query("DELETE FROM form_fields WHERE form_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        insert_fields(&mut tx, id, &draft.fields).await?;

        tx.commit().await?;

        row.into_form(draft.fields.clone()).map(Some)
    }

    /// Delete a form; its fields go with it.
    ///
    /// Returns whether a form was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: FormId, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM forms WHERE id = $1 AND shop = $2")
            .bind(id)
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Total number of forms across all shops.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM forms")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    async fn insert(
        &self,
        shop: &ShopDomain,
        code: &FormCode,
        draft: &FormDraft,
    ) -> Result<Form, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, FormRow>(&format!(
            r"
            INSERT INTO forms (code, shop, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {FORM_COLUMNS}
            "
        ))
        .bind(code)
        .bind(shop)
        .bind(&draft.title)
        .bind(draft.description.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        insert_fields(&mut tx, FormId::new(row.id), &draft.fields).await?;
        tx.commit().await?;

        row.into_form(draft.fields.clone())
    }

    async fn with_fields(&self, row: Option<FormRow>) -> Result<Option<Form>, RepositoryError> {
        let Some(row) = row else {
            return Ok(None);
        };

        let fields = sqlx::query_as::<_, FieldRow>(
            r"
            SELECT id, field_type, label, placeholder, required, options
            FROM form_fields
            WHERE form_id = $1
            ORDER BY position
            ",
        )
        .bind(row.id)
        .fetch_all(self.pool)
        .await?;

        row.into_form(fields.into_iter().map(FormField::from).collect())
            .map(Some)
    }
}

fn code_generation_failed(err: CodeGenerationError) -> RepositoryError {
    match err {
        CodeGenerationError::Repository(e) => e,
        other => {
            tracing::warn!(error = %other, "form code generation failed");
            RepositoryError::Conflict(CODE_UNAVAILABLE.to_string())
        }
    }
}

async fn insert_fields(
    tx: &mut Transaction<'_, Postgres>,
    form_id: FormId,
    fields: &[FormField],
) -> Result<(), RepositoryError> {
    for (position, field) in fields.iter().enumerate() {
        let position = i32::try_from(position)
            .map_err(|_| RepositoryError::Conflict("Form has too many fields".to_string()))?;

        sqlx::query(
            r"
            INSERT INTO form_fields
                (form_id, id, position, field_type, label, placeholder, required, options)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(form_id)
        .bind(&field.id)
        .bind(position)
        .bind(field.field_type)
        .bind(&field.label)
        .bind(field.placeholder.as_deref())
        .bind(field.required)
        .bind(field.options.as_ref().map(Json))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_code_space_is_a_conflict() {
        let err = code_generation_failed(CodeGenerationError::Exhausted { attempts: 64 });
        assert!(matches!(err, RepositoryError::Conflict(ref msg) if msg == CODE_UNAVAILABLE));
    }

    #[test]
    fn test_existence_check_failure_is_passed_through() {
        let err = code_generation_failed(CodeGenerationError::Repository(
            RepositoryError::DataCorruption("forms.code".to_string()),
        ));
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
