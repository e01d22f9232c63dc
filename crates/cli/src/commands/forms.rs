//! Form inspection commands.

use rand::SeedableRng;
use rand::rngs::StdRng;

use shopiform_app::db::{FormRepository, RepositoryError};
use shopiform_app::services::code::{CodeGenerationError, generate_unique_code};
use shopiform_core::ShopDomain;

use super::{CommandError, connect};

/// List a shop's forms, newest first.
pub async fn list(shop: &str) -> Result<(), CommandError> {
    let shop =
        ShopDomain::parse(shop).map_err(|e| CommandError::Invalid("shop", e.to_string()))?;
    let pool = connect().await?;
    let forms = FormRepository::new(&pool).list_by_shop(&shop).await?;
    pool.close().await;

    if forms.is_empty() {
        tracing::info!("{} has no forms", shop);
    }
    for form in forms {
        tracing::info!(
            "{} [{}] {} ({} fields, updated {})",
            form.id,
            form.code,
            form.title,
            form.field_count,
            form.updated_at.to_rfc3339()
        );
    }
    Ok(())
}

/// Draw a code that no stored form holds.
///
/// The code is not reserved; a form created afterwards may still take it.
pub async fn generate_code() -> Result<(), CommandError> {
    let pool = connect().await?;
    let repo = FormRepository::new(&pool);
    let mut rng = StdRng::from_os_rng();

    let code = generate_unique_code(&mut rng, |code| async move { repo.code_exists(&code).await })
        .await
        .map_err(|e| match e {
            CodeGenerationError::Repository(e) => CommandError::Repository(e),
            other => CommandError::Repository(RepositoryError::Conflict(other.to_string())),
        })?;
    pool.close().await;

    tracing::info!("Unused form code: {}", code);
    Ok(())
}
