//! Subcommand implementations.

pub mod forms;
pub mod migrate;
pub mod session;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Errors shared by the database-backed commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository operation failed.
    #[error(transparent)]
    Repository(#[from] shopiform_app::db::RepositoryError),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Argument failed validation.
    #[error("Invalid {0}: {1}")]
    Invalid(&'static str, String),
}

/// Connect using `SHOPIFORM_DATABASE_URL`, falling back to `DATABASE_URL`.
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("SHOPIFORM_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CommandError::MissingEnvVar("SHOPIFORM_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = shopiform_app::db::create_pool(&SecretString::from(database_url)).await?;
    Ok(pool)
}
