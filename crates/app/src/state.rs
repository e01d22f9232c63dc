//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::shopify::AdminConnector;

/// Application state shared across all handlers.
///
/// Created once in `main` and cloned into every handler; the clones share
/// one pool and one HTTP client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    admin: AdminConnector,
}

impl AppState {
    /// Create the state, building the outbound HTTP client from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(config.shopify.request_timeout)
            .user_agent(concat!("shopiform/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let admin = AdminConnector::new(http, config.shopify.api_version.clone());
        Ok(Self::with_admin(config, pool, admin))
    }

    /// Create the state around an existing Admin API connector.
    #[must_use]
    pub fn with_admin(config: AppConfig, pool: PgPool, admin: AdminConnector) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                admin,
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the Admin API connector.
    #[must_use]
    pub fn admin(&self) -> &AdminConnector {
        &self.inner.admin
    }

    /// Close the pool. Safe to call more than once.
    pub async fn close(&self) {
        if !self.inner.pool.is_closed() {
            self.inner.pool.close().await;
            tracing::info!("database pool closed");
        }
    }
}
