//! Shop session repository.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;

use shopiform_core::ShopDomain;

use super::RepositoryError;
use crate::models::{ShopSession, select_session};

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    shop: String,
    is_online: bool,
    scope: Option<String>,
    expires: Option<DateTime<Utc>>,
    access_token: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for ShopSession {
    type Error = RepositoryError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let shop = ShopDomain::parse(&row.shop).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid shop in session {}: {e}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            shop,
            is_online: row.is_online,
            scope: row.scope,
            expires: row.expires,
            access_token: SecretString::from(row.access_token),
            created_at: row.created_at,
        })
    }
}

/// Repository for shop sessions.
#[derive(Clone, Copy)]
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All sessions stored for a shop, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_shop(&self, shop: &ShopDomain) -> Result<Vec<ShopSession>, RepositoryError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r"
            SELECT id, shop, is_online, scope, expires, access_token, created_at
            FROM shopify_sessions
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// The session to use for Admin API calls on behalf of `shop`.
    ///
    /// See [`select_session`] for the preference order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_for_shop(&self, shop: &ShopDomain) -> Result<Option<ShopSession>, RepositoryError> {
        let sessions = self.list_for_shop(shop).await?;
        let found = sessions.len();
        let chosen = select_session(sessions, Utc::now());

        tracing::debug!(
            shop = %shop,
            found,
            chosen = chosen.as_ref().map(|s| s.id.as_str()),
            "resolved shop session"
        );
        Ok(chosen)
    }

    /// Insert or replace a session by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(&self, session: &ShopSession) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shopify_sessions
                (id, shop, is_online, scope, expires, access_token, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                shop = EXCLUDED.shop,
                is_online = EXCLUDED.is_online,
                scope = EXCLUDED.scope,
                expires = EXCLUDED.expires,
                access_token = EXCLUDED.access_token
            ",
        )
        .bind(&session.id)
        .bind(&session.shop)
        .bind(session.is_online)
        .bind(session.scope.as_deref())
        .bind(session.expires)
        .bind(session.access_token.expose_secret())
        .bind(session.created_at)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove every session for a shop. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_by_shop(&self, shop: &ShopDomain) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shopify_sessions WHERE shop = $1")
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Total number of stored sessions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM shopify_sessions")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
