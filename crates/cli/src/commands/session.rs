//! Shop session management.
//!
//! OAuth installs are out of scope for the app, so development shops get
//! their access token registered here.
//!
//! # Usage
//!
//! ```bash
//! sf-cli session add -s dev-shop.myshopify.com -t shpat_... --scope write_customers,write_companies
//! sf-cli session list -s dev-shop.myshopify.com
//! sf-cli session remove -s dev-shop.myshopify.com
//! ```

use chrono::{Duration, Utc};
use secrecy::SecretString;

use shopiform_app::db::SessionRepository;
use shopiform_app::models::{ShopSession, select_session};
use shopiform_core::ShopDomain;

use super::{CommandError, connect};

/// Lifetime given to online sessions created here.
const ONLINE_SESSION_TTL_HOURS: i64 = 24;

/// Store (or replace) a session for a shop.
pub async fn add(
    shop: &str,
    token: String,
    scope: &str,
    online: bool,
    id: Option<String>,
) -> Result<(), CommandError> {
    let shop = parse_shop(shop)?;
    if token.trim().is_empty() {
        return Err(CommandError::Invalid("token", "must not be empty".to_string()));
    }

    let now = Utc::now();
    let session = ShopSession {
        id: id.unwrap_or_else(|| default_session_id(&shop, online)),
        is_online: online,
        scope: normalize_scope(scope),
        expires: online.then(|| now + Duration::hours(ONLINE_SESSION_TTL_HOURS)),
        access_token: SecretString::from(token.trim().to_string()),
        created_at: now,
        shop,
    };

    let pool = connect().await?;
    SessionRepository::new(&pool).save(&session).await?;

    tracing::info!(
        "Session saved: {} (shop: {}, online: {}, scope: {})",
        session.id,
        session.shop,
        session.is_online,
        session.scope.as_deref().unwrap_or("-")
    );
    pool.close().await;
    Ok(())
}

/// Show a shop's sessions and the one submissions would pick.
pub async fn list(shop: &str) -> Result<(), CommandError> {
    let shop = parse_shop(shop)?;
    let pool = connect().await?;
    let sessions = SessionRepository::new(&pool).list_for_shop(&shop).await?;
    pool.close().await;

    if sessions.is_empty() {
        tracing::warn!("No sessions for {}", shop);
        return Ok(());
    }

    let now = Utc::now();
    for session in &sessions {
        tracing::info!(
            "{} online={} scope={} expires={} expired={}",
            session.id,
            session.is_online,
            session.scope.as_deref().unwrap_or("-"),
            session
                .expires
                .map_or_else(|| "never".to_string(), |e| e.to_rfc3339()),
            session.is_expired(now)
        );
    }

    match select_session(sessions, now) {
        Some(chosen) => tracing::info!("Submissions will use: {}", chosen.id),
        None => tracing::warn!("Every session has expired; submissions will fail"),
    }
    Ok(())
}

/// Remove every session for a shop, as the uninstall webhook does.
pub async fn remove(shop: &str) -> Result<(), CommandError> {
    let shop = parse_shop(shop)?;
    let pool = connect().await?;
    let deleted = SessionRepository::new(&pool).delete_by_shop(&shop).await?;
    pool.close().await;

    tracing::info!("Removed {} session(s) for {}", deleted, shop);
    Ok(())
}

fn parse_shop(shop: &str) -> Result<ShopDomain, CommandError> {
    ShopDomain::parse(shop).map_err(|e| CommandError::Invalid("shop", e.to_string()))
}

/// Offline sessions use Shopify's `offline_<shop>` id; online ones get a random id.
fn default_session_id(shop: &ShopDomain, online: bool) -> String {
    if online {
        uuid::Uuid::new_v4().to_string()
    } else {
        format!("offline_{shop}")
    }
}

fn normalize_scope(raw: &str) -> Option<String> {
    let scopes: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    (!scopes.is_empty()).then(|| scopes.join(","))
}
