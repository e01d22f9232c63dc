//! Shopify webhook handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use secrecy::ExposeSecret;
use tracing::instrument;

use shopiform_core::ShopDomain;

use crate::db::SessionRepository;
use crate::error::AppError;
use crate::middleware::shop_auth::{WEBHOOK_HMAC_HEADER, verify_webhook_hmac};
use crate::state::AppState;

const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// `app/uninstalled`: drop every session the shop had.
///
/// Shopify retries on non-2xx, so a shop with no sessions left still gets 200.
#[instrument(skip_all)]
pub async fn app_uninstalled(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    let signature = headers
        .get(WEBHOOK_HMAC_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let secret = state.config().shopify.api_secret.expose_secret();
    if !verify_webhook_hmac(secret, &body, signature) {
        tracing::warn!("webhook signature mismatch");
        return Err(AppError::Unauthorized("webhook signature".to_string()));
    }

    let shop = headers
        .get(SHOP_DOMAIN_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| ShopDomain::parse(v).ok())
        .ok_or_else(|| AppError::BadRequest("Missing shop domain".to_string()))?;

    let deleted = SessionRepository::new(state.pool())
        .delete_by_shop(&shop)
        .await?;
    tracing::info!(shop = %shop, deleted, "app uninstalled, sessions removed");

    Ok(StatusCode::OK)
}
