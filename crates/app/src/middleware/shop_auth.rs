//! Shopify request signature verification.
//!
//! Admin pages are opened by Shopify with signed launch parameters
//! (`shop`, `timestamp`, `hmac`, ...). [`AuthenticatedShop`] recomputes the
//! signature over the sorted `key=value` pairs with the app secret and yields
//! the verified shop. Webhooks carry a base64 HMAC of the raw body in
//! `X-Shopify-Hmac-Sha256`, checked by [`verify_webhook_hmac`].

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use thiserror::Error;

use shopiform_core::ShopDomain;

use crate::state::AppState;

/// Launch parameters older (or further in the future) than this are refused.
pub const MAX_LAUNCH_AGE_SECS: i64 = 24 * 60 * 60;

/// Header carrying the webhook body signature.
pub const WEBHOOK_HMAC_HEADER: &str = "x-shopify-hmac-sha256";

/// Why a signed request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShopAuthError {
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
    #[error("invalid shop domain")]
    InvalidShop,
    #[error("invalid timestamp")]
    InvalidTimestamp,
    #[error("request expired")]
    Expired,
    #[error("signature mismatch")]
    SignatureMismatch,
}

impl IntoResponse for ShopAuthError {
    fn into_response(self) -> Response {
        tracing::warn!(reason = %self, "rejected unsigned or badly signed request");
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Unauthorized" })),
        )
            .into_response()
    }
}

/// A shop whose launch parameters carried a valid signature.
///
/// ```rust,ignore
/// async fn handler(AuthenticatedShop(shop): AuthenticatedShop) -> String {
///     shop.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthenticatedShop(pub ShopDomain);

impl FromRequestParts<AppState> for AuthenticatedShop {
    type Rejection = ShopAuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let query = parts.uri.query().unwrap_or_default();
        let secret = state.config().shopify.api_secret.expose_secret();
        let shop = verify_launch_query(secret, query, chrono::Utc::now().timestamp())?;

        tracing::Span::current().record("shop", shop.as_str());
        Ok(Self(shop))
    }
}

/// Verify signed launch parameters and return the shop they name.
///
/// # Errors
///
/// Returns a [`ShopAuthError`] when `hmac` is missing or wrong, when the
/// shop or timestamp is missing or malformed, or when the timestamp is more
/// than [`MAX_LAUNCH_AGE_SECS`] away from `now`.
pub fn verify_launch_query(secret: &str, query: &str, now: i64) -> Result<ShopDomain, ShopAuthError> {
    let mut params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    let provided = params
        .iter()
        .find(|(k, _)| k == "hmac")
        .map(|(_, v)| v.to_ascii_lowercase())
        .ok_or(ShopAuthError::MissingParameter("hmac"))?;

    params.retain(|(k, _)| k != "hmac" && k != "signature");
    let expected = hex::encode(hmac_sha256(secret.as_bytes(), canonical_message(&mut params).as_bytes())?);
    if !constant_time_compare(&expected, &provided) {
        return Err(ShopAuthError::SignatureMismatch);
    }

    let param = |name: &'static str| {
        params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .ok_or(ShopAuthError::MissingParameter(name))
    };

    let timestamp: i64 = param("timestamp")?
        .parse()
        .map_err(|_| ShopAuthError::InvalidTimestamp)?;
    if (now - timestamp).abs() > MAX_LAUNCH_AGE_SECS {
        return Err(ShopAuthError::Expired);
    }

    ShopDomain::parse(param("shop")?).map_err(|_| ShopAuthError::InvalidShop)
}

/// Build a signed launch query string, as Shopify would.
#[must_use]
pub fn sign_launch_query(secret: &str, params: &[(&str, &str)]) -> String {
    let mut owned: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    let signature = hmac_sha256(secret.as_bytes(), canonical_message(&mut owned).as_bytes())
        .map(hex::encode)
        .unwrap_or_default();

    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(owned)
        .append_pair("hmac", &signature)
        .finish()
}

/// Check a webhook body against its base64 `X-Shopify-Hmac-Sha256` header.
#[must_use]
pub fn verify_webhook_hmac(secret: &str, body: &[u8], header: &str) -> bool {
    hmac_sha256(secret.as_bytes(), body)
        .map(|digest| constant_time_compare(&STANDARD.encode(digest), header.trim()))
        .unwrap_or(false)
}

/// The `X-Shopify-Hmac-Sha256` value Shopify would send with `body`.
#[must_use]
pub fn sign_webhook_body(secret: &str, body: &[u8]) -> String {
    hmac_sha256(secret.as_bytes(), body)
        .map(|digest| STANDARD.encode(digest))
        .unwrap_or_default()
}

/// Sorted `key=value` pairs joined with `&`.
fn canonical_message(params: &mut [(String, String)]) -> String {
    params.sort();
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn hmac_sha256(secret: &[u8], message: &[u8]) -> Result<Vec<u8>, ShopAuthError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret).map_err(|_| ShopAuthError::SignatureMismatch)?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
