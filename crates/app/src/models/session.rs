//! Shop session model and selection.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use shopiform_core::ShopDomain;

/// A persisted access grant for a shop.
#[derive(Debug, Clone)]
pub struct ShopSession {
    pub id: String,
    pub shop: ShopDomain,
    pub is_online: bool,
    /// Comma-separated granted scopes.
    pub scope: Option<String>,
    pub expires: Option<DateTime<Utc>>,
    pub access_token: SecretString,
    pub created_at: DateTime<Utc>,
}

impl ShopSession {
    /// Whether the grant includes `scope` (exact match against the comma-separated list).
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope
            .as_deref()
            .is_some_and(|granted| granted.split(',').any(|s| s.trim() == scope))
    }

    /// Whether the stored access token is usable at all.
    #[must_use]
    pub fn has_access_token(&self) -> bool {
        !self.access_token.expose_secret().trim().is_empty()
    }

    /// Online sessions expire; offline sessions never do.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_online && self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Pick the session the reconciler should use for a shop.
///
/// Sessions with an access token always outrank ones without. Then offline
/// sessions win over online ones. Among online sessions, expired ones are
/// never chosen and the one expiring last wins. Remaining ties go to the
/// newest `created_at`, then to the smallest id, so the choice does not depend
/// on row order.
#[must_use]
pub fn select_session(sessions: Vec<ShopSession>, now: DateTime<Utc>) -> Option<ShopSession> {
    sessions
        .into_iter()
        .filter(|s| !s.is_expired(now))
        .min_by(|a, b| {
            b.has_access_token()
                .cmp(&a.has_access_token())
                .then_with(|| a.is_online.cmp(&b.is_online))
                // None means no expiry, which outranks any timestamp.
                .then_with(|| match (a.expires, b.expires) {
                    (None, None) => std::cmp::Ordering::Equal,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (Some(x), Some(y)) => y.cmp(&x),
                })
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| a.id.cmp(&b.id))
        })
}
