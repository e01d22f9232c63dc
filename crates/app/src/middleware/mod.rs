//! HTTP middleware.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (recorded on the span, echoed in the response)
//! 4. Per-router layers: CORS and the submission rate limiter on `/apps/form`
//!
//! Admin routes authenticate per handler with the [`AuthenticatedShop`]
//! extractor rather than a layer.

pub mod rate_limit;
pub mod request_id;
pub mod shop_auth;

pub use rate_limit::{ClientIpKeyExtractor, RateLimiterLayer, submission_rate_limiter};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
pub use shop_auth::{AuthenticatedShop, ShopAuthError, verify_launch_query, verify_webhook_hmac};
