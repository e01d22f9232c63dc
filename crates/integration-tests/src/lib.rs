//! Integration tests for ShopiForm.
//!
//! # Running Tests
//!
//! ```bash
//! # Tests that only need a local fake Shopify run by default
//! cargo test -p shopiform-integration-tests
//!
//! # Database-backed tests need a disposable PostgreSQL database
//! SHOPIFORM_TEST_DATABASE_URL=postgres://localhost/shopiform_test \
//!     cargo test -p shopiform-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `admin_client` - Admin GraphQL client against [`FakeShopify`]
//! - `repositories` - Form and session repositories (database)
//! - `submission_flow` - Reconciler with real repositories and [`FakeShopify`] (database)
//! - `server` - Full router through `tower::ServiceExt::oneshot` (database)
//!
//! Every database test works under its own random shop domain, so tests can
//! share one database and run in parallel.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use secrecy::SecretString;
use serde_json::Value;
use sqlx::PgPool;
use tokio::task::JoinHandle;

use shopiform_app::config::{AppConfig, ShopifyAppConfig};
use shopiform_app::shopify::AdminConnector;
use shopiform_core::ShopDomain;

/// App secret used to sign launch parameters and webhooks in tests.
pub const TEST_API_SECRET: &str = "shpss_k7Qm2xVb9LpR4tYw";

/// Admin API version the tests pin.
pub const TEST_API_VERSION: &str = "2025-01";

// =============================================================================
// Database
// =============================================================================

/// Connect to the test database and bring its schema up to date.
///
/// # Panics
///
/// Panics if `SHOPIFORM_TEST_DATABASE_URL` is unset or the database is not
/// reachable. Only call this from `#[ignore]`d tests.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("SHOPIFORM_TEST_DATABASE_URL")
        .expect("SHOPIFORM_TEST_DATABASE_URL must point at a disposable database");
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to test database");
    sqlx::migrate!("../app/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// A shop domain no other test uses.
///
/// # Panics
///
/// Never in practice; the generated name is always a valid hostname.
#[must_use]
pub fn unique_shop() -> ShopDomain {
    let id = uuid::Uuid::new_v4().simple().to_string();
    ShopDomain::parse(&format!("test-{id}.myshopify.com")).expect("generated shop is valid")
}

/// Configuration matching the fakes in this crate.
#[must_use]
pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: SecretString::from("postgres://unused"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        app_url: None,
        shopify: ShopifyAppConfig {
            api_key: "test_api_key".to_string(),
            api_secret: SecretString::from(TEST_API_SECRET),
            api_version: TEST_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(5),
            scopes: vec!["write_customers".to_string(), "write_companies".to_string()],
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    }
}

// =============================================================================
// Fake Shopify
// =============================================================================

/// One GraphQL request the fake received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Mutation name, e.g. `customerCreate`.
    pub operation: String,
    /// Value of `X-Shopify-Access-Token`.
    pub access_token: Option<String>,
    /// The `variables` object.
    pub variables: Value,
}

#[derive(Debug, Clone)]
struct Canned {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: Value,
}

#[derive(Default)]
struct FakeState {
    responses: HashMap<String, Canned>,
    requests: Vec<RecordedRequest>,
}

/// A local stand-in for the Admin GraphQL endpoint.
///
/// Answers each mutation with the response registered for its name, or
/// 500 if none was. Point an [`AdminConnector`] at it with
/// [`FakeShopify::connector`].
pub struct FakeShopify {
    addr: SocketAddr,
    state: Arc<Mutex<FakeState>>,
    task: JoinHandle<()>,
}

impl FakeShopify {
    /// Start the fake on an ephemeral port.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/admin/api/{version}/graphql.json", post(graphql))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake Shopify");
        let addr = listener.local_addr().expect("bound listener has an address");
        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state, task }
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// A connector that sends every shop's requests here.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn connector(&self) -> AdminConnector {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");
        AdminConnector::new(http, TEST_API_VERSION).with_base_url(self.base_url())
    }

    /// Answer `operation` with `200` and `body`.
    pub fn respond(&self, operation: &str, body: Value) {
        self.respond_with(operation, StatusCode::OK, &[], body);
    }

    /// Answer `operation` with an arbitrary status, headers and body.
    pub fn respond_with(
        &self,
        operation: &str,
        status: StatusCode,
        headers: &[(&'static str, &str)],
        body: Value,
    ) {
        let canned = Canned {
            status,
            headers: headers.iter().map(|(k, v)| (*k, (*v).to_string())).collect(),
            body,
        };
        self.lock().responses.insert(operation.to_string(), canned);
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Names of the operations received so far, in order.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.operation).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for FakeShopify {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn graphql(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let query = body["query"].as_str().unwrap_or_default();
    let operation = operation_name(query);

    let canned = {
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.requests.push(RecordedRequest {
            operation: operation.clone(),
            access_token: headers
                .get("x-shopify-access-token")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            variables: body["variables"].clone(),
        });
        state.responses.get(&operation).cloned()
    };

    let Some(canned) = canned else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "no canned response").into_response();
    };

    let mut response = (canned.status, Json(canned.body)).into_response();
    for (name, value) in canned.headers {
        if let Ok(value) = HeaderValue::from_str(&value) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

/// `mutation customerCreate($input: ...)` -> `customerCreate`
fn operation_name(query: &str) -> String {
    query
        .split_once("mutation")
        .map(|(_, rest)| rest.trim_start())
        .and_then(|rest| rest.split(|c: char| c == '(' || c.is_whitespace()).next())
        .unwrap_or_default()
        .to_string()
}

// =============================================================================
// Canned payloads
// =============================================================================

/// A `customerCreate` / `customerUpdate` data payload for one customer.
#[must_use]
pub fn customer_payload(operation: &str, id: &str, email: &str) -> Value {
    serde_json::json!({
        "data": {
            operation: {
                "customer": {
                    "id": id,
                    "email": email,
                    "firstName": "Ada",
                    "lastName": "Lovelace",
                    "tags": []
                },
                "userErrors": []
            }
        }
    })
}

/// Top-level GraphQL error of the kind non-Plus shops get for `companyCreate`.
#[must_use]
pub fn plan_restricted_payload() -> Value {
    serde_json::json!({
        "data": { "companyCreate": null },
        "errors": [{
            "message": "Access denied for companyCreate field. This feature requires Shopify Plus.",
            "extensions": { "code": "ACCESS_DENIED" }
        }]
    })
}
