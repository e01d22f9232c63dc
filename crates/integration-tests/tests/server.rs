//! The full router against a real database and a fake Shopify.
//!
//! Requires `SHOPIFORM_TEST_DATABASE_URL`. Run with `-- --ignored`.

#![allow(clippy::unwrap_used)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

use shopiform_app::db::SessionRepository;
use shopiform_app::middleware::shop_auth::{sign_launch_query, sign_webhook_body};
use shopiform_app::models::ShopSession;
use shopiform_app::routes;
use shopiform_app::state::AppState;
use shopiform_core::ShopDomain;
use shopiform_integration_tests::{
    FakeShopify, TEST_API_SECRET, customer_payload, test_config, test_pool, unique_shop,
};

fn app(pool: PgPool, fake: &FakeShopify) -> Router {
    routes::routes().with_state(AppState::with_admin(test_config(), pool, fake.connector()))
}

fn signed(path: &str, shop: &ShopDomain) -> String {
    let timestamp = Utc::now().timestamp().to_string();
    let query = sign_launch_query(
        TEST_API_SECRET,
        &[("shop", shop.as_str()), ("timestamp", timestamp.as_str())],
    );
    format!("{path}?{query}")
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn create_form(app: &Router, shop: &ShopDomain) -> Value {
    let body = json!({
        "title": "  Contact us ",
        "description": "",
        "fields": [
            { "id": "field-email", "type": "email", "label": "Email", "required": true },
            { "id": "field-name", "type": "text", "label": "Name" },
            { "id": "field-size", "type": "text", "label": "Size", "options": ["S", "M"] }
        ]
    });
    let response = app
        .clone()
        .oneshot(
            Request::post(signed("/api/forms", shop))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    json_body(response).await
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SHOPIFORM_TEST_DATABASE_URL)"]
async fn test_form_api_round_trip() {
    let pool = test_pool().await;
    let fake = FakeShopify::start().await;
    let app = app(pool, &fake);
    let shop = unique_shop();

    let created = create_form(&app, &shop).await;
    assert_eq!(created["title"], "Contact us");
    assert!(created["description"].is_null());
    // Options only survive on select and radio fields
    assert!(created["fields"][2].get("options").is_none());
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::get(signed("/api/forms", &shop))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listed = json_body(response).await;
    assert_eq!(listed[0]["fieldCount"], 3);

    // Another shop cannot see it
    let response = app
        .clone()
        .oneshot(
            Request::get(signed(&format!("/api/forms/{id}"), &unique_shop()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(
            Request::delete(signed(&format!("/api/forms/{id}"), &shop))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SHOPIFORM_TEST_DATABASE_URL)"]
async fn test_public_lookup_and_submission() {
    let pool = test_pool().await;
    let fake = FakeShopify::start().await;
    fake.respond(
        "customerCreate",
        customer_payload("customerCreate", "gid://shopify/Customer/42", "grace@example.com"),
    );
    let app = app(pool.clone(), &fake);
    let shop = unique_shop();
    let code = create_form(&app, &shop).await["code"]
        .as_str()
        .unwrap()
        .to_string();

    SessionRepository::new(&pool)
        .save(&ShopSession {
            id: format!("offline_{shop}"),
            shop: shop.clone(),
            is_online: false,
            scope: Some("write_customers".to_string()),
            expires: None,
            access_token: SecretString::from("shpat_server_test"),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/apps/form/{code}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
    let public = json_body(response).await;
    assert_eq!(public["shop"], shop.as_str());
    assert_eq!(public["fields"][0]["id"], "field-email");

    let form_body = format!(
        "formCode={code}&shop={shop}&field-email=grace%40example.com&field-name=Grace"
    );
    let response = app
        .clone()
        .oneshot(
            Request::post("/apps/form/submit")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header("x-forwarded-for", "198.51.100.20")
                .body(Body::from(form_body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let outcome = json_body(response).await;
    assert_eq!(outcome["success"], true);
    assert_eq!(outcome["customer"]["id"], "gid://shopify/Customer/42");
    assert_eq!(outcome["submissionData"]["Name"], "Grace");

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests.first().unwrap().variables["input"]["firstName"], "Grace");
}

#[tokio::test]
#[ignore = "Requires PostgreSQL (SHOPIFORM_TEST_DATABASE_URL)"]
async fn test_uninstall_webhook_drops_sessions() {
    let pool = test_pool().await;
    let fake = FakeShopify::start().await;
    let app = app(pool.clone(), &fake);
    let shop = unique_shop();

    let sessions = SessionRepository::new(&pool);
    sessions
        .save(&ShopSession {
            id: format!("offline_{shop}"),
            shop: shop.clone(),
            is_online: false,
            scope: Some("write_customers".to_string()),
            expires: None,
            access_token: SecretString::from("shpat_to_revoke"),
            created_at: Utc::now(),
        })
        .await
        .unwrap();

    let body = json!({ "domain": shop.as_str() }).to_string();

    // Tampered signature: nothing is deleted
    let response = app
        .clone()
        .oneshot(
            Request::post("/webhooks/app/uninstalled")
                .header("x-shopify-hmac-sha256", sign_webhook_body("wrong_secret_value", body.as_bytes()))
                .header("x-shopify-shop-domain", shop.as_str())
                .body(Body::from(body.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(sessions.find_for_shop(&shop).await.unwrap().is_some());

    let response = app
        .clone()
        .oneshot(
            Request::post("/webhooks/app/uninstalled")
                .header("x-shopify-hmac-sha256", sign_webhook_body(TEST_API_SECRET, body.as_bytes()))
                .header("x-shopify-shop-domain", shop.as_str())
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(sessions.find_for_shop(&shop).await.unwrap().is_none());
}
