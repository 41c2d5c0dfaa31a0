//! Integration tests for the HTTP API
//!
//! These tests exercise routing, request validation, and the auth
//! middleware's local checks. Paths that would call out to the identity
//! service or the analysis scripts are covered by their own test suites.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::path::PathBuf;
use tower::util::ServiceExt; // for `oneshot`

use speaksmart_api::config::AppConfig;
use speaksmart_api::identity::IdentityClient;
use speaksmart_api::{build_router, db, AppState};

async fn setup_app() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::init_database(&dir.path().join("test.db")).await.unwrap();

    // Unroutable identity service; tests here never complete a token lookup.
    let identity = IdentityClient::new("http://127.0.0.1:9", "test-key");

    let config = AppConfig {
        port: 0,
        database_path: dir.path().join("test.db"),
        upload_dir: dir.path().join("uploads"),
        max_upload_mb: 50,
        scripts_dir: PathBuf::from("scripts"),
        python_bin: PathBuf::from("python3"),
        analysis_timeout_secs: 120,
        identity_url: "http://127.0.0.1:9".to_string(),
        identity_api_key: "test-key".to_string(),
    };

    let state = AppState::new(pool, identity, config);
    (dir, build_router(state))
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Health endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (_dir, app) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "speaksmart-api");
    assert!(body["version"].is_string());
}

// =============================================================================
// Auth middleware
// =============================================================================

#[tokio::test]
async fn test_protected_route_requires_token() {
    let (_dir, app) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/speech/history")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No authorization token provided");
}

#[tokio::test]
async fn test_non_bearer_authorization_rejected() {
    let (_dir, app) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/auth/session")
        .header("authorization", "Token abc123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_analyze_requires_token() {
    let (_dir, app) = setup_app().await;

    let request = json_request("POST", "/speech/analyze", r#"{"sessionId": "x"}"#);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Request validation (no identity call involved)
// =============================================================================

#[tokio::test]
async fn test_signup_missing_email() {
    let (_dir, app) = setup_app().await;

    let request = json_request("POST", "/auth/signup", r#"{"password": "secret1"}"#);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Email and password are required");
}

#[tokio::test]
async fn test_signup_short_password() {
    let (_dir, app) = setup_app().await;

    let request = json_request(
        "POST",
        "/auth/signup",
        r#"{"email": "user@example.com", "password": "abc"}"#,
    );
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Password must be at least 6 characters long");
}

#[tokio::test]
async fn test_refresh_missing_token() {
    let (_dir, app) = setup_app().await;

    let request = json_request("POST", "/auth/refresh", r#"{}"#);
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"], "Refresh token is required");
}

// =============================================================================
// Fallback route
// =============================================================================

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (_dir, app) = setup_app().await;

    let request = Request::builder()
        .method("GET")
        .uri("/no/such/route")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Endpoint not found");
}
