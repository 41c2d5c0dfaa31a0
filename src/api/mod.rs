//! HTTP API handlers

pub mod auth;
pub mod health;
pub mod speech;

pub use auth::{current_session, login, logout, refresh_token, require_user, signup, AuthUser};
pub use health::health_routes;
pub use speech::{analyze_speech, delete_speech, get_speech, speech_history, upload_speech};

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Fallback for unknown routes; keeps the JSON error shape.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "success": false, "error": "Endpoint not found" })),
    )
}
