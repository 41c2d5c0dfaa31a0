//! Error types for the SpeakSmart API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::analysis::ScriptError;

/// API error type
///
/// Every variant maps to one HTTP status and a JSON body of the form
/// `{"success": false, "error": "<message>"}`. Transcription failures carry
/// the underlying script error as an additional `details` field; scoring
/// failures never reach this type (they are absorbed by the fallback path).
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request fields (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing, invalid, or expired credentials (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Resource absent or owned by another user (404)
    #[error("{0}")]
    NotFound(String),

    /// Speech-to-text script failed; fatal to the analyze request (500)
    #[error("Speech-to-text conversion failed")]
    Transcription(#[source] ScriptError),

    /// Datastore read/write failure (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Identity service unreachable or returned an unexpected response (500)
    #[error("Identity service error: {0}")]
    Identity(String),

    /// Filesystem failure (500)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "success": false, "error": msg }),
            ),
            ApiError::Transcription(ref cause) => {
                error!(error = %cause, "speech-to-text conversion failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "success": false,
                        "error": "Speech-to-text conversion failed",
                        "details": cause.to_string(),
                    }),
                )
            }
            ApiError::Database(ref err) => {
                error!(error = %err, "database operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Database operation failed" }),
                )
            }
            ApiError::Identity(msg) => {
                error!(error = %msg, "identity service request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Authentication service unavailable" }),
                )
            }
            ApiError::Io(ref err) => {
                error!(error = %err, "IO operation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Internal server error" }),
                )
            }
            ApiError::Internal(ref msg) => {
                error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "error": "Internal server error" }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
