//! SpeakSmart analysis backend
//!
//! Authenticates users against an external identity service, stores uploaded
//! speech recordings, and orchestrates the external analysis scripts that
//! transcribe and score them. The scoring and transcription executables are
//! opaque collaborators invoked by name; their algorithms live elsewhere.

pub mod analysis;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod models;
pub mod upload;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analysis::{AnalysisCoordinator, ScriptRunner};
use crate::config::AppConfig;
use crate::identity::IdentityClient;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Client for the external identity service
    pub identity: IdentityClient,
    /// Analysis sequencing, shared so per-session locks span requests
    pub coordinator: Arc<AnalysisCoordinator>,
    /// Resolved configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, identity: IdentityClient, config: AppConfig) -> Self {
        let runner = ScriptRunner::new(
            &config.python_bin,
            &config.scripts_dir,
            Duration::from_secs(config.analysis_timeout_secs),
        );

        Self {
            coordinator: Arc::new(AnalysisCoordinator::new(db.clone(), runner)),
            db,
            identity,
            config: Arc::new(config),
        }
    }
}

/// Build application router
///
/// Speech routes and the token-bound auth routes require a bearer token;
/// signup/login/refresh and the health endpoint are public.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(api::logout))
        .route("/auth/session", get(api::current_session))
        .route(
            "/speech/upload",
            post(api::upload_speech)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes())),
        )
        .route("/speech/analyze", post(api::analyze_speech))
        .route("/speech/history", get(api::speech_history))
        .route(
            "/speech/:id",
            get(api::get_speech).delete(api::delete_speech),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_user,
        ));

    let public = Router::new()
        .route("/auth/signup", post(api::signup))
        .route("/auth/login", post(api::login))
        .route("/auth/refresh", post(api::refresh_token))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
