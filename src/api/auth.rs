//! Authentication endpoints and bearer-token middleware
//!
//! Account state lives entirely in the external identity service; these
//! handlers validate request shape, relay to the service, and translate its
//! rejections into the API error taxonomy. Protected routes go through
//! [`require_user`], which resolves the bearer token to a user on every
//! call — there is no local session cache.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::identity::{IdentityError, IdentityUser};
use crate::AppState;

/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

/// The authenticated caller, attached to request extensions by
/// [`require_user`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// The bearer token the caller presented; needed for logout.
    pub token: String,
}

/// Bearer-token middleware for protected routes.
///
/// The token is validated against the identity service on every call.
/// Health and the public auth endpoints do not use this middleware.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("No authorization token provided".to_string()))?;

    let user = match state.identity.get_user(&token).await {
        Ok(user) => user,
        Err(IdentityError::Rejected { .. }) => {
            return Err(ApiError::Unauthorized("Invalid or expired token".to_string()));
        }
        Err(err) => return Err(ApiError::Identity(err.to_string())),
    };

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
        full_name: user.full_name,
        created_at: user.created_at,
        token,
    });

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /auth/signup
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (email, password) = require_credentials(req.email, req.password)?;

    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters long".to_string(),
        ));
    }

    let grant = state
        .identity
        .sign_up(&email, &password, req.full_name.as_deref())
        .await
        .map_err(|err| match err {
            IdentityError::Rejected { message, .. } => ApiError::BadRequest(message),
            other => ApiError::Identity(other.to_string()),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User created successfully",
            "user": user_profile(&grant.user),
            "session": grant.session,
        })),
    ))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let (email, password) = require_credentials(req.email, req.password)?;

    let grant = state
        .identity
        .sign_in(&email, &password)
        .await
        .map_err(|err| match err {
            IdentityError::Rejected { .. } => {
                ApiError::Unauthorized("Invalid credentials".to_string())
            }
            other => ApiError::Identity(other.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "user": user_profile(&grant.user),
        "session": grant.session,
    })))
}

/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    state
        .identity
        .sign_out(&user.token)
        .await
        .map_err(|err| match err {
            IdentityError::Rejected { message, .. } => ApiError::BadRequest(message),
            other => ApiError::Identity(other.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "message": "Logout successful",
    })))
}

/// GET /auth/session
pub async fn current_session(Extension(user): Extension<AuthUser>) -> Json<Value> {
    Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "email": user.email,
            "fullName": user.full_name,
            "createdAt": user.created_at,
        },
    }))
}

/// POST /auth/refresh
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<Value>> {
    let refresh_token = req
        .refresh_token
        .filter(|token| !token.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Refresh token is required".to_string()))?;

    let session = state
        .identity
        .refresh(&refresh_token)
        .await
        .map_err(|err| match err {
            IdentityError::Rejected { .. } => {
                ApiError::Unauthorized("Invalid refresh token".to_string())
            }
            other => ApiError::Identity(other.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "session": session,
    })))
}

fn require_credentials(
    email: Option<String>,
    password: Option<String>,
) -> ApiResult<(String, String)> {
    let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
    let password = password.filter(|p| !p.is_empty());

    match (email, password) {
        (Some(email), Some(password)) => Ok((email, password)),
        _ => Err(ApiError::BadRequest(
            "Email and password are required".to_string(),
        )),
    }
}

fn user_profile(user: &IdentityUser) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "fullName": user.full_name,
    })
}
