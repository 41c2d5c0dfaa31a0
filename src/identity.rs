//! HTTP client for the external identity service
//!
//! All account state lives in the identity service; this process only relays
//! credentials and validates bearer tokens. The client is constructed once
//! at startup with validated configuration and passed around through
//! application state.
//!
//! # Service API
//! - `POST {base}/signup` — register; body `{email, password, full_name?}`
//! - `POST {base}/token` — sign in (`grant_type=password`) or refresh
//!   (`grant_type=refresh_token`)
//! - `GET {base}/user` — resolve the user behind a bearer token
//! - `POST {base}/logout` — revoke the bearer token

use chrono::{DateTime, Utc};
use reqwest::{header, Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Default timeout for identity service requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Errors from identity service calls.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The service rejected the request (bad credentials, invalid token,
    /// duplicate email, ...).
    #[error("{message}")]
    Rejected {
        status: StatusCode,
        message: String,
    },

    /// The service could not be reached or the request failed in transit.
    #[error("identity service request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The service answered with a body this client cannot interpret.
    #[error("identity service returned an unexpected response: {0}")]
    Malformed(String),
}

/// A user record as held by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A token pair issued by the identity service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// Response to signup and sign-in requests.
///
/// `session` may be absent when the service defers token issuance (for
/// example pending email confirmation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthGrant {
    pub user: IdentityUser,
    #[serde(default)]
    pub session: Option<AuthSession>,
}

#[derive(Debug, Deserialize)]
struct RefreshGrant {
    session: AuthSession,
}

/// Shape of the service's error bodies.
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(alias = "msg", alias = "message")]
    error: String,
}

/// Identity service client.
///
/// Cheap to clone; the underlying HTTP client is shared.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    http: Client,
    base_url: String,
}

impl IdentityClient {
    /// Create a new client for the service at `base_url`, authenticating
    /// with the given API key on every request.
    pub fn new(base_url: impl Into<String>, api_key: &str) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Ok(value) = header::HeaderValue::from_str(api_key) {
            headers.insert("apikey", value);
        }

        let base_url = base_url.into().trim_end_matches('/').to_string();

        Self {
            http: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .default_headers(headers)
                .build()
                .expect("Failed to create HTTP client"),
            base_url,
        }
    }

    /// Register a new user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<AuthGrant, IdentityError> {
        debug!(email, "identity signup");

        let response = self
            .http
            .post(format!("{}/signup", self.base_url))
            .json(&json!({
                "email": email,
                "password": password,
                "full_name": full_name,
            }))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Exchange credentials for a token pair.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthGrant, IdentityError> {
        debug!(email, "identity sign-in");

        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .json(&json!({
                "grant_type": "password",
                "email": email,
                "password": password,
            }))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Exchange a refresh token for a fresh token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, IdentityError> {
        let response = self
            .http
            .post(format!("{}/token", self.base_url))
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": refresh_token,
            }))
            .send()
            .await?;

        let grant: RefreshGrant = Self::parse_response(response).await?;
        Ok(grant.session)
    }

    /// Resolve the user behind a bearer token.
    pub async fn get_user(&self, access_token: &str) -> Result<IdentityUser, IdentityError> {
        let response = self
            .http
            .get(format!("{}/user", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Revoke a bearer token.
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .post(format!("{}/logout", self.base_url))
            .bearer_auth(access_token)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(response).await)
        }
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: Response,
    ) -> Result<T, IdentityError> {
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| IdentityError::Malformed(e.to_string()))
    }

    /// Turn a non-success response into a `Rejected` error, extracting the
    /// service's message when the body allows it.
    async fn rejection(response: Response) -> IdentityError {
        let status = response.status();
        let message = match response.text().await {
            Ok(body) => serde_json::from_str::<ServiceError>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request rejected")
                        .to_string()
                }),
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request rejected")
                .to_string(),
        };

        IdentityError::Rejected { status, message }
    }
}
