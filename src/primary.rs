//! Primary backend: the application's own auth REST API.
//!
//! Thin `reqwest` wrapper over four JSON endpoints. Body decoding lives in
//! pure functions (`parse_auth_body`, `parse_profile`) for testability.

use serde::Deserialize;

use crate::config::{AuthConfig, http_client};
use crate::types::{AuthError, Grant, Identity, Profile, Session, unix_now};

const LOGIN_PATH: &str = "/api/login";
const REGISTER_PATH: &str = "/api/register";
const FORGOT_PASSWORD_PATH: &str = "/api/forgot-password";
const PROFILE_PATH: &str = "/api/me";

// =============================================================================
// TRAIT
// =============================================================================

/// Async surface of the primary backend. Enables mocking in tests.
#[async_trait::async_trait]
pub trait PrimaryApi: Send + Sync {
    /// `POST /api/login`.
    async fn login(&self, email: &str, password: &str) -> Result<Grant, AuthError>;

    /// `POST /api/register`.
    async fn register(&self, email: &str, password: &str, username: &str) -> Result<Grant, AuthError>;

    /// `POST /api/forgot-password`.
    async fn forgot_password(&self, email: &str) -> Result<serde_json::Value, AuthError>;

    /// `GET /api/me` with `access_token` as bearer credential.
    async fn profile(&self, access_token: &str) -> Result<Profile, AuthError>;
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct PrimaryClient {
    http: reqwest::Client,
    base_url: String,
}

impl PrimaryClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let http = http_client(config.timeouts)?;
        Ok(Self { http, base_url: config.api_url.clone() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<String, AuthError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        read_success(response).await
    }
}

async fn read_success(response: reqwest::Response) -> Result<String, AuthError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))?;
    if !status.is_success() {
        return Err(AuthError::Status { status: status.as_u16(), body: text });
    }
    Ok(text)
}

#[async_trait::async_trait]
impl PrimaryApi for PrimaryClient {
    async fn login(&self, email: &str, password: &str) -> Result<Grant, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let text = self.post_json(LOGIN_PATH, &body).await?;
        parse_auth_body(&text, unix_now())
    }

    async fn register(&self, email: &str, password: &str, username: &str) -> Result<Grant, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password, "username": username });
        let text = self.post_json(REGISTER_PATH, &body).await?;
        parse_auth_body(&text, unix_now())
    }

    async fn forgot_password(&self, email: &str) -> Result<serde_json::Value, AuthError> {
        let body = serde_json::json!({ "email": email });
        let text = self.post_json(FORGOT_PASSWORD_PATH, &body).await?;
        parse_value(&text)
    }

    async fn profile(&self, access_token: &str) -> Result<Profile, AuthError> {
        let response = self
            .http
            .get(self.url(PROFILE_PATH))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let text = read_success(response).await?;
        parse_profile(&text)
    }
}

// =============================================================================
// PARSING
// =============================================================================

#[derive(Default, Deserialize)]
struct AuthBody {
    #[serde(default, alias = "token")]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<WireUser>,
}

#[derive(Deserialize)]
struct WireUser {
    id: serde_json::Value,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, alias = "name")]
    username: Option<String>,
}

impl WireUser {
    fn into_identity(self) -> Identity {
        let id = match self.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Identity { id, email: self.email, username: self.username }
    }
}

/// Empty bodies decode as JSON `null`.
fn parse_value(text: &str) -> Result<serde_json::Value, AuthError> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text).map_err(|e| AuthError::Parse(e.to_string()))
}

fn parse_auth_body(text: &str, now: i64) -> Result<Grant, AuthError> {
    let data = parse_value(text)?;
    // Any 2xx with valid JSON is a success; the session is only extracted
    // when the body has the expected shape.
    let body = if data.is_object() {
        serde_json::from_value::<AuthBody>(data.clone()).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "primary auth body has no usable session");
            AuthBody::default()
        })
    } else {
        AuthBody::default()
    };

    let user = body.user.map(WireUser::into_identity);
    let expires_at = body
        .expires_at
        .or_else(|| body.expires_in.map(|secs| now.saturating_add(secs)));
    let session = match (body.access_token, &user) {
        (Some(access_token), Some(user)) => Some(Session {
            access_token,
            refresh_token: body.refresh_token,
            expires_at,
            user: user.clone(),
        }),
        _ => None,
    };

    Ok(Grant { session, user, data })
}

fn parse_profile(text: &str) -> Result<Profile, AuthError> {
    serde_json::from_str(text).map_err(|e| AuthError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "primary_test.rs"]
mod tests;
