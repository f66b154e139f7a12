//! GoTrue-compatible REST client.
//!
//! Thin HTTP wrapper over `/auth/v1`. Every request carries the project's
//! anon key; user-scoped calls add the session's access token as bearer.
//! Response decoding lives in pure functions for testability.
//!
//! TRADE-OFFS
//! ==========
//! Refresh is lazy: `get_session` refreshes a session inside the configured
//! margin instead of running a background timer. A long-idle client
//! therefore pays one extra round trip on its next read.

use std::sync::Arc;

use serde::Deserialize;
use tokio::sync::broadcast;

use super::{EVENT_CHANNEL_CAPACITY, IdentityProvider, SessionStore};
use crate::config::{AuthConfig, http_client};
use crate::types::{AuthError, Grant, Identity, Session, SessionEvent, SessionEventKind, UserAttributes, unix_now};

const AUTH_PREFIX: &str = "/auth/v1";

// =============================================================================
// CLIENT
// =============================================================================

pub struct GoTrueClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    refresh_margin_secs: i64,
    store: Arc<dyn SessionStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl GoTrueClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &AuthConfig, store: Arc<dyn SessionStore>) -> Result<Self, AuthError> {
        let http = http_client(config.timeouts)?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            http,
            base_url: format!("{}{AUTH_PREFIX}", config.provider_url),
            anon_key: config.provider_anon_key.clone(),
            refresh_margin_secs: config.refresh_margin_secs,
            store,
            events,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.anon_key)
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<String, AuthError> {
        let response = builder
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(parse_error(status, &text));
        }
        Ok(text)
    }

    fn emit(&self, kind: SessionEventKind, session: Option<Session>) {
        tracing::debug!(?kind, "provider session changed");
        // No receivers is fine.
        let _ = self.events.send(SessionEvent { kind, session });
    }

    async fn replace_session(&self, kind: SessionEventKind, session: Option<Session>) -> Result<(), AuthError> {
        self.store.save(session.as_ref()).await?;
        self.emit(kind, session);
        Ok(())
    }

    async fn current_session(&self) -> Result<Session, AuthError> {
        self.store.load().await?.ok_or(AuthError::NoUser)
    }

    /// Exchange the stored refresh token for a new session.
    ///
    /// On failure the stored session is discarded and `SignedOut` is
    /// emitted before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `NoUser` when nothing is stored, or the provider's error.
    pub async fn refresh_session(&self) -> Result<Session, AuthError> {
        let current = self.current_session().await?;
        let Some(refresh_token) = current.refresh_token else {
            self.replace_session(SessionEventKind::SignedOut, None).await?;
            return Err(AuthError::NoUser);
        };

        let body = serde_json::json!({ "refresh_token": refresh_token });
        let result = self
            .send(
                self.request(reqwest::Method::POST, "/token")
                    .query(&[("grant_type", "refresh_token")])
                    .json(&body),
            )
            .await
            .and_then(|text| parse_grant(&text, unix_now()));

        match result {
            Ok(Grant { session: Some(session), .. }) => {
                self.replace_session(SessionEventKind::TokenRefreshed, Some(session.clone()))
                    .await?;
                Ok(session)
            }
            Ok(_) => {
                self.replace_session(SessionEventKind::SignedOut, None).await?;
                Err(AuthError::Parse("refresh response carried no session".into()))
            }
            Err(e) => {
                tracing::warn!(error = %e, "session refresh failed; signing out locally");
                self.replace_session(SessionEventKind::SignedOut, None).await?;
                Err(e)
            }
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, AuthError> {
        let Some(session) = self.store.load().await? else {
            return Ok(None);
        };
        if !session.expires_within(unix_now(), self.refresh_margin_secs) {
            return Ok(Some(session));
        }
        if session.refresh_token.is_none() {
            self.replace_session(SessionEventKind::SignedOut, None).await?;
            return Ok(None);
        }
        self.refresh_session().await.map(Some)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Grant, AuthError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let text = self
            .send(
                self.request(reqwest::Method::POST, "/token")
                    .query(&[("grant_type", "password")])
                    .json(&body),
            )
            .await?;
        let grant = parse_grant(&text, unix_now())?;
        if grant.session.is_some() {
            self.replace_session(SessionEventKind::SignedIn, grant.session.clone())
                .await?;
        }
        Ok(grant)
    }

    async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<Grant, AuthError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "username": username },
        });
        let text = self
            .send(self.request(reqwest::Method::POST, "/signup").json(&body))
            .await?;
        let grant = parse_grant(&text, unix_now())?;
        if grant.session.is_some() {
            self.replace_session(SessionEventKind::SignedIn, grant.session.clone())
                .await?;
        }
        Ok(grant)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let remote = match self.store.load().await? {
            Some(session) => self
                .send(
                    self.request(reqwest::Method::POST, "/logout")
                        .bearer_auth(&session.access_token),
                )
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        self.replace_session(SessionEventKind::SignedOut, None).await?;
        remote
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<serde_json::Value, AuthError> {
        let body = serde_json::json!({ "email": email });
        let text = self
            .send(self.request(reqwest::Method::POST, "/recover").json(&body))
            .await?;
        parse_value(&text)
    }

    async fn update_user(&self, attributes: &UserAttributes) -> Result<Session, AuthError> {
        let mut session = self.current_session().await?;
        let text = self
            .send(
                self.request(reqwest::Method::PUT, "/user")
                    .bearer_auth(&session.access_token)
                    .json(&update_body(attributes)),
            )
            .await?;
        session.user = parse_user(&text)?;
        self.replace_session(SessionEventKind::UserUpdated, Some(session.clone()))
            .await?;
        Ok(session)
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct WireUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl WireUser {
    fn into_identity(self) -> Identity {
        let username = self
            .user_metadata
            .as_ref()
            .and_then(|m| m.get("username"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        Identity { id: self.id, email: self.email, username }
    }
}

#[derive(Deserialize)]
struct WireSession {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: WireUser,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_value(text: &str) -> Result<serde_json::Value, AuthError> {
    if text.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(text).map_err(|e| AuthError::Parse(e.to_string()))
}

/// Decode a token or signup response.
///
/// Token responses carry `access_token` plus a nested `user`; a signup that
/// still awaits email confirmation returns the bare user (or `{ "user": … }`).
fn parse_grant(text: &str, now: i64) -> Result<Grant, AuthError> {
    let data = parse_value(text)?;

    if data.get("access_token").is_some() {
        let wire: WireSession = serde_json::from_value(data.clone()).map_err(|e| AuthError::Parse(e.to_string()))?;
        let user = wire.user.into_identity();
        let expires_at = wire
            .expires_at
            .or_else(|| wire.expires_in.map(|secs| now.saturating_add(secs)));
        let session = Session { access_token: wire.access_token, refresh_token: wire.refresh_token, expires_at, user };
        return Ok(Grant { user: Some(session.user.clone()), session: Some(session), data });
    }

    let user_value = data.get("user").filter(|v| !v.is_null()).unwrap_or(&data);
    let user = if user_value.get("id").is_some() {
        let wire: WireUser =
            serde_json::from_value(user_value.clone()).map_err(|e| AuthError::Parse(e.to_string()))?;
        Some(wire.into_identity())
    } else {
        None
    };
    Ok(Grant { session: None, user, data })
}

fn parse_user(text: &str) -> Result<Identity, AuthError> {
    let wire: WireUser = serde_json::from_str(text).map_err(|e| AuthError::Parse(e.to_string()))?;
    Ok(wire.into_identity())
}

/// Map a non-2xx response to a provider error, preferring the most specific
/// message field the body carries.
fn parse_error(status: u16, text: &str) -> AuthError {
    let message = serde_json::from_str::<WireError>(text)
        .ok()
        .and_then(|e| e.error_description.or(e.msg).or(e.message).or(e.error))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("provider returned status {status}"));
    AuthError::Provider { status, message }
}

fn update_body(attributes: &UserAttributes) -> serde_json::Value {
    let mut body = serde_json::Map::new();
    if let Some(email) = &attributes.email {
        body.insert("email".into(), serde_json::Value::String(email.clone()));
    }
    if let Some(username) = &attributes.username {
        body.insert("data".into(), serde_json::json!({ "username": username }));
    }
    serde_json::Value::Object(body)
}

#[cfg(test)]
#[path = "gotrue_test.rs"]
mod tests;
