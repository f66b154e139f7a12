//! Auth types: sessions, identities, results and errors.
//!
//! Backend-neutral types shared by the primary HTTP client, the managed
//! identity provider and the session manager. Neither backend's wire shape
//! leaks past this module: each client decodes into these.

use serde::{Deserialize, Serialize};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by auth operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request never completed (DNS, connect, TLS, reset...).
    #[error("request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status.
    #[error("unexpected response: status {status}")]
    Status { status: u16, body: String },

    /// An operation that needs a signed-in user was called without one.
    #[error("No user logged in")]
    NoUser,

    /// The identity provider rejected the request (bad credentials etc.).
    #[error("{message}")]
    Provider { status: u16, message: String },

    /// The current session was issued for a different account than the
    /// identity provider's.
    #[error("Current session does not belong to the identity provider")]
    ForeignSession,

    /// Profile lookup against the primary backend did not succeed.
    #[error("Failed to fetch profile")]
    ProfileFetch,

    /// A response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// A required configuration variable is not set.
    #[error("missing config: env var {var} not set")]
    MissingConfig { var: String },

    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The persisted session could not be read or written.
    #[error("session storage failed: {0}")]
    Storage(String),
}

impl AuthError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::Status { .. } => "E_STATUS",
            Self::NoUser => "E_NO_USER",
            Self::ForeignSession => "E_FOREIGN_SESSION",
            Self::Provider { .. } => "E_PROVIDER",
            Self::ProfileFetch => "E_PROFILE_FETCH",
            Self::Parse(_) => "E_PARSE",
            Self::MissingConfig { .. } => "E_MISSING_CONFIG",
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Storage(_) => "E_STORAGE",
        }
    }

    /// Whether repeating the same call later could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// IDENTITY / SESSION
// =============================================================================

/// The signed-in user as known to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Bearer credential plus its validity window, and the identity it was
/// issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Expiry as unix seconds. `None` when the issuer did not say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    pub user: Identity,
}

impl Session {
    /// True when the session expires at or before `now + margin_secs`.
    #[must_use]
    pub fn expires_within(&self, now: i64, margin_secs: i64) -> bool {
        self.expires_at
            .is_some_and(|at| at <= now.saturating_add(margin_secs))
    }
}

/// Current wall clock as unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Fields a signed-in user may change on their account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Profile returned by the primary backend's `/api/me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// `null` when the backend omits it.
    #[serde(default)]
    pub id: serde_json::Value,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    /// Any other fields the backend returns, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// =============================================================================
// RESULTS
// =============================================================================

/// Which backend produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Primary,
    Secondary,
}

/// What a backend handed back from a sign-in or sign-up, before the
/// manager tags it with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Grant {
    pub session: Option<Session>,
    pub user: Option<Identity>,
    pub data: serde_json::Value,
}

/// Outcome of a sign-in or sign-up.
///
/// `session` is `None` when the backend accepted the request without
/// starting a session (for example a registration awaiting email
/// confirmation). `data` is the decoded response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResponse {
    pub source: Backend,
    pub session: Option<Session>,
    pub user: Option<Identity>,
    pub data: serde_json::Value,
}

impl AuthResponse {
    #[must_use]
    pub fn from_grant(source: Backend, grant: Grant) -> Self {
        Self { source, session: grant.session, user: grant.user, data: grant.data }
    }
}

/// Outcome of a password-reset request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResetResponse {
    pub source: Backend,
    pub data: serde_json::Value,
}

// =============================================================================
// SESSION EVENTS
// =============================================================================

/// Why the provider's session changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A session-change notification pushed by the identity provider.
///
/// `session` is the provider's session after the change; `None` means the
/// client is no longer authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub session: Option<Session>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
