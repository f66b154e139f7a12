//! Auth configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::AuthError;

pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;

/// Optional transport timeouts. `None` leaves the HTTP client's default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: Option<u64>,
    pub connect_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    /// Primary backend base URL, no trailing slash.
    pub api_url: String,
    /// Identity provider base URL, no trailing slash.
    pub provider_url: String,
    pub provider_anon_key: String,
    /// Where the provider persists its session. In-memory when `None`.
    pub session_file: Option<PathBuf>,
    pub refresh_margin_secs: i64,
    pub timeouts: Timeouts,
}

impl AuthConfig {
    /// Build typed auth config from environment variables.
    ///
    /// Required:
    /// - `AUTH_API_URL`
    /// - `AUTH_PROVIDER_URL`
    /// - `AUTH_PROVIDER_ANON_KEY`
    ///
    /// Optional:
    /// - `AUTH_SESSION_FILE`: JSON file for the persisted session
    /// - `AUTH_REFRESH_MARGIN_SECS`: default 60
    /// - `AUTH_REQUEST_TIMEOUT_SECS`, `AUTH_CONNECT_TIMEOUT_SECS`: unset by default
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, AuthError> {
        let api_url = required_url("AUTH_API_URL")?;
        let provider_url = required_url("AUTH_PROVIDER_URL")?;
        let provider_anon_key = required("AUTH_PROVIDER_ANON_KEY")?;

        let session_file = std::env::var("AUTH_SESSION_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);
        let refresh_margin_secs =
            env_parse::<i64>("AUTH_REFRESH_MARGIN_SECS")?.unwrap_or(DEFAULT_REFRESH_MARGIN_SECS);
        let timeouts = Timeouts {
            request_secs: env_parse("AUTH_REQUEST_TIMEOUT_SECS")?,
            connect_secs: env_parse("AUTH_CONNECT_TIMEOUT_SECS")?,
        };

        Ok(Self { api_url, provider_url, provider_anon_key, session_file, refresh_margin_secs, timeouts })
    }
}

/// Build a `reqwest` client honoring the configured timeouts.
///
/// # Errors
///
/// Returns an error if the TLS backend cannot be initialized.
pub fn http_client(timeouts: Timeouts) -> Result<reqwest::Client, AuthError> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeouts.request_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = timeouts.connect_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    builder
        .build()
        .map_err(|e| AuthError::HttpClientBuild(e.to_string()))
}

fn required(key: &str) -> Result<String, AuthError> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AuthError::MissingConfig { var: key.into() })
}

fn required_url(key: &str) -> Result<String, AuthError> {
    Ok(required(key)?.trim().trim_end_matches('/').to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>, AuthError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AuthError::ConfigParse(format!("invalid {key}: {raw}"))),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
