//! Session persistence for the identity provider.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::types::{AuthError, Session};

/// Where the provider keeps its current session between calls and runs.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> Result<Option<Session>, AuthError>;

    /// Persist `session`, or forget the stored one when `None`.
    async fn save(&self, session: Option<&Session>) -> Result<(), AuthError>;
}

// =============================================================================
// MEMORY
// =============================================================================

/// Process-lifetime store.
#[derive(Default)]
pub struct MemoryStore {
    session: Mutex<Option<Session>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self { session: Mutex::new(Some(session)) }
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryStore {
    async fn load(&self) -> Result<Option<Session>, AuthError> {
        let guard = self
            .session
            .lock()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(guard.clone())
    }

    async fn save(&self, session: Option<&Session>) -> Result<(), AuthError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        *guard = session.cloned();
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON file store. A missing or unreadable file counts as no session.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl SessionStore for FileStore {
    async fn load(&self) -> Result<Option<Session>, AuthError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Storage(e.to_string())),
        };
        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "discarding unreadable session file");
                Ok(None)
            }
        }
    }

    async fn save(&self, session: Option<&Session>) -> Result<(), AuthError> {
        let Some(session) = session else {
            return match tokio::fs::remove_file(&self.path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(AuthError::Storage(e.to_string())),
                _ => Ok(()),
            };
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
        }
        let json = serde_json::to_string(session).map_err(|e| AuthError::Storage(e.to_string()))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
