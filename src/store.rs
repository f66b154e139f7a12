//! Reactive auth state.
//!
//! DESIGN
//! ======
//! `AuthStore` owns one `AuthSnapshot` behind a `tokio::sync::watch`
//! channel. Consumers read the latest snapshot or hold a receiver to be
//! woken on change; dropping the receiver unregisters it. Session and
//! identity are only ever replaced together through [`AuthStore::set_session`],
//! so `is_authenticated()` can never disagree with them.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::types::{Identity, Session};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Read-only view of the current auth state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    user: Option<Identity>,
    session: Option<Session>,
    loading: bool,
    is_authenticated: bool,
}

impl AuthSnapshot {
    fn initial() -> Self {
        Self { user: None, session: None, loading: true, is_authenticated: false }
    }

    #[must_use]
    pub fn user(&self) -> Option<&Identity> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True until initialization has completed.
    #[must_use]
    pub fn loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Shared owner of the auth snapshot. Clones share the same state.
#[derive(Clone)]
pub struct AuthStore {
    tx: Arc<watch::Sender<AuthSnapshot>>,
}

impl AuthStore {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::initial());
        Self { tx: Arc::new(tx) }
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Register for change notifications. Drop the receiver to unregister.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Replace session and identity together from one source.
    pub fn set_session(&self, session: Option<Session>) {
        self.tx.send_if_modified(|state| {
            let user = session.as_ref().map(|s| s.user.clone());
            let is_authenticated = session.is_some() && user.is_some();
            if state.session == session && state.user == user {
                return false;
            }
            tracing::debug!(authenticated = is_authenticated, "auth state replaced");
            state.session = session;
            state.user = user;
            state.is_authenticated = is_authenticated;
            true
        });
    }

    /// Clear the loading flag. Only the first call notifies subscribers.
    pub fn finish_loading(&self) -> bool {
        self.tx.send_if_modified(|state| {
            if !state.loading {
                return false;
            }
            state.loading = false;
            true
        })
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
