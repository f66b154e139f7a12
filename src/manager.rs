//! Session manager: the auth surface the rest of the application uses.
//!
//! DESIGN
//! ======
//! `SessionManager` owns the reactive `AuthStore` and two backends. Sign-in,
//! sign-up and password reset run a `FallbackChain` of primary then
//! secondary; sign-out and user updates go to the secondary provider only;
//! profile fetch goes to the primary backend only, authenticated with the
//! current session's access token.
//!
//! Clones share state, so a clone is the "context" handed to any consumer.
//!
//! LIFECYCLE
//! =========
//! `listen()` registers the long-lived provider subscription and returns a
//! `SessionListener` guard; dropping the guard deregisters it. `start()`
//! does `listen()` then `initialize()` so no event is missed in between.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::AuthConfig;
use crate::fallback::FallbackChain;
use crate::primary::{PrimaryApi, PrimaryClient};
use crate::provider::{FileStore, GoTrueClient, IdentityProvider, MemoryStore, SessionStore};
use crate::store::{AuthSnapshot, AuthStore};
use crate::types::{AuthError, AuthResponse, Backend, Identity, Profile, ResetResponse, Session, UserAttributes};

#[derive(Clone)]
pub struct SessionManager {
    primary: Arc<dyn PrimaryApi>,
    provider: Arc<dyn IdentityProvider>,
    store: AuthStore,
}

impl SessionManager {
    #[must_use]
    pub fn new(primary: Arc<dyn PrimaryApi>, provider: Arc<dyn IdentityProvider>) -> Self {
        Self { primary, provider, store: AuthStore::new() }
    }

    /// Build the real HTTP backends from config.
    ///
    /// # Errors
    ///
    /// Returns an error if either HTTP client fails to build.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        let store: Arc<dyn SessionStore> = match &config.session_file {
            Some(path) => Arc::new(FileStore::new(path)),
            None => Arc::new(MemoryStore::new()),
        };
        let primary = Arc::new(PrimaryClient::new(config)?);
        let provider = Arc::new(GoTrueClient::new(config, store)?);
        Ok(Self::new(primary, provider))
    }

    // =========================================================================
    // STATE
    // =========================================================================

    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.store.snapshot()
    }

    /// Watch auth state. Drop the receiver to unsubscribe.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.store.subscribe()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Register for provider session changes, then initialize. The listener
    /// stays registered even when initialization fails.
    pub async fn start(&self) -> (SessionListener, Result<Option<Session>, AuthError>) {
        let listener = self.listen();
        let init = self.initialize().await;
        (listener, init)
    }

    /// Load any persisted provider session into state.
    ///
    /// `loading` is cleared when this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns the provider's error if the session could not be read.
    pub async fn initialize(&self) -> Result<Option<Session>, AuthError> {
        let result = self.provider.get_session().await;
        match &result {
            Ok(Some(session)) => self.store.set_session(Some(session.clone())),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to restore session"),
        }
        self.store.finish_loading();
        result
    }

    /// Spawn the task that mirrors provider session changes into state.
    #[must_use]
    pub fn listen(&self) -> SessionListener {
        let mut events = self.provider.subscribe();
        let store = self.store.clone();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        tracing::debug!(kind = ?event.kind, "session change received");
                        store.set_session(event.session);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        SessionListener { handle: Some(handle) }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Sign in via the primary backend, falling back to the provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when both backends fail.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse, AuthError> {
        let (source, grant) = FallbackChain::new("sign_in", Backend::Primary, self.primary.login(email, password))
            .then(Backend::Secondary, self.provider.sign_in_with_password(email, password))
            .run()
            .await?;
        if grant.session.is_some() {
            self.store.set_session(grant.session.clone());
        }
        Ok(AuthResponse::from_grant(source, grant))
    }

    /// Register via the primary backend, falling back to the provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when both backends fail.
    pub async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<AuthResponse, AuthError> {
        let (source, grant) = FallbackChain::new("sign_up", Backend::Primary, self.primary.register(email, password, username))
            .then(Backend::Secondary, self.provider.sign_up(email, password, username))
            .run()
            .await?;
        if grant.session.is_some() {
            self.store.set_session(grant.session.clone());
        }
        Ok(AuthResponse::from_grant(source, grant))
    }

    /// Sign out through the provider. State is cleared only on success.
    ///
    /// # Errors
    ///
    /// Returns the provider's error untouched.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await?;
        self.store.set_session(None);
        Ok(())
    }

    /// Request a password-reset email, primary first.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when both backends fail.
    pub async fn reset_password(&self, email: &str) -> Result<ResetResponse, AuthError> {
        let (source, data) = FallbackChain::new("reset_password", Backend::Primary, self.primary.forgot_password(email))
            .then(Backend::Secondary, self.provider.reset_password_for_email(email))
            .run()
            .await?;
        Ok(ResetResponse { source, data })
    }

    /// Update the signed-in user's email and/or username via the provider.
    ///
    /// The provider's whole updated session replaces the current one, so
    /// token and identity always come from the same issuer.
    ///
    /// # Errors
    ///
    /// Returns `NoUser` without any network call when nobody is signed in,
    /// `ForeignSession` when the provider's session belongs to a different
    /// account than the signed-in user, otherwise the provider's error.
    pub async fn update_user(&self, attributes: &UserAttributes) -> Result<Identity, AuthError> {
        let Some(current) = self.store.snapshot().user().cloned() else {
            return Err(AuthError::NoUser);
        };
        match self.provider.get_session().await? {
            Some(session) if session.user.id == current.id => {}
            _ => {
                tracing::warn!(user = %current.id, "update_user: signed-in user has no provider session");
                return Err(AuthError::ForeignSession);
            }
        }

        let session = self.provider.update_user(attributes).await?;
        if session.user.id != current.id {
            tracing::warn!(user = %current.id, updated = %session.user.id, "update_user: provider returned another account");
            return Err(AuthError::ForeignSession);
        }
        let user = session.user.clone();
        self.store.set_session(Some(session));
        Ok(user)
    }

    /// Fetch the profile from the primary backend using the session token.
    ///
    /// # Errors
    ///
    /// Returns `NoUser` without any network call when nobody is signed in,
    /// `ProfileFetch` on a non-success status, or the transport/parse error.
    pub async fn get_profile(&self) -> Result<Profile, AuthError> {
        let snapshot = self.store.snapshot();
        let (Some(_), Some(session)) = (snapshot.user(), snapshot.session()) else {
            return Err(AuthError::NoUser);
        };
        match self.primary.profile(&session.access_token).await {
            Ok(profile) => Ok(profile),
            Err(AuthError::Status { status, .. }) => {
                tracing::warn!(status, "profile fetch rejected");
                Err(AuthError::ProfileFetch)
            }
            Err(e) => {
                tracing::warn!(error = %e, "profile fetch failed");
                Err(e)
            }
        }
    }
}

// =============================================================================
// LISTENER GUARD
// =============================================================================

/// Keeps the provider subscription alive. Dropping it stops the listener.
pub struct SessionListener {
    handle: Option<JoinHandle<()>>,
}

impl SessionListener {
    /// Stop listening and wait until the subscription is released.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SessionListener {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
