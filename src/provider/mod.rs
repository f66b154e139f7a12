//! Secondary identity provider: managed auth service used as fallback and
//! as the source of pushed session changes.
//!
//! DESIGN
//! ======
//! `IdentityProvider` is the SDK-shaped call surface the session manager
//! depends on. `GoTrueClient` implements it over a GoTrue-compatible REST
//! API, persisting its session through a `SessionStore` and broadcasting a
//! `SessionEvent` after every change it makes.

pub mod gotrue;
pub mod storage;

use tokio::sync::broadcast;

use crate::types::{AuthError, Grant, Session, SessionEvent, UserAttributes};

pub use gotrue::GoTrueClient;
pub use storage::{FileStore, MemoryStore, SessionStore};

/// Capacity of the session-change broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Async surface of the managed identity provider. Enables mocking in tests.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Return the persisted session, refreshing it first if it is about to
    /// expire.
    async fn get_session(&self) -> Result<Option<Session>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Grant, AuthError>;

    /// Register a new account, attaching `username` as profile metadata.
    async fn sign_up(&self, email: &str, password: &str, username: &str) -> Result<Grant, AuthError>;

    /// End the current session. Local state is cleared even when the remote
    /// call fails.
    async fn sign_out(&self) -> Result<(), AuthError>;

    async fn reset_password_for_email(&self, email: &str) -> Result<serde_json::Value, AuthError>;

    /// Update email and/or username of the signed-in user. Returns the
    /// provider's session carrying the updated identity.
    async fn update_user(&self, attributes: &UserAttributes) -> Result<Session, AuthError>;

    /// Subscribe to session-change notifications. Drop the receiver to
    /// unsubscribe.
    fn subscribe(&self) -> broadcast::Receiver<SessionEvent>;
}
