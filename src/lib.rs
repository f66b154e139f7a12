//! # cadet-auth
//!
//! Client-side session management for the defence-exam aspirant portal.
//!
//! The [`SessionManager`] tracks the signed-in identity and exposes sign-in,
//! sign-up, sign-out, password reset, profile update and profile fetch. Each
//! credential operation tries the portal's own REST API first and falls back
//! to a managed identity provider, whose pushed session changes keep the
//! reactive [`AuthSnapshot`] current for the lifetime of the application.

pub mod config;
pub mod fallback;
pub mod manager;
pub mod primary;
pub mod provider;
pub mod store;
pub mod types;

pub use config::AuthConfig;
pub use manager::{SessionListener, SessionManager};
pub use store::AuthSnapshot;
pub use types::{AuthError, AuthResponse, Backend, Identity, Profile, ResetResponse, Session, UserAttributes};
