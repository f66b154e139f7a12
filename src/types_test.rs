use super::*;

fn session_expiring_at(expires_at: Option<i64>) -> Session {
    Session {
        access_token: "tok".into(),
        refresh_token: None,
        expires_at,
        user: Identity { id: "u1".into(), email: None, username: None },
    }
}

// =============================================================================
// AuthError
// =============================================================================

#[test]
fn no_user_message_matches_contract() {
    assert_eq!(AuthError::NoUser.to_string(), "No user logged in");
}

#[test]
fn profile_fetch_message_is_generic() {
    assert_eq!(AuthError::ProfileFetch.to_string(), "Failed to fetch profile");
}

#[test]
fn provider_error_displays_message_only() {
    let err = AuthError::Provider { status: 400, message: "Invalid login credentials".into() };
    assert_eq!(err.to_string(), "Invalid login credentials");
    assert_eq!(err.error_code(), "E_PROVIDER");
}

#[test]
fn retryable_covers_transport_and_server_errors() {
    assert!(AuthError::Transport("reset".into()).retryable());
    assert!(AuthError::Status { status: 503, body: String::new() }.retryable());
    assert!(AuthError::Status { status: 429, body: String::new() }.retryable());
    assert!(!AuthError::Status { status: 401, body: String::new() }.retryable());
    assert!(!AuthError::NoUser.retryable());
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn expires_within_respects_margin() {
    let session = session_expiring_at(Some(1_000));
    assert!(session.expires_within(1_000, 0));
    assert!(session.expires_within(950, 60));
    assert!(!session.expires_within(900, 60));
}

#[test]
fn session_without_expiry_never_expires() {
    let session = session_expiring_at(None);
    assert!(!session.expires_within(i64::MAX, 60));
}

#[test]
fn session_serde_skips_absent_optionals() {
    let json = serde_json::to_value(session_expiring_at(None)).unwrap();
    assert!(json.get("refresh_token").is_none());
    assert!(json.get("expires_at").is_none());
    assert_eq!(json["user"]["id"], "u1");
}

// =============================================================================
// Profile
// =============================================================================

#[test]
fn profile_keeps_unknown_fields() {
    let profile: Profile = serde_json::from_value(serde_json::json!({
        "id": 7,
        "email": "a@x.com",
        "username": "cadet",
        "rank": "officer"
    }))
    .unwrap();
    assert_eq!(profile.id, serde_json::json!(7));
    assert_eq!(profile.username.as_deref(), Some("cadet"));
    assert_eq!(profile.extra.get("rank").and_then(|v| v.as_str()), Some("officer"));
}

#[test]
fn session_event_kind_serializes_screaming_case() {
    let json = serde_json::to_value(SessionEventKind::TokenRefreshed).unwrap();
    assert_eq!(json, "TOKEN_REFRESHED");
}

#[test]
fn foreign_session_has_stable_code() {
    assert_eq!(AuthError::ForeignSession.error_code(), "E_FOREIGN_SESSION");
    assert!(!AuthError::ForeignSession.retryable());
}
