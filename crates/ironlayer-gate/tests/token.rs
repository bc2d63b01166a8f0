// ironlayer-gate/tests/token.rs
// ============================================================================
// Module: Token Tests
// Description: Tests for dev token issue/validate and API key lookup.
// ============================================================================
//! ## Overview
//! Validates the `bmdev.` token round trip, signature and expiry
//! enforcement, secret redaction, and `bmkey.` fingerprint lookup.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use ironlayer_core::TenantId;
use ironlayer_gate::ApiKeyRegistry;
use ironlayer_gate::IdentityKind;
use ironlayer_gate::Redacted;
use ironlayer_gate::Role;
use ironlayer_gate::TokenError;
use ironlayer_gate::TokenManager;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed issue instant.
fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

/// Builds a manager with a one-hour TTL.
fn manager() -> TokenManager {
    TokenManager::new(Redacted::new("test-secret"), "ironlayer-dev", 3600)
}

// ============================================================================
// SECTION: Dev Tokens
// ============================================================================

/// Tests a token round-trips its claims.
#[test]
fn test_issue_and_validate() {
    let manager = manager();
    let token = manager
        .issue(
            "user-1",
            &TenantId::new("alpha"),
            Role::Engineer,
            IdentityKind::User,
            vec!["plans:read".to_string()],
            now(),
        )
        .unwrap();
    assert!(token.starts_with("bmdev."));

    let claims = manager.validate(&token, now()).unwrap();
    assert_eq!(claims.sub, "user-1");
    assert_eq!(claims.tenant_id.as_str(), "alpha");
    assert_eq!(claims.role, Role::Engineer);
    assert_eq!(claims.identity_kind, IdentityKind::User);
    assert_eq!(claims.exp - claims.iat, 3600);
    assert!(!claims.jti.as_str().is_empty());
}

/// Tests an expired token is rejected with an expiry error.
#[test]
fn test_expired_token_rejected() {
    let manager = TokenManager::new(Redacted::new("test-secret"), "ironlayer-dev", 1);
    let token = manager
        .issue(
            "user-1",
            &TenantId::new("alpha"),
            Role::Viewer,
            IdentityKind::User,
            Vec::new(),
            now(),
        )
        .unwrap();

    let later = now() + Duration::seconds(2);
    let err = manager.validate(&token, later).unwrap_err();
    assert!(matches!(err, TokenError::Expired(_)));
    assert!(err.to_string().contains("expired"));
}

/// Tests a token signed with another secret is rejected.
#[test]
fn test_wrong_secret_rejected() {
    let token = manager()
        .issue(
            "user-1",
            &TenantId::new("alpha"),
            Role::Viewer,
            IdentityKind::User,
            Vec::new(),
            now(),
        )
        .unwrap();

    let other = TokenManager::new(Redacted::new("other-secret"), "ironlayer-dev", 3600);
    assert!(matches!(
        other.validate(&token, now()),
        Err(TokenError::InvalidSignature)
    ));
}

/// Tests a tampered payload is rejected.
#[test]
fn test_tampered_payload_rejected() {
    let manager = manager();
    let token = manager
        .issue(
            "user-1",
            &TenantId::new("alpha"),
            Role::Viewer,
            IdentityKind::User,
            Vec::new(),
            now(),
        )
        .unwrap();

    let mut parts: Vec<&str> = token.splitn(3, '.').collect();
    let forged = format!("x{}", parts[1]);
    parts[1] = &forged;
    let tampered = parts.join(".");
    assert!(manager.validate(&tampered, now()).is_err());
}

/// Tests structurally invalid tokens are rejected as malformed.
#[test]
fn test_malformed_tokens_rejected() {
    let manager = manager();
    for bad in ["", "bmdev.", "nonsense", "bmdev.onlyonepart", "bearer abc"] {
        assert!(matches!(
            manager.validate(bad, now()),
            Err(TokenError::Malformed | TokenError::InvalidSignature)
        ));
    }
}

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// Tests the secret wrapper never renders its contents.
#[test]
fn test_redacted_display_and_debug() {
    let secret = Redacted::new("super-secret-value");
    assert_eq!(format!("{secret}"), "[REDACTED]");
    assert_eq!(format!("{secret:?}"), "[REDACTED]");
    assert_eq!(secret.expose(), "super-secret-value");
}

// ============================================================================
// SECTION: API Keys
// ============================================================================

/// Tests issued keys validate by fingerprint and carry their binding.
#[test]
fn test_api_key_round_trip() {
    let mut registry = ApiKeyRegistry::new();
    let key = registry.issue(TenantId::new("alpha"), Role::Service);
    assert!(key.starts_with("bmkey."));

    let (tenant, role) = registry.validate(&key).unwrap();
    assert_eq!(tenant.as_str(), "alpha");
    assert_eq!(role, Role::Service);
}

/// Tests unknown and malformed keys are rejected.
#[test]
fn test_api_key_rejections() {
    let mut registry = ApiKeyRegistry::new();
    let key = registry.issue(TenantId::new("alpha"), Role::Service);

    assert!(registry.validate("bmkey.deadbeef").is_none());
    assert!(registry.validate("bmkey.not-hex!").is_none());
    assert!(registry.validate("bmkey.").is_none());
    assert!(registry.validate(key.trim_start_matches("bm")).is_none());
}
