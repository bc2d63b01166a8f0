// ironlayer-license/tests/license.rs
// ============================================================================
// Module: License Tests
// Description: Tests for signature verification, expiry, and entitlements.
// ============================================================================
//! ## Overview
//! Validates Ed25519 signature checking over canonical JSON, expiry
//! ordering, tier resolution, feature gating, and entitlement limits.

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

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Duration;
use chrono::TimeZone;
use chrono::Utc;
use ed25519_dalek::Signer;
use ed25519_dalek::SigningKey;
use ironlayer_core::PlanTier;
use ironlayer_license::Feature;
use ironlayer_license::LicenseError;
use ironlayer_license::LicenseManager;
use ironlayer_license::signing_bytes;
use ironlayer_license::tier_has_feature;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed verification instant.
fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

/// Builds an unsigned license document.
fn license_json(tier: &str, expires_days: i64) -> String {
    let issued = now();
    let expires = issued + Duration::days(expires_days);
    format!(
        r#"{{"license_id":"lic-test-001","tenant_id":"test-tenant","tier":"{tier}","issued_at":"{}","expires_at":"{}","max_models":500,"max_plan_runs_per_day":100,"ai_enabled":true,"features":[],"signature":""}}"#,
        issued.to_rfc3339(),
        expires.to_rfc3339()
    )
}

/// Signs a license document with the given key.
fn sign(document: &str, key: &SigningKey) -> String {
    let message = signing_bytes(document).unwrap();
    let signature = key.sign(&message);
    let encoded = BASE64.encode(signature.to_bytes());
    document.replace(r#""signature":"""#, &format!(r#""signature":"{encoded}""#))
}

/// Deterministic test keypair.
fn keypair() -> (SigningKey, [u8; 32]) {
    let signing = SigningKey::from_bytes(&[7u8; 32]);
    let public = signing.verifying_key().to_bytes();
    (signing, public)
}

// ============================================================================
// SECTION: Signature Verification
// ============================================================================

/// Tests a correctly signed license loads and sets the tier.
#[test]
fn test_valid_signature_accepted() {
    let (signing, public) = keypair();
    let document = sign(&license_json("enterprise", 365), &signing);

    let mut manager = LicenseManager::new(Some(&public)).unwrap();
    let license = manager.load_license_from_str(&document, now()).unwrap();
    assert_eq!(license.license_id, "lic-test-001");
    assert_eq!(manager.effective_tier(None), PlanTier::Enterprise);
}

/// Tests an invalid signature is rejected.
#[test]
fn test_invalid_signature_rejected() {
    let (_, public) = keypair();
    let garbage = BASE64.encode(b"invalidinvalidinvalidinvalidinvalidinvalidinvalidinvalidinvalid!");
    let document =
        license_json("enterprise", 365).replace(r#""signature":"""#, &format!(r#""signature":"{garbage}""#));

    let mut manager = LicenseManager::new(Some(&public)).unwrap();
    let err = manager.load_license_from_str(&document, now()).unwrap_err();
    assert!(err.to_string().contains("verification failed"));
}

/// Tests tampering after signing is rejected.
#[test]
fn test_tampered_document_rejected() {
    let (signing, public) = keypair();
    let document = sign(&license_json("enterprise", 365), &signing)
        .replace(r#""tier":"enterprise""#, r#""tier":"community""#);

    let mut manager = LicenseManager::new(Some(&public)).unwrap();
    let err = manager.load_license_from_str(&document, now()).unwrap_err();
    assert!(err.to_string().contains("verification failed"));
}

/// Tests an empty signature is rejected with the no-signature error.
#[test]
fn test_missing_signature_rejected() {
    let (_, public) = keypair();
    let mut manager = LicenseManager::new(Some(&public)).unwrap();
    let err = manager
        .load_license_from_str(&license_json("enterprise", 365), now())
        .unwrap_err();
    assert!(err.to_string().contains("no signature"));
}

/// Tests a signature from a different key is rejected.
#[test]
fn test_wrong_key_rejected() {
    let (signing, _) = keypair();
    let other_public = SigningKey::from_bytes(&[9u8; 32]).verifying_key().to_bytes();
    let document = sign(&license_json("enterprise", 365), &signing);

    let mut manager = LicenseManager::new(Some(&other_public)).unwrap();
    assert!(manager.load_license_from_str(&document, now()).is_err());
}

/// Tests verification is skipped when no key is configured.
#[test]
fn test_no_key_skips_verification() {
    let mut manager = LicenseManager::new(None).unwrap();
    let license = manager
        .load_license_from_str(&license_json("team", 365), now())
        .unwrap();
    assert_eq!(license.tier, PlanTier::Team);
}

// ============================================================================
// SECTION: Expiry
// ============================================================================

/// Tests an expired license is rejected after signature verification.
#[test]
fn test_expired_license_rejected() {
    let (signing, public) = keypair();
    let document = sign(&license_json("enterprise", -1), &signing);
    let mut manager = LicenseManager::new(Some(&public)).unwrap();
    let err = manager.load_license_from_str(&document, now()).unwrap_err();
    assert!(matches!(err, LicenseError::Expired(_)));
}

// ============================================================================
// SECTION: Defaults and Tiers
// ============================================================================

/// Tests omitted entitlements default to 50 models and 10 daily runs.
#[test]
fn test_entitlement_defaults() {
    let document = r#"{"license_id":"lic-min","tenant_id":"t","tier":"community","issued_at":"2025-01-01T00:00:00Z","expires_at":"2026-01-01T00:00:00Z","signature":""}"#;
    let mut manager = LicenseManager::new(None).unwrap();
    let license = manager.load_license_from_str(document, now()).unwrap();
    assert_eq!(license.max_models, 50);
    assert_eq!(license.max_plan_runs_per_day, 10);
    assert!(!license.ai_enabled);
}

/// Tests the billing tier applies when no license is loaded.
#[test]
fn test_billing_tier_fallback() {
    let manager = LicenseManager::new(None).unwrap();
    assert_eq!(manager.effective_tier(Some(PlanTier::Team)), PlanTier::Team);
    assert_eq!(manager.effective_tier(None), PlanTier::Community);
}

// ============================================================================
// SECTION: Feature Gating
// ============================================================================

/// Tests the tier-to-feature table.
#[test]
fn test_tier_feature_table() {
    assert!(!tier_has_feature(PlanTier::Community, Feature::AiAdvisory));
    assert!(tier_has_feature(PlanTier::Team, Feature::AiAdvisory));
    assert!(!tier_has_feature(PlanTier::Team, Feature::AuditLog));
    assert!(!tier_has_feature(PlanTier::Team, Feature::Reconciliation));
    assert!(tier_has_feature(PlanTier::Enterprise, Feature::AuditLog));
    assert!(tier_has_feature(PlanTier::Enterprise, Feature::Reconciliation));
}

/// Tests a named feature grant unlocks beyond the tier.
#[test]
fn test_named_feature_grant() {
    let document = r#"{"license_id":"lic-grant","tenant_id":"t","tier":"community","issued_at":"2025-01-01T00:00:00Z","expires_at":"2026-01-01T00:00:00Z","features":["audit_log"],"signature":""}"#;
    let mut manager = LicenseManager::new(None).unwrap();
    manager.load_license_from_str(document, now()).unwrap();
    assert!(manager.has_feature(None, Feature::AuditLog));
    assert!(!manager.has_feature(None, Feature::Reconciliation));
}

// ============================================================================
// SECTION: Entitlement Limits
// ============================================================================

/// Tests model and daily-run entitlements enforce their maxima.
#[test]
fn test_entitlement_limits() {
    let (signing, public) = keypair();
    let document = sign(&license_json("enterprise", 365), &signing);
    let mut manager = LicenseManager::new(Some(&public)).unwrap();
    manager.load_license_from_str(&document, now()).unwrap();

    assert!(manager.check_model_limit(500).is_ok());
    assert!(matches!(
        manager.check_model_limit(501),
        Err(LicenseError::LimitExceeded(_))
    ));
    assert!(manager.check_plan_runs_today(99).is_ok());
    assert!(matches!(
        manager.check_plan_runs_today(100),
        Err(LicenseError::LimitExceeded(_))
    ));
}

/// Tests limits pass when no license is loaded.
#[test]
fn test_limits_unconstrained_without_license() {
    let manager = LicenseManager::new(None).unwrap();
    assert!(manager.check_model_limit(10_000).is_ok());
    assert!(manager.check_plan_runs_today(10_000).is_ok());
}
