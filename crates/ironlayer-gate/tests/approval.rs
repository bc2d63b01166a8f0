// ironlayer-gate/tests/approval.rs
// ============================================================================
// Module: Plan Gate Tests
// Description: Tests for the plan lifecycle and apply gate.
// ============================================================================
//! ## Overview
//! Validates SHA format checks, the auto-approval policy, approval RBAC,
//! and the ordered pre-flight apply gate.

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

use chrono::TimeZone;
use chrono::Utc;
use ironlayer_config::GateSettings;
use ironlayer_core::Plan;
use ironlayer_core::PlanId;
use ironlayer_core::PlanStore;
use ironlayer_core::PlanSummary;
use ironlayer_core::TenantId;
use ironlayer_gate::GateError;
use ironlayer_gate::PlanGate;
use ironlayer_gate::QuotaDecision;
use ironlayer_gate::Role;
use ironlayer_gate::validate_git_sha;
use ironlayer_license::LicenseManager;
use ironlayer_store_sqlite::SqliteStore;
use ironlayer_store_sqlite::SqliteStoreConfig;
use ironlayer_store_sqlite::TenantRepository;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens a repository for the test tenant.
fn repo() -> TenantRepository {
    SqliteStore::open(&SqliteStoreConfig::in_memory())
        .unwrap()
        .for_tenant(TenantId::new("alpha"))
}

/// Builds a plan with the given cost and violation counts.
fn plan(plan_id: &str, cost: f64, breaking: usize, removed: &[&str]) -> Plan {
    Plan {
        plan_id: PlanId::new(plan_id),
        base: "aaaa1111".to_string(),
        target: "bbbb2222".to_string(),
        steps: Vec::new(),
        summary: PlanSummary {
            total_steps: 0,
            estimated_cost_usd: cost,
            models_changed: Vec::new(),
            removed_models: removed.iter().map(ToString::to_string).collect(),
            cosmetic_changes_skipped: Vec::new(),
            contract_violations_count: breaking,
            breaking_contract_violations: breaking,
        },
        approvals: Vec::new(),
        auto_approved: false,
    }
}

/// The default gate.
fn gate() -> PlanGate {
    PlanGate::new(GateSettings::default())
}

/// A permissive license manager.
fn license() -> LicenseManager {
    LicenseManager::new(None).unwrap()
}

// ============================================================================
// SECTION: SHA Validation
// ============================================================================

/// Tests the SHA format window.
#[test]
fn test_git_sha_validation() {
    assert!(validate_git_sha("abcd").is_ok());
    assert!(validate_git_sha("AbCd1234").is_ok());
    assert!(validate_git_sha(&"a".repeat(40)).is_ok());

    assert!(validate_git_sha("abc").is_err());
    assert!(validate_git_sha(&"a".repeat(41)).is_err());
    assert!(validate_git_sha("main").is_err());
    assert!(validate_git_sha("abcd-123").is_err());
}

// ============================================================================
// SECTION: Auto-Approval
// ============================================================================

/// Tests a cheap, clean plan auto-approves on persist.
#[test]
fn test_clean_plan_auto_approves() {
    let repo = repo();
    let persisted = gate().persist_plan(&repo, plan("p1", 1.0, 0, &[])).unwrap();
    assert!(persisted.auto_approved);
    assert!(repo.get_plan(&PlanId::new("p1")).unwrap().unwrap().auto_approved);
}

/// Tests breaking violations block auto-approval.
#[test]
fn test_breaking_violations_block_auto_approval() {
    let repo = repo();
    let persisted = gate().persist_plan(&repo, plan("p1", 1.0, 2, &[])).unwrap();
    assert!(!persisted.auto_approved);
}

/// Tests removed models block auto-approval.
#[test]
fn test_removed_models_block_auto_approval() {
    let repo = repo();
    let persisted = gate()
        .persist_plan(&repo, plan("p1", 1.0, 0, &["gone_model"]))
        .unwrap();
    assert!(!persisted.auto_approved);
}

/// Tests costs at or above the ceiling block auto-approval.
#[test]
fn test_cost_ceiling_blocks_auto_approval() {
    let repo = repo();
    let persisted = gate().persist_plan(&repo, plan("p1", 50.0, 0, &[])).unwrap();
    assert!(!persisted.auto_approved);
}

/// Tests a malformed revision is rejected before persistence.
#[test]
fn test_bad_sha_rejected_on_persist() {
    let repo = repo();
    let mut bad = plan("p1", 1.0, 0, &[]);
    bad.base = "not-a-sha".to_string();
    assert!(matches!(
        gate().persist_plan(&repo, bad),
        Err(GateError::InvalidSha(_))
    ));
}

// ============================================================================
// SECTION: Approvals
// ============================================================================

/// Tests operators can approve and viewers cannot.
#[test]
fn test_approval_rbac() {
    let repo = repo();
    let gate = gate();
    gate.persist_plan(&repo, plan("p1", 100.0, 0, &[])).unwrap();
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

    assert!(matches!(
        gate.approve(&repo, Role::Viewer, &PlanId::new("p1"), "v", None, now),
        Err(GateError::Authz(_))
    ));

    gate.approve(
        &repo,
        Role::Operator,
        &PlanId::new("p1"),
        "op-1",
        Some("reviewed".to_string()),
        now,
    )
    .unwrap();

    let fetched = repo.get_plan(&PlanId::new("p1")).unwrap().unwrap();
    assert_eq!(fetched.approvals.len(), 1);
    assert_eq!(fetched.approvals[0].user_id, "op-1");
}

// ============================================================================
// SECTION: Apply Gate
// ============================================================================

/// Tests the gate passes a fully admitted plan.
#[test]
fn test_apply_gate_passes() {
    let mut approved = plan("p1", 1.0, 0, &[]);
    approved.auto_approved = true;
    gate()
        .check_apply(&approved, Role::Engineer, 0, &QuotaDecision::allow(), &license(), 3, 0)
        .unwrap();
}

/// Tests an unapproved plan is blocked.
#[test]
fn test_unapproved_plan_blocked() {
    let unapproved = plan("p1", 100.0, 0, &[]);
    assert!(matches!(
        gate().check_apply(&unapproved, Role::Engineer, 0, &QuotaDecision::allow(), &license(), 3, 0),
        Err(GateError::NotApproved(_))
    ));
}

/// Tests roles without the apply permission are blocked first.
#[test]
fn test_apply_requires_permission() {
    let mut approved = plan("p1", 1.0, 0, &[]);
    approved.auto_approved = true;
    assert!(matches!(
        gate().check_apply(&approved, Role::Operator, 0, &QuotaDecision::allow(), &license(), 3, 0),
        Err(GateError::Authz(_))
    ));
}

/// Tests breaking contract violations veto apply.
#[test]
fn test_contract_veto() {
    let mut blocked = plan("p1", 1.0, 1, &[]);
    blocked.auto_approved = true;
    assert!(matches!(
        gate().check_apply(&blocked, Role::Engineer, 0, &QuotaDecision::allow(), &license(), 3, 0),
        Err(GateError::ContractViolations { count: 1, .. })
    ));
}

/// Tests blocking test failures veto apply.
#[test]
fn test_blocking_test_veto() {
    let mut approved = plan("p1", 1.0, 0, &[]);
    approved.auto_approved = true;
    assert!(matches!(
        gate().check_apply(&approved, Role::Engineer, 2, &QuotaDecision::allow(), &license(), 3, 0),
        Err(GateError::TestFailures { count: 2, .. })
    ));
}

/// Tests a denied quota decision vetoes apply with its reason.
#[test]
fn test_quota_veto() {
    let mut approved = plan("p1", 1.0, 0, &[]);
    approved.auto_approved = true;
    let denied = QuotaDecision::deny("Monthly plan run quota exceeded (100/100).".to_string());
    let err = gate()
        .check_apply(&approved, Role::Engineer, 0, &denied, &license(), 3, 0)
        .unwrap_err();
    assert!(err.to_string().contains("quota denied"));
}

/// Tests license entitlements veto apply last.
#[test]
fn test_license_veto() {
    let mut approved = plan("p1", 1.0, 0, &[]);
    approved.auto_approved = true;

    let mut manager = license();
    let document = r#"{"license_id":"lic","tenant_id":"alpha","tier":"team","issued_at":"2025-01-01T00:00:00Z","expires_at":"2026-01-01T00:00:00Z","max_models":2,"max_plan_runs_per_day":10,"signature":""}"#;
    manager
        .load_license_from_str(document, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
        .unwrap();

    assert!(matches!(
        gate().check_apply(&approved, Role::Engineer, 0, &QuotaDecision::allow(), &manager, 3, 0),
        Err(GateError::License(_))
    ));
}
