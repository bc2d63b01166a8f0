// ironlayer-gate/src/approval.rs
// ============================================================================
// Module: Plan Lifecycle Gate
// Description: Plan persistence, approvals, auto-approval, and the apply gate.
// Purpose: Ensure only admitted, approved, safe plans reach the executor.
// Dependencies: ironlayer-core, ironlayer-license, ironlayer-config
// ============================================================================

//! ## Overview
//! The gate owns the plan lifecycle after generation: persist the immutable
//! plan, collect approvals subject to RBAC, apply the deterministic
//! auto-approval policy, and run the pre-flight apply checks (role, license
//! entitlements, quota admission, contract and test vetoes). A plan with
//! zero breaking contract violations, no removed models, and an estimated
//! cost under the configured ceiling auto-approves; everything else waits
//! for a human with the approve permission.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Utc;
use ironlayer_config::GateSettings;
use ironlayer_core::Plan;
use ironlayer_core::PlanId;
use ironlayer_core::PlanStore;
use ironlayer_core::StoreError;
use ironlayer_core::plan::Approval;
use ironlayer_license::LicenseError;
use ironlayer_license::LicenseManager;
use thiserror::Error;
use tracing::info;

use crate::quota::QuotaDecision;
use crate::rbac::AuthzError;
use crate::rbac::Permission;
use crate::rbac::Role;
use crate::rbac::require_permission;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Plan lifecycle and apply-gate errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// A git revision failed the SHA format check.
    #[error("invalid git sha '{0}'")]
    InvalidSha(String),
    /// The caller lacks a required permission.
    #[error(transparent)]
    Authz(#[from] AuthzError),
    /// The plan is neither approved nor auto-approved.
    #[error("plan {0} is not approved")]
    NotApproved(PlanId),
    /// A STRICT contract carries breaking violations.
    #[error("plan {plan_id} has {count} breaking contract violations")]
    ContractViolations {
        /// The blocked plan.
        plan_id: PlanId,
        /// Breaking violation count.
        count: usize,
    },
    /// Blocking declarative tests failed.
    #[error("plan {plan_id} has {count} blocking test failures")]
    TestFailures {
        /// The blocked plan.
        plan_id: PlanId,
        /// Failed blocking test count.
        count: usize,
    },
    /// Quota admission denied the apply.
    #[error("quota denied: {0}")]
    QuotaDenied(String),
    /// License entitlement denied the apply.
    #[error(transparent)]
    License(#[from] LicenseError),
    /// Persistence failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: SHA Validation
// ============================================================================

/// Validates a git revision against `[0-9a-fA-F]{4,40}`.
///
/// # Errors
///
/// Returns [`GateError::InvalidSha`] for anything else.
pub fn validate_git_sha(sha: &str) -> Result<&str, GateError> {
    let valid = (4..=40).contains(&sha.len()) && sha.chars().all(|ch| ch.is_ascii_hexdigit());
    if valid {
        Ok(sha)
    } else {
        Err(GateError::InvalidSha(sha.to_string()))
    }
}

// ============================================================================
// SECTION: Plan Gate
// ============================================================================

/// Plan lifecycle service.
pub struct PlanGate {
    /// Gate configuration.
    settings: GateSettings,
}

impl PlanGate {
    /// Creates a gate with the given settings.
    #[must_use]
    pub const fn new(settings: GateSettings) -> Self {
        Self { settings }
    }

    /// Returns true when the plan qualifies for auto-approval.
    ///
    /// Policy: no breaking contract violations, no removed models, and a
    /// total estimated cost under the configured ceiling.
    #[must_use]
    pub fn auto_approve_eligible(&self, plan: &Plan) -> bool {
        plan.summary.breaking_contract_violations == 0
            && plan.summary.removed_models.is_empty()
            && plan.summary.estimated_cost_usd < self.settings.auto_approve_cost_ceiling_usd
    }

    /// Persists a freshly generated plan, applying the auto-approval
    /// policy. The plan row is immutable afterwards except for approvals
    /// and the auto-approval flag.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidSha`] for malformed revisions and
    /// [`GateError::Store`] (conflict on duplicate plan IDs) otherwise.
    pub fn persist_plan<S: PlanStore>(&self, store: &S, mut plan: Plan) -> Result<Plan, GateError> {
        validate_git_sha(&plan.base)?;
        validate_git_sha(&plan.target)?;
        plan.auto_approved = self.auto_approve_eligible(&plan);
        store.create_plan(&plan)?;
        if plan.auto_approved {
            info!(plan_id = %plan.plan_id, "plan auto-approved");
        }
        Ok(plan)
    }

    /// Records an approval from a caller holding the approve permission.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Authz`] when the role lacks `APPROVE_PLANS`
    /// and [`GateError::Store`] when the plan does not exist.
    pub fn approve<S: PlanStore>(
        &self,
        store: &S,
        role: Role,
        plan_id: &PlanId,
        user_id: &str,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), GateError> {
        require_permission(role, Permission::ApprovePlans)?;
        store.append_approval(
            plan_id,
            &Approval {
                user_id: user_id.to_string(),
                approved_at: now.to_rfc3339(),
                comment,
            },
        )?;
        Ok(())
    }

    /// Runs the pre-flight apply gate.
    ///
    /// Order: role, approval state, STRICT contract veto, blocking test
    /// veto, quota admission, then license entitlements.
    ///
    /// # Errors
    ///
    /// Returns the first [`GateError`] encountered in gate order.
    #[allow(
        clippy::too_many_arguments,
        reason = "The gate composes every admission input; callers build them in place."
    )]
    pub fn check_apply(
        &self,
        plan: &Plan,
        role: Role,
        failed_blocking_tests: usize,
        quota: &QuotaDecision,
        license: &LicenseManager,
        model_count: u64,
        plan_runs_today: u64,
    ) -> Result<(), GateError> {
        require_permission(role, Permission::ApplyPlans)?;

        if !plan.auto_approved && plan.approvals.is_empty() {
            return Err(GateError::NotApproved(plan.plan_id.clone()));
        }

        if plan.summary.breaking_contract_violations > 0 {
            return Err(GateError::ContractViolations {
                plan_id: plan.plan_id.clone(),
                count: plan.summary.breaking_contract_violations,
            });
        }

        if failed_blocking_tests > 0 {
            return Err(GateError::TestFailures {
                plan_id: plan.plan_id.clone(),
                count: failed_blocking_tests,
            });
        }

        if !quota.allowed {
            return Err(GateError::QuotaDenied(
                quota.reason.clone().unwrap_or_else(|| "quota exceeded".to_string()),
            ));
        }

        license.check_model_limit(model_count)?;
        license.check_plan_runs_today(plan_runs_today)?;
        Ok(())
    }
}
