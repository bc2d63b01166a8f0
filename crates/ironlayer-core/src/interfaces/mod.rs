// ironlayer-core/src/interfaces/mod.rs
// ============================================================================
// Module: IronLayer Storage Interfaces
// Description: Backend-agnostic repository contracts for persisted entities.
// Purpose: Define the tenant-scoped storage surfaces used by the services.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Storage interfaces define how IronLayer persists state without embedding
//! database-specific details. Implementations are bound to a single tenant
//! at construction and must never return rows owned by a different tenant.
//! Constraint violations surface as [`StoreError::Conflict`] so services can
//! map them to duplicate-entity semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use thiserror::Error;

use crate::core::BillingCustomer;
use crate::core::LlmUsageRecord;
use crate::core::MeteringEvent;
use crate::core::ModelDefinition;
use crate::core::Plan;
use crate::core::ReconciliationCheck;
use crate::core::RunRecord;
use crate::core::RunStats;
use crate::core::RunStatus;
use crate::core::SchemaDrift;
use crate::core::Snapshot;
use crate::core::TenantConfig;
use crate::core::TokenRevocation;
use crate::core::Watermark;
use crate::core::identifiers::Jti;
use crate::core::identifiers::ModelName;
use crate::core::identifiers::PlanId;
use crate::core::identifiers::RunId;
use crate::core::plan::Approval;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage errors shared across repository implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Database engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Unique or foreign key constraint violated.
    #[error("store conflict: {0}")]
    Conflict(String),
    /// Requested row does not exist for this tenant.
    #[error("store not found: {0}")]
    NotFound(String),
    /// Stored data failed to deserialize.
    #[error("store invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Advisory Locking
// ============================================================================

/// Transaction-scoped advisory lock seam for admission serialization.
///
/// Quota checks acquire a lock keyed on `hash(tenant || event)` before
/// reading usage so two concurrent requests cannot both pass the boundary
/// between `limit - 1` and `limit`. Dialects without advisory locks treat
/// this as a no-op.
pub trait AdvisoryLocker {
    /// Acquires the advisory lock for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the lock statement fails.
    fn advisory_lock(&self, key: i64) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Model Store
// ============================================================================

/// Tenant-scoped persistence for model definitions.
pub trait ModelStore {
    /// Upserts a model definition by name within the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_model(&self, model: &ModelDefinition) -> Result<(), StoreError>;

    /// Fetches a model by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_model(&self, name: &ModelName) -> Result<Option<ModelDefinition>, StoreError>;

    /// Lists all models for the tenant, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_models(&self) -> Result<Vec<ModelDefinition>, StoreError>;

    /// Counts models registered for the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn count_models(&self) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

/// Tenant-scoped persistence for content-addressed snapshots.
pub trait SnapshotStore {
    /// Persists a snapshot; duplicate snapshot IDs conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on duplicate identifiers.
    fn create_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Fetches the model versions captured at a git revision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn versions_at(
        &self,
        environment: &str,
        git_sha: &str,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError>;
}

// ============================================================================
// SECTION: Plan Store
// ============================================================================

/// Tenant-scoped persistence for plans.
///
/// Plans are immutable once created except for the approvals list and the
/// auto-approval flag, and are never deleted.
pub trait PlanStore {
    /// Persists a plan; duplicate plan IDs conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on duplicate identifiers.
    fn create_plan(&self, plan: &Plan) -> Result<(), StoreError>;

    /// Fetches a plan by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn get_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, StoreError>;

    /// Lists recent plans, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn list_recent_plans(&self, limit: u32) -> Result<Vec<Plan>, StoreError>;

    /// Appends an approval to a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the plan does not exist.
    fn append_approval(&self, plan_id: &PlanId, approval: &Approval) -> Result<(), StoreError>;

    /// Sets the auto-approval flag on a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the plan does not exist.
    fn set_auto_approved(&self, plan_id: &PlanId, auto_approved: bool) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Tenant-scoped persistence for run records and statistics.
pub trait RunStore {
    /// Inserts a new run record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn create_run(&self, run: &RunRecord) -> Result<(), StoreError>;

    /// Updates the status and terminal metadata of a run.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        finished_at: Option<DateTime<Utc>>,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Fetches every run belonging to a plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn runs_for_plan(&self, plan_id: &PlanId) -> Result<Vec<RunRecord>, StoreError>;

    /// Fetches runs started within the trailing window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn recent_runs(&self, hours_back: u32) -> Result<Vec<RunRecord>, StoreError>;

    /// Returns historical runtime statistics per model.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn run_stats(&self) -> Result<BTreeMap<String, RunStats>, StoreError>;
}

// ============================================================================
// SECTION: Watermark Store
// ============================================================================

/// Tenant-scoped persistence for incremental watermarks.
pub trait WatermarkStore {
    /// Fetches all watermarks keyed by model name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn watermarks(&self) -> Result<BTreeMap<String, Watermark>, StoreError>;

    /// Advances a model's watermark after a successful incremental run.
    ///
    /// The watermark only ever moves forward: an earlier `partition_end`
    /// than the stored one is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn advance_watermark(
        &self,
        model_name: &ModelName,
        partition_start: NaiveDate,
        partition_end: NaiveDate,
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Tenant Store
// ============================================================================

/// Tenant-scoped persistence for configuration, billing, and seats.
pub trait TenantStore {
    /// Fetches the tenant's configuration overrides.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn tenant_config(&self) -> Result<Option<TenantConfig>, StoreError>;

    /// Upserts the tenant's configuration overrides.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_tenant_config(&self, config: &TenantConfig) -> Result<(), StoreError>;

    /// Soft-deletes the tenant configuration by stamping `deactivated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no configuration exists.
    fn deactivate_tenant(&self, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Fetches the tenant's billing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn billing_customer(&self) -> Result<Option<BillingCustomer>, StoreError>;

    /// Upserts the tenant's billing record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn upsert_billing_customer(&self, customer: &BillingCustomer) -> Result<(), StoreError>;

    /// Counts active (non-deactivated) users of the tenant.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn count_active_users(&self) -> Result<u64, StoreError>;
}

// ============================================================================
// SECTION: Revocation Store
// ============================================================================

/// Tenant-scoped persistence for token revocations.
pub trait RevocationStore {
    /// Records a revocation. Revocations are additive and never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn revoke(&self, revocation: &TokenRevocation) -> Result<(), StoreError>;

    /// Returns whether the token identifier has an unexpired revocation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails; callers treat a failed
    /// read as revoked (fail closed).
    fn is_revoked(&self, jti: &Jti, now: DateTime<Utc>) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Metering Store
// ============================================================================

/// Tenant-scoped persistence for usage events and quota counts.
pub trait MeteringStore {
    /// Inserts a batch of usage events.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_events(&self, events: &[MeteringEvent]) -> Result<(), StoreError>;

    /// Records one AI advisory call's spend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn record_llm_usage(&self, usage: &LlmUsageRecord) -> Result<(), StoreError>;

    /// Counts events of one type recorded in the calendar month of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn monthly_event_count(&self, event_type: &str, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Sums AI spend attributed to one calendar date.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn llm_cost_on(&self, date: NaiveDate) -> Result<f64, StoreError>;

    /// Sums AI spend from the first of the month through `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn llm_cost_month_to_date(&self, date: NaiveDate) -> Result<f64, StoreError>;
}

// ============================================================================
// SECTION: Reconciliation Store
// ============================================================================

/// Tenant-scoped persistence for reconciliation checks and schema drift.
pub trait ReconciliationStore {
    /// Records a reconciliation check.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn record_check(&self, check: &ReconciliationCheck) -> Result<(), StoreError>;

    /// Lists unresolved checks, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn unresolved_checks(&self, limit: u32) -> Result<Vec<ReconciliationCheck>, StoreError>;

    /// Records a schema drift observation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn record_drift(&self, drift: &SchemaDrift) -> Result<(), StoreError>;

    /// Lists unresolved drift rows, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn unresolved_drift(&self, limit: u32) -> Result<Vec<SchemaDrift>, StoreError>;
}
