// ironlayer-core/src/core/recon.rs
// ============================================================================
// Module: Reconciliation Records
// Description: Discrepancy checks, schema drift, and token revocations.
// Purpose: Persist what reconciliation found for operator review.
// Dependencies: serde, chrono
// ============================================================================

//! ## Overview
//! Reconciliation compares recorded run state against the execution backend
//! and classifies every mismatch. Matched results are stored as resolved
//! checks with no discrepancy kind; mismatches stay unresolved until an
//! operator acts on them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::Jti;
use crate::core::identifiers::ModelName;
use crate::core::identifiers::RunId;
use crate::core::run::RunStatus;

// ============================================================================
// SECTION: Discrepancy Kind
// ============================================================================

/// Classification of a recorded-versus-actual status mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Recorded SUCCESS, backend reports FAIL.
    PhantomSuccess,
    /// Recorded FAIL, backend reports SUCCESS.
    MissedSuccess,
    /// Recorded RUNNING, backend reports SUCCESS.
    StaleRunning,
    /// Recorded RUNNING, backend reports FAIL.
    StaleRunningFailed,
    /// Recorded PENDING, backend reports a terminal outcome.
    StalePending,
    /// Any other mismatch.
    StatusMismatch,
}

impl DiscrepancyKind {
    /// Classifies a mismatch between recorded and actual status.
    #[must_use]
    pub const fn classify(expected: RunStatus, actual: RunStatus) -> Self {
        match (expected, actual) {
            (RunStatus::Success, RunStatus::Fail) => Self::PhantomSuccess,
            (RunStatus::Fail, RunStatus::Success) => Self::MissedSuccess,
            (RunStatus::Running, RunStatus::Success) => Self::StaleRunning,
            (RunStatus::Running, RunStatus::Fail) => Self::StaleRunningFailed,
            (RunStatus::Pending, RunStatus::Success | RunStatus::Fail) => Self::StalePending,
            _ => Self::StatusMismatch,
        }
    }
}

// ============================================================================
// SECTION: Reconciliation Check
// ============================================================================

/// One recorded comparison between control-plane state and the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationCheck {
    /// Run that was verified.
    pub run_id: RunId,
    /// Model the run executed.
    pub model_name: ModelName,
    /// Status the control plane had recorded.
    pub expected_status: RunStatus,
    /// Status the backend reported.
    pub warehouse_status: RunStatus,
    /// Discrepancy classification; absent when statuses matched.
    pub discrepancy_type: Option<DiscrepancyKind>,
    /// Whether the check is resolved. Matches are recorded resolved.
    pub resolved: bool,
    /// Operator who resolved the check.
    pub resolved_by: Option<String>,
    /// Resolution time.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Operator note explaining the resolution.
    pub resolution_note: Option<String>,
}

// ============================================================================
// SECTION: Schema Drift
// ============================================================================

/// Classification of warehouse schema drift for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftKind {
    /// Schemas match.
    None,
    /// An expected column disappeared.
    ColumnRemoved,
    /// A column's type changed.
    TypeChanged,
    /// An unexpected column appeared.
    ColumnAdded,
}

/// One recorded schema drift check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDrift {
    /// Model whose schema was compared.
    pub model_name: ModelName,
    /// Expected columns as JSON, sorted by lowercased name.
    pub expected_columns_json: Option<String>,
    /// Actual columns as JSON, sorted by lowercased name.
    pub actual_columns_json: Option<String>,
    /// Worst drift classification found.
    pub drift_type: DriftKind,
    /// Per-column drift details as JSON.
    pub drift_details_json: Option<String>,
    /// Whether the drift has been acknowledged.
    pub resolved: bool,
}

// ============================================================================
// SECTION: Token Revocation
// ============================================================================

/// An additive revocation entry keyed by token identifier.
///
/// Revocations are never deleted; they age out once `expires_at` passes the
/// token's own expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRevocation {
    /// Revoked token identifier.
    pub jti: Jti,
    /// Reason label for audit.
    pub reason: String,
    /// When the revocation was recorded.
    pub revoked_at: DateTime<Utc>,
    /// When the underlying token expires and the entry may be aged out.
    pub expires_at: DateTime<Utc>,
}
