// ironlayer-core/src/core/run.rs
// ============================================================================
// Module: Run Records
// Description: Step execution outcomes, watermarks, and run statistics.
// Purpose: Track what the execution backend did with each plan step.
// Dependencies: serde, chrono
// ============================================================================

//! ## Overview
//! A [`RunRecord`] is the control plane's view of one step execution. The
//! backend's own identifier is kept in `external_run_id` so reconciliation
//! can later verify the recorded status against warehouse reality.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ModelName;
use crate::core::identifiers::PlanId;
use crate::core::identifiers::RunId;
use crate::core::identifiers::StepId;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Lifecycle state of a step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// Queued, not yet submitted or started.
    Pending,
    /// Submitted and executing.
    Running,
    /// Terminal: completed successfully.
    Success,
    /// Terminal: failed.
    Fail,
    /// Terminal: cancelled before completion.
    Cancelled,
}

impl RunStatus {
    /// Returns true when the status is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Fail | Self::Cancelled)
    }
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// Outcome of a step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identifier.
    pub run_id: RunId,
    /// Plan the step belongs to.
    pub plan_id: PlanId,
    /// Step executed.
    pub step_id: StepId,
    /// Model the step ran.
    pub model_name: ModelName,
    /// Current lifecycle state.
    pub status: RunStatus,
    /// Start time, when known.
    pub started_at: Option<DateTime<Utc>>,
    /// Finish time, when terminal.
    pub finished_at: Option<DateTime<Utc>>,
    /// Execution backend's own run identifier.
    pub external_run_id: Option<String>,
    /// Error message for failed runs.
    pub error_message: Option<String>,
    /// URI of the backend's log output.
    pub logs_uri: Option<String>,
    /// Observed cost in USD, when reported.
    pub cost_usd: Option<f64>,
}

// ============================================================================
// SECTION: Watermark
// ============================================================================

/// High-water date range through which an incremental model is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    /// Model the watermark belongs to.
    pub model_name: ModelName,
    /// First materialized date.
    pub partition_start: NaiveDate,
    /// Last materialized date.
    pub partition_end: NaiveDate,
}

// ============================================================================
// SECTION: Run Stats
// ============================================================================

/// Historical runtime statistics for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Mean observed runtime in seconds.
    pub avg_runtime_seconds: f64,
    /// Number of runs the mean is drawn from.
    pub run_count: u64,
}
