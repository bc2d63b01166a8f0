// ironlayer-core/src/core/plan.rs
// ============================================================================
// Module: Plan Types
// Description: Deterministic execution plan envelope and steps.
// Purpose: Carry the byte-reproducible output of the interval planner.
// Dependencies: serde, crate::core::{hashing, identifiers}
// ============================================================================

//! ## Overview
//! A [`Plan`] is the ordered, dependency-respecting list of steps required to
//! realize a target revision from a base revision. Plans are content
//! addressed: the plan identifier derives from the base and target revisions
//! and the ordered step identifiers, and the serialized tree contains no
//! wall-clock timestamps. A plan is immutable once generated except for its
//! approvals list and auto-approval flag.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

use crate::contracts::ContractViolation;
use crate::core::hashing::HashError;
use crate::core::hashing::canonical_json_bytes;
use crate::core::identifiers::PlanId;
use crate::core::identifiers::StepId;

// ============================================================================
// SECTION: Run Type
// ============================================================================

/// How a step recomputes its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunType {
    /// Rebuild the full output.
    FullRefresh,
    /// Recompute only the input date range.
    Incremental,
}

// ============================================================================
// SECTION: Input Range
// ============================================================================

/// Inclusive calendar-date window for an incremental run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRange {
    /// First date to process.
    pub start: NaiveDate,
    /// Last date to process.
    pub end: NaiveDate,
}

// ============================================================================
// SECTION: Plan Step
// ============================================================================

/// One model's run within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Content-addressed step identifier.
    pub step_id: StepId,
    /// Model this step runs.
    pub model: String,
    /// Recompute strategy for this step.
    pub run_type: RunType,
    /// Date window for incremental runs; absent for full refreshes.
    pub input_range: Option<InputRange>,
    /// Deterministic human-readable reason the step exists.
    pub reason: String,
    /// Step identifiers of in-plan upstream steps.
    pub depends_on: Vec<StepId>,
    /// Topological layer; equal layers carry no mutual dependency.
    pub parallel_group: u32,
    /// Estimated compute seconds for the step.
    pub estimated_compute_seconds: f64,
    /// Estimated cost in USD for the step.
    pub estimated_cost_usd: f64,
    /// Contract violations attributed to this step's model.
    pub contract_violations: Vec<ContractViolation>,
    /// Diff classification that put the model in the plan.
    pub diff_detail: String,
}

// ============================================================================
// SECTION: Plan Summary
// ============================================================================

/// Aggregated facts about a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Number of steps in the plan.
    pub total_steps: usize,
    /// Sum of step cost estimates in USD.
    pub estimated_cost_usd: f64,
    /// Models that changed (added or modified), sorted.
    pub models_changed: Vec<String>,
    /// Models removed between base and target, sorted.
    pub removed_models: Vec<String>,
    /// Models whose only changes were whitespace or comments, sorted.
    pub cosmetic_changes_skipped: Vec<String>,
    /// Total contract violations across the plan.
    pub contract_violations_count: usize,
    /// Breaking contract violations across the plan.
    pub breaking_contract_violations: usize,
}

// ============================================================================
// SECTION: Approval
// ============================================================================

/// One recorded approval on a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approval {
    /// Approving user identifier.
    pub user_id: String,
    /// Approval time (RFC 3339). Approvals are mutable plan metadata and
    /// never participate in plan identity.
    pub approved_at: String,
    /// Optional reviewer comment.
    pub comment: Option<String>,
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Deterministic execution envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Content-addressed plan identifier.
    pub plan_id: PlanId,
    /// Base git revision.
    pub base: String,
    /// Target git revision.
    pub target: String,
    /// Steps ordered alphabetically by model name.
    pub steps: Vec<PlanStep>,
    /// Aggregated plan facts.
    pub summary: PlanSummary,
    /// Recorded approvals, in arrival order.
    pub approvals: Vec<Approval>,
    /// Whether the plan was auto-approved by policy.
    pub auto_approved: bool,
}

impl Plan {
    /// Serializes the plan as canonical JSON (RFC 8785, sorted keys).
    ///
    /// Round-tripping the output through parse and re-serialize is a fixed
    /// point, which downstream consumers rely on for byte comparison.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails.
    pub fn canonical_json(&self) -> Result<Vec<u8>, HashError> {
        canonical_json_bytes(self)
    }
}
