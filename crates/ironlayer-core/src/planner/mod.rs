// ironlayer-core/src/planner/mod.rs
// ============================================================================
// Module: Interval Planner
// Description: Deterministic plan generation from diff, DAG, and watermarks.
// Purpose: Produce a byte-reproducible execution plan for a revision pair.
// Dependencies: chrono, crate::{contracts, core, diff, graph}
// ============================================================================

//! ## Overview
//! The planner turns (model set, diff, DAG, watermarks, run statistics,
//! as-of date) into an ordered step list. Identical inputs always produce
//! byte-identical canonical JSON: the as-of date is an explicit required
//! input, step and plan identifiers are content addressed with null-byte
//! domain separation, steps are sorted alphabetically by model name (ties
//! broken by step identifier), and no wall-clock value enters the tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::Days;
use chrono::NaiveDate;
use thiserror::Error;

use crate::contracts::ContractValidation;
use crate::contracts::ViolationSeverity;
use crate::core::ModelDefinition;
use crate::core::ModelKind;
use crate::core::RunStats;
use crate::core::Watermark;
use crate::core::hashing::compute_deterministic_id;
use crate::core::identifiers::PlanId;
use crate::core::identifiers::StepId;
use crate::core::plan::InputRange;
use crate::core::plan::Plan;
use crate::core::plan::PlanStep;
use crate::core::plan::PlanSummary;
use crate::core::plan::RunType;
use crate::diff::DiffResult;
use crate::graph::ModelDag;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Compute estimate applied when a model has no run history (seconds).
const DEFAULT_COMPUTE_SECONDS: f64 = 300.0;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Planner tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannerConfig {
    /// Lookback window applied when an incremental model has no watermark.
    pub default_lookback_days: u32,
    /// Cost per compute second in USD.
    pub cost_per_compute_second: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { default_lookback_days: 30, cost_per_compute_second: 0.0007 }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the planner.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The as-of date was not supplied; planning on "today" is forbidden.
    #[error("as_of_date is required for deterministic planning")]
    MissingAsOfDate,
    /// Date arithmetic left the supported calendar range.
    #[error("lookback window underflows the calendar from {0}")]
    LookbackUnderflow(NaiveDate),
}

// ============================================================================
// SECTION: Request
// ============================================================================

/// Inputs to one planning run.
#[derive(Debug, Clone, Copy)]
pub struct PlannerRequest<'a> {
    /// Every known model, keyed by name.
    pub models: &'a BTreeMap<String, ModelDefinition>,
    /// Structural diff between base and target.
    pub diff: &'a DiffResult,
    /// Dependency graph over the model set.
    pub dag: &'a ModelDag,
    /// High-water marks for incremental models, keyed by name.
    pub watermarks: &'a BTreeMap<String, Watermark>,
    /// Historical runtime statistics, keyed by name.
    pub run_stats: &'a BTreeMap<String, RunStats>,
    /// Base git revision.
    pub base: &'a str,
    /// Target git revision.
    pub target: &'a str,
    /// Calendar date the plan is computed against. Required.
    pub as_of_date: Option<NaiveDate>,
    /// Contract validation result to fold into steps and summary.
    pub contracts: Option<&'a ContractValidation>,
    /// Tuning parameters.
    pub config: PlannerConfig,
}

// ============================================================================
// SECTION: Plan Generation
// ============================================================================

/// Generates a deterministic execution plan.
///
/// # Errors
///
/// Returns [`PlannerError::MissingAsOfDate`] when no as-of date is supplied
/// and [`PlannerError::LookbackUnderflow`] when the lookback window leaves
/// the calendar.
pub fn generate_plan(request: PlannerRequest<'_>) -> Result<Plan, PlannerError> {
    let as_of_date = request.as_of_date.ok_or(PlannerError::MissingAsOfDate)?;

    let added: BTreeSet<String> = request.diff.added_models.iter().cloned().collect();
    let modified: BTreeSet<String> = request.diff.modified_models.iter().cloned().collect();

    let seeds: BTreeSet<String> = added
        .union(&modified)
        .filter(|name| request.models.contains_key(*name))
        .cloned()
        .collect();
    let affected = request.dag.downstream_closure(&seeds);
    let groups = request.dag.parallel_groups(&affected);

    let mut steps = Vec::with_capacity(affected.len());
    for name in &affected {
        let Some(model) = request.models.get(name) else {
            continue;
        };
        let step = build_step(&request, model, name, &added, &modified, &affected, &groups, as_of_date)?;
        steps.push(step);
    }

    steps.sort_by(|a, b| {
        (a.model.as_str(), a.step_id.as_str()).cmp(&(b.model.as_str(), b.step_id.as_str()))
    });

    let step_ids_concat: String = steps
        .iter()
        .map(|step| step.step_id.as_str())
        .collect::<Vec<_>>()
        .concat();
    let plan_id = compute_deterministic_id(&[request.base, request.target, &step_ids_concat]);

    let mut models_changed: Vec<String> = seeds.iter().cloned().collect();
    models_changed.sort();

    let estimated_cost_usd = steps.iter().map(|step| step.estimated_cost_usd).sum();
    let (violation_count, breaking_count) = request.contracts.map_or((0, 0), |validation| {
        (
            validation.violations.len(),
            validation
                .violations
                .iter()
                .filter(|violation| violation.severity == ViolationSeverity::Breaking)
                .count(),
        )
    });

    let summary = PlanSummary {
        total_steps: steps.len(),
        estimated_cost_usd,
        models_changed,
        removed_models: request.diff.removed_models.clone(),
        cosmetic_changes_skipped: request.diff.cosmetic_changes_skipped.clone(),
        contract_violations_count: violation_count,
        breaking_contract_violations: breaking_count,
    };

    Ok(Plan {
        plan_id: PlanId::new(plan_id),
        base: request.base.to_string(),
        target: request.target.to_string(),
        steps,
        summary,
        approvals: Vec::new(),
        auto_approved: false,
    })
}

// ============================================================================
// SECTION: Step Construction
// ============================================================================

/// Builds one plan step for an affected model.
#[allow(
    clippy::too_many_arguments,
    reason = "Internal helper fed entirely from generate_plan locals."
)]
fn build_step(
    request: &PlannerRequest<'_>,
    model: &ModelDefinition,
    name: &str,
    added: &BTreeSet<String>,
    modified: &BTreeSet<String>,
    affected: &BTreeSet<String>,
    groups: &BTreeMap<String, u32>,
    as_of_date: NaiveDate,
) -> Result<PlanStep, PlannerError> {
    let is_added = added.contains(name);
    let (run_type, input_range) = if is_added {
        // Newly added models always rebuild from scratch regardless of kind.
        (RunType::FullRefresh, None)
    } else {
        classify_run(request, model, name, as_of_date)?
    };

    let reason = if is_added {
        "new model added"
    } else if modified.contains(name) {
        "model modified"
    } else {
        "upstream dependency changed"
    };

    let diff_detail = if is_added {
        "added"
    } else if modified.contains(name) {
        "modified"
    } else {
        "downstream of changed model"
    };

    let compute_seconds = request
        .run_stats
        .get(name)
        .map_or(DEFAULT_COMPUTE_SECONDS, |stats| stats.avg_runtime_seconds);
    let cost_usd = compute_seconds * request.config.cost_per_compute_second;

    let step_id = StepId::new(compute_deterministic_id(&[name, request.base, request.target]));

    let mut parents: Vec<&str> = request
        .dag
        .upstream_of(name)
        .into_iter()
        .filter(|parent| affected.contains(*parent))
        .collect();
    parents.sort_unstable();
    let depends_on = parents
        .into_iter()
        .map(|parent| {
            StepId::new(compute_deterministic_id(&[parent, request.base, request.target]))
        })
        .collect();

    let contract_violations = request
        .contracts
        .map(|validation| validation.for_model(name))
        .unwrap_or_default();

    Ok(PlanStep {
        step_id,
        model: name.to_string(),
        run_type,
        input_range,
        reason: reason.to_string(),
        depends_on,
        parallel_group: groups.get(name).copied().unwrap_or(0),
        estimated_compute_seconds: compute_seconds,
        estimated_cost_usd: cost_usd,
        contract_violations,
        diff_detail: diff_detail.to_string(),
    })
}

/// Classifies the run type and input range for a pre-existing model.
fn classify_run(
    request: &PlannerRequest<'_>,
    model: &ModelDefinition,
    name: &str,
    as_of_date: NaiveDate,
) -> Result<(RunType, Option<InputRange>), PlannerError> {
    let incremental = match model.kind {
        ModelKind::IncrementalByTimeRange => model.time_column.is_some(),
        ModelKind::AppendOnly => true,
        ModelKind::FullRefresh | ModelKind::MergeByKey => false,
    };
    if !incremental {
        return Ok((RunType::FullRefresh, None));
    }

    let start = match request.watermarks.get(name) {
        Some(watermark) => watermark.partition_end,
        None => as_of_date
            .checked_sub_days(Days::new(u64::from(request.config.default_lookback_days)))
            .ok_or(PlannerError::LookbackUnderflow(as_of_date))?,
    };
    Ok((RunType::Incremental, Some(InputRange { start, end: as_of_date })))
}
