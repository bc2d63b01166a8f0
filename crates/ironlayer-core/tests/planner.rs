// ironlayer-core/tests/planner.rs
// ============================================================================
// Module: Planner Tests
// Description: Tests for interval plan generation.
// ============================================================================
//! ## Overview
//! Validates run-type classification, downstream propagation, parallel
//! grouping, cost estimation, and the required as-of date.

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

use std::collections::BTreeMap;

use chrono::NaiveDate;
use ironlayer_core::DiffResult;
use ironlayer_core::Materialization;
use ironlayer_core::ModelDag;
use ironlayer_core::ModelDefinition;
use ironlayer_core::ModelKind;
use ironlayer_core::ModelName;
use ironlayer_core::PlannerConfig;
use ironlayer_core::PlannerError;
use ironlayer_core::PlannerRequest;
use ironlayer_core::RunStats;
use ironlayer_core::RunType;
use ironlayer_core::Watermark;
use ironlayer_core::generate_plan;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// As-of date shared by most tests.
fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

/// Builds a minimal model definition.
fn model(name: &str, kind: ModelKind, refs: &[&str], time_column: Option<&str>) -> ModelDefinition {
    ModelDefinition {
        name: ModelName::new(name),
        kind,
        materialization: Materialization::Table,
        time_column: time_column.map(ToString::to_string),
        unique_key: None,
        owner: None,
        tags: Vec::new(),
        file_path: format!("models/{name}.sql"),
        raw_sql: "SELECT 1".to_string(),
        clean_sql: "SELECT 1".to_string(),
        content_hash: "abc123".to_string(),
        referenced_tables: refs.iter().map(ToString::to_string).collect(),
        dependencies: Vec::new(),
        output_columns: Vec::new(),
        contract_mode: ironlayer_core::ContractMode::Disabled,
        contract_columns: Vec::new(),
        tests: Vec::new(),
    }
}

/// Builds the model map keyed by name.
fn models_map(models: Vec<ModelDefinition>) -> BTreeMap<String, ModelDefinition> {
    models
        .into_iter()
        .map(|m| (m.name.as_str().to_string(), m))
        .collect()
}

/// Builds a diff with the given modified and added lists.
fn diff(modified: &[&str], added: &[&str]) -> DiffResult {
    DiffResult {
        added_models: added.iter().map(ToString::to_string).collect(),
        removed_models: Vec::new(),
        modified_models: modified.iter().map(ToString::to_string).collect(),
        cosmetic_changes_skipped: Vec::new(),
    }
}

/// Runs the planner with defaults over the given inputs.
fn plan(
    models: &BTreeMap<String, ModelDefinition>,
    diff: &DiffResult,
    watermarks: &BTreeMap<String, Watermark>,
    run_stats: &BTreeMap<String, RunStats>,
    config: PlannerConfig,
) -> ironlayer_core::Plan {
    let dag = ModelDag::build(models).unwrap();
    generate_plan(PlannerRequest {
        models,
        diff,
        dag: &dag,
        watermarks,
        run_stats,
        base: "snap1",
        target: "snap2",
        as_of_date: Some(as_of()),
        contracts: None,
        config,
    })
    .unwrap()
}

// ============================================================================
// SECTION: Basic Scenarios
// ============================================================================

/// Tests a single modified full-refresh model yields one step.
#[test]
fn test_single_full_refresh_model_changed() {
    let models = models_map(vec![model("A", ModelKind::FullRefresh, &[], None)]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].model, "A");
    assert_eq!(result.steps[0].run_type, RunType::FullRefresh);
    assert_eq!(result.steps[0].reason, "model modified");
}

/// Tests an empty diff produces an empty plan.
#[test]
fn test_no_changes_produces_empty_plan() {
    let models = models_map(vec![model("A", ModelKind::FullRefresh, &[], None)]);
    let result = plan(
        &models,
        &diff(&[], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert!(result.steps.is_empty());
    assert_eq!(result.summary.total_steps, 0);
}

/// Tests a newly added incremental model still full-refreshes.
#[test]
fn test_added_model_gets_full_refresh() {
    let models = models_map(vec![model(
        "new_model",
        ModelKind::IncrementalByTimeRange,
        &[],
        Some("ts"),
    )]);
    let result = plan(
        &models,
        &diff(&[], &["new_model"]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert_eq!(result.steps.len(), 1);
    assert_eq!(result.steps[0].run_type, RunType::FullRefresh);
    assert!(result.steps[0].input_range.is_none());
    assert_eq!(result.steps[0].reason, "new model added");
}

/// Tests the planner rejects a missing as-of date.
#[test]
fn test_missing_as_of_date_is_rejected() {
    let models = models_map(vec![model("A", ModelKind::FullRefresh, &[], None)]);
    let dag = ModelDag::build(&models).unwrap();
    let result = generate_plan(PlannerRequest {
        models: &models,
        diff: &diff(&["A"], &[]),
        dag: &dag,
        watermarks: &BTreeMap::new(),
        run_stats: &BTreeMap::new(),
        base: "snap1",
        target: "snap2",
        as_of_date: None,
        contracts: None,
        config: PlannerConfig::default(),
    });
    assert!(matches!(result, Err(PlannerError::MissingAsOfDate)));
}

// ============================================================================
// SECTION: Downstream Propagation
// ============================================================================

/// Tests transitive downstream models enter the plan.
#[test]
fn test_transitive_downstream_included() {
    let models = models_map(vec![
        model("A", ModelKind::FullRefresh, &[], None),
        model("B", ModelKind::FullRefresh, &["A"], None),
        model("C", ModelKind::FullRefresh, &["B"], None),
    ]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    let names: Vec<&str> = result.steps.iter().map(|s| s.model.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
    assert_eq!(result.steps[1].reason, "upstream dependency changed");
    assert_eq!(result.steps[2].reason, "upstream dependency changed");
}

/// Tests the three-model chain scenario: alphabetical order, parallel groups.
#[test]
fn test_chain_scenario_groups_and_order() {
    let models = models_map(vec![
        model("raw.events", ModelKind::FullRefresh, &[], None),
        model("staging.events_clean", ModelKind::FullRefresh, &["raw.events"], None),
        model(
            "analytics.daily_summary",
            ModelKind::FullRefresh,
            &["staging.events_clean"],
            None,
        ),
    ]);
    let result = plan(
        &models,
        &diff(&["raw.events"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );

    let names: Vec<&str> = result.steps.iter().map(|s| s.model.as_str()).collect();
    assert_eq!(names, vec!["analytics.daily_summary", "raw.events", "staging.events_clean"]);
    assert!(result.steps.iter().all(|s| s.run_type == RunType::FullRefresh));

    let groups: Vec<u32> = result.steps.iter().map(|s| s.parallel_group).collect();
    assert_eq!(groups, vec![2, 0, 1]);
}

/// Tests depends_on lists the upstream step identifiers.
#[test]
fn test_depends_on_links_upstream_steps() {
    let models = models_map(vec![
        model("A", ModelKind::FullRefresh, &[], None),
        model("B", ModelKind::FullRefresh, &["A"], None),
    ]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    let a_step = result.steps.iter().find(|s| s.model == "A").unwrap();
    let b_step = result.steps.iter().find(|s| s.model == "B").unwrap();
    assert!(a_step.depends_on.is_empty());
    assert_eq!(b_step.depends_on, vec![a_step.step_id.clone()]);
}

// ============================================================================
// SECTION: Model Kinds
// ============================================================================

/// Tests an incremental model starts its range at the watermark end.
#[test]
fn test_incremental_with_watermark() {
    let models = models_map(vec![model("m", ModelKind::IncrementalByTimeRange, &[], Some("ts"))]);
    let mut watermarks = BTreeMap::new();
    watermarks.insert(
        "m".to_string(),
        Watermark {
            model_name: ModelName::new("m"),
            partition_start: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            partition_end: NaiveDate::from_ymd_opt(2025, 5, 15).unwrap(),
        },
    );
    let result = plan(
        &models,
        &diff(&["m"], &[]),
        &watermarks,
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    let step = &result.steps[0];
    assert_eq!(step.run_type, RunType::Incremental);
    let range = step.input_range.unwrap();
    assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 5, 15).unwrap());
    assert_eq!(range.end, as_of());
}

/// Tests an incremental model without a watermark uses the lookback window.
#[test]
fn test_incremental_without_watermark_uses_lookback() {
    let models = models_map(vec![model("A", ModelKind::IncrementalByTimeRange, &[], Some("ts"))]);
    let config = PlannerConfig { default_lookback_days: 7, ..PlannerConfig::default() };
    let result = plan(&models, &diff(&["A"], &[]), &BTreeMap::new(), &BTreeMap::new(), config);
    let range = result.steps[0].input_range.unwrap();
    assert_eq!(range.start, NaiveDate::from_ymd_opt(2025, 5, 25).unwrap());
    assert_eq!(range.end, as_of());
}

/// Tests merge-by-key models full-refresh with no input range.
#[test]
fn test_merge_by_key_gets_full_refresh() {
    let mut m = model("A", ModelKind::MergeByKey, &[], None);
    m.unique_key = Some("id".to_string());
    let models = models_map(vec![m]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert_eq!(result.steps[0].run_type, RunType::FullRefresh);
    assert!(result.steps[0].input_range.is_none());
}

/// Tests append-only models run incrementally.
#[test]
fn test_append_only_gets_incremental() {
    let models = models_map(vec![model("A", ModelKind::AppendOnly, &[], None)]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert_eq!(result.steps[0].run_type, RunType::Incremental);
}

/// Tests an incremental model lacking a time column degrades to full refresh.
#[test]
fn test_incremental_without_time_column_full_refreshes() {
    let models = models_map(vec![model("A", ModelKind::IncrementalByTimeRange, &[], None)]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert_eq!(result.steps[0].run_type, RunType::FullRefresh);
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

/// Tests steps are sorted alphabetically regardless of input order.
#[test]
fn test_steps_sorted_alphabetically() {
    let models = models_map(vec![
        model("Z_model", ModelKind::FullRefresh, &[], None),
        model("A_model", ModelKind::FullRefresh, &[], None),
        model("M_model", ModelKind::FullRefresh, &[], None),
    ]);
    let result = plan(
        &models,
        &diff(&["Z_model", "A_model", "M_model"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    let names: Vec<&str> = result.steps.iter().map(|s| s.model.as_str()).collect();
    assert_eq!(names, vec!["A_model", "M_model", "Z_model"]);
}

// ============================================================================
// SECTION: Cost Estimation
// ============================================================================

/// Tests run statistics drive the cost estimate when present.
#[test]
fn test_uses_run_stats_when_available() {
    let models = models_map(vec![model("A", ModelKind::FullRefresh, &[], None)]);
    let mut run_stats = BTreeMap::new();
    run_stats.insert("A".to_string(), RunStats { avg_runtime_seconds: 120.0, run_count: 10 });
    let config = PlannerConfig { cost_per_compute_second: 0.001, ..PlannerConfig::default() };
    let result = plan(&models, &diff(&["A"], &[]), &BTreeMap::new(), &run_stats, config);
    let step = &result.steps[0];
    assert!((step.estimated_compute_seconds - 120.0).abs() < 1e-9);
    assert!((step.estimated_cost_usd - 0.12).abs() < 1e-9);
}

/// Tests the default 300-second estimate applies without history.
#[test]
fn test_default_estimate_when_no_stats() {
    let models = models_map(vec![model("A", ModelKind::FullRefresh, &[], None)]);
    let result = plan(
        &models,
        &diff(&["A"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    let step = &result.steps[0];
    assert!((step.estimated_compute_seconds - 300.0).abs() < 1e-9);
    assert!((step.estimated_cost_usd - 300.0 * 0.0007).abs() < 1e-9);
}

/// Tests the summary cost is the sum of step costs.
#[test]
fn test_summary_cost_is_step_sum() {
    let models = models_map(vec![
        model("A", ModelKind::FullRefresh, &[], None),
        model("B", ModelKind::FullRefresh, &[], None),
    ]);
    let result = plan(
        &models,
        &diff(&["A", "B"], &[]),
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    let total: f64 = result.steps.iter().map(|s| s.estimated_cost_usd).sum();
    assert!((result.summary.estimated_cost_usd - total).abs() < 1e-9);
}

// ============================================================================
// SECTION: Summary
// ============================================================================

/// Tests removed models reach the summary but produce no steps.
#[test]
fn test_removed_models_recorded_without_steps() {
    let models = models_map(vec![model("A", ModelKind::FullRefresh, &[], None)]);
    let diff = DiffResult {
        added_models: Vec::new(),
        removed_models: vec!["gone_model".to_string()],
        modified_models: vec!["A".to_string()],
        cosmetic_changes_skipped: Vec::new(),
    };
    let result = plan(
        &models,
        &diff,
        &BTreeMap::new(),
        &BTreeMap::new(),
        PlannerConfig::default(),
    );
    assert_eq!(result.summary.removed_models, vec!["gone_model".to_string()]);
    assert_eq!(result.steps.len(), 1);
}
