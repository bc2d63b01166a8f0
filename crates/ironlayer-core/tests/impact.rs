// ironlayer-core/tests/impact.rs
// ============================================================================
// Module: Impact Simulator Tests
// Description: Tests for what-if analysis over the DAG.
// ============================================================================
//! ## Overview
//! Validates type compatibility, cascading column impact, diamond
//! deduplication, contract coverage, and model removal.

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

use ironlayer_core::ChangeDescriptor;
use ironlayer_core::ColumnContract;
use ironlayer_core::ContractMode;
use ironlayer_core::Materialization;
use ironlayer_core::ModelDag;
use ironlayer_core::ModelDefinition;
use ironlayer_core::ModelKind;
use ironlayer_core::ModelName;
use ironlayer_core::ReferenceSeverity;
use ironlayer_core::is_type_change_safe;
use ironlayer_core::simulate_change;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a model whose SQL selects the given columns from its references.
fn model(name: &str, refs: &[&str], columns: &[&str]) -> ModelDefinition {
    let projection = if columns.is_empty() { "1".to_string() } else { columns.join(", ") };
    let from = refs.first().copied().unwrap_or("dual");
    ModelDefinition {
        name: ModelName::new(name),
        kind: ModelKind::FullRefresh,
        materialization: Materialization::Table,
        time_column: None,
        unique_key: None,
        owner: None,
        tags: Vec::new(),
        file_path: format!("models/{name}.sql"),
        raw_sql: format!("SELECT {projection} FROM {from}"),
        clean_sql: format!("SELECT {projection} FROM {from}"),
        content_hash: "abc".to_string(),
        referenced_tables: refs.iter().map(ToString::to_string).collect(),
        dependencies: Vec::new(),
        output_columns: columns.iter().map(ToString::to_string).collect(),
        contract_mode: ContractMode::Disabled,
        contract_columns: Vec::new(),
        tests: Vec::new(),
    }
}

/// Builds a model map and its DAG.
fn setup(models: Vec<ModelDefinition>) -> (BTreeMap<String, ModelDefinition>, ModelDag) {
    let map: BTreeMap<String, ModelDefinition> = models
        .into_iter()
        .map(|m| (m.name.as_str().to_string(), m))
        .collect();
    let dag = ModelDag::build(&map).unwrap();
    (map, dag)
}

// ============================================================================
// SECTION: Type Compatibility
// ============================================================================

/// Tests identical types are safe.
#[test]
fn test_same_type_safe() {
    assert!(is_type_change_safe("INT", "INT"));
    assert!(is_type_change_safe("int", "INTEGER"));
}

/// Tests widening conversions are safe.
#[test]
fn test_widening_safe() {
    assert!(is_type_change_safe("INT", "BIGINT"));
    assert!(is_type_change_safe("DATE", "TIMESTAMP"));
    assert!(is_type_change_safe("FLOAT", "DOUBLE"));
}

/// Tests narrowing conversions are breaking.
#[test]
fn test_narrowing_breaking() {
    assert!(!is_type_change_safe("BIGINT", "INT"));
    assert!(!is_type_change_safe("TIMESTAMP", "DATE"));
}

/// Tests cross-family conversions are breaking.
#[test]
fn test_incompatible_breaking() {
    assert!(!is_type_change_safe("STRING", "INT"));
    assert!(!is_type_change_safe("INT", "STRING"));
}

/// Tests unknown pairs default to breaking.
#[test]
fn test_unknown_pair_defaults_breaking() {
    assert!(!is_type_change_safe("GEOMETRY", "BLOB"));
}

// ============================================================================
// SECTION: Column Changes
// ============================================================================

/// Tests removing a referenced column cascades breaking impact.
#[test]
fn test_column_removal_cascading() {
    let (models, dag) = setup(vec![
        model("a", &[], &["user_id", "amount"]),
        model("b", &["a"], &["user_id"]),
        model("c", &["b"], &["user_id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveColumn { model: "a".to_string(), column: "user_id".to_string() },
    );
    let names: Vec<&str> = report.affected.iter().map(|a| a.model.as_str()).collect();
    assert_eq!(names, vec!["b", "c"]);
    assert!(report
        .affected
        .iter()
        .all(|a| a.severity == ReferenceSeverity::Breaking));
}

/// Tests an unreferenced column has no downstream impact.
#[test]
fn test_column_not_referenced_no_impact() {
    let (models, dag) = setup(vec![
        model("a", &[], &["user_id", "internal_flag"]),
        model("b", &["a"], &["user_id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveColumn {
            model: "a".to_string(),
            column: "internal_flag".to_string(),
        },
    );
    assert!(report.affected.is_empty());
}

/// Tests renaming a referenced column is breaking.
#[test]
fn test_rename_breaking() {
    let (models, dag) = setup(vec![
        model("a", &[], &["user_id"]),
        model("b", &["a"], &["user_id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RenameColumn {
            model: "a".to_string(),
            old_column: "user_id".to_string(),
            new_column: "uid".to_string(),
        },
    );
    assert_eq!(report.affected.len(), 1);
    assert_eq!(report.affected[0].severity, ReferenceSeverity::Breaking);
}

/// Tests a safe type change is at most a warning.
#[test]
fn test_safe_type_change_warning() {
    let (models, dag) = setup(vec![
        model("a", &[], &["amount"]),
        model("b", &["a"], &["amount"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::TypeChange {
            model: "a".to_string(),
            column: "amount".to_string(),
            old_type: "INT".to_string(),
            new_type: "BIGINT".to_string(),
        },
    );
    assert!(report
        .affected
        .iter()
        .all(|a| a.severity != ReferenceSeverity::Breaking));
}

/// Tests a breaking type change is marked breaking.
#[test]
fn test_breaking_type_change() {
    let (models, dag) = setup(vec![
        model("a", &[], &["amount"]),
        model("b", &["a"], &["amount"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::TypeChange {
            model: "a".to_string(),
            column: "amount".to_string(),
            old_type: "BIGINT".to_string(),
            new_type: "INT".to_string(),
        },
    );
    assert_eq!(report.affected[0].severity, ReferenceSeverity::Breaking);
}

/// Tests an unknown source model reports not found.
#[test]
fn test_model_not_found() {
    let (models, dag) = setup(vec![model("a", &[], &["id"])]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveColumn { model: "ghost".to_string(), column: "id".to_string() },
    );
    assert!(!report.model_found);
    assert!(report.affected.is_empty());
}

// ============================================================================
// SECTION: Diamond Deduplication
// ============================================================================

/// Tests the diamond pattern yields the sink exactly once.
#[test]
fn test_diamond_deduplication() {
    let (models, dag) = setup(vec![
        model("a", &[], &["k"]),
        model("b", &["a"], &["k"]),
        model("c", &["a"], &["k"]),
        model("d", &["b", "c"], &["k"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveColumn { model: "a".to_string(), column: "k".to_string() },
    );
    let d_count = report.affected.iter().filter(|a| a.model == "d").count();
    assert_eq!(d_count, 1);
}

// ============================================================================
// SECTION: Contract Coverage
// ============================================================================

/// Tests a contracted affected column flags a contract violation.
#[test]
fn test_contract_violation_flagged() {
    let mut downstream = model("b", &["a"], &["user_id"]);
    downstream.contract_mode = ContractMode::Strict;
    downstream.contract_columns = vec![ColumnContract {
        name: "user_id".to_string(),
        data_type: "INT".to_string(),
        nullable: false,
    }];
    let (models, dag) = setup(vec![model("a", &[], &["user_id"]), downstream]);

    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveColumn { model: "a".to_string(), column: "user_id".to_string() },
    );
    assert!(report.affected[0].contract_violation);
}

/// Tests disabled contracts never flag violations.
#[test]
fn test_disabled_contract_not_flagged() {
    let (models, dag) = setup(vec![
        model("a", &[], &["user_id"]),
        model("b", &["a"], &["user_id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveColumn { model: "a".to_string(), column: "user_id".to_string() },
    );
    assert!(!report.affected[0].contract_violation);
}

// ============================================================================
// SECTION: Model Removal
// ============================================================================

/// Tests removing a model breaks every downstream dependent.
#[test]
fn test_model_removal_breaks_downstream() {
    let (models, dag) = setup(vec![
        model("a", &[], &["id"]),
        model("b", &["a"], &["id"]),
        model("c", &["b"], &["id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveModel { model: "a".to_string() },
    );
    assert_eq!(report.affected.len(), 2);
    assert!(report
        .affected
        .iter()
        .all(|a| a.severity == ReferenceSeverity::Breaking));
}

/// Tests a sole-upstream dependent is reported orphaned.
#[test]
fn test_orphan_detection() {
    let (models, dag) = setup(vec![
        model("a", &[], &["id"]),
        model("b", &["a"], &["id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveModel { model: "a".to_string() },
    );
    assert_eq!(report.orphaned, vec!["b".to_string()]);
}

/// Tests a dependent with another upstream is not orphaned.
#[test]
fn test_multi_upstream_not_orphaned() {
    let (models, dag) = setup(vec![
        model("a", &[], &["id"]),
        model("x", &[], &["id"]),
        model("b", &["a", "x"], &["id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveModel { model: "a".to_string() },
    );
    assert!(report.orphaned.is_empty());
}

/// Tests removing a leaf model affects nothing.
#[test]
fn test_leaf_removal_no_impact() {
    let (models, dag) = setup(vec![
        model("a", &[], &["id"]),
        model("b", &["a"], &["id"]),
    ]);
    let report = simulate_change(
        &models,
        &dag,
        &ChangeDescriptor::RemoveModel { model: "b".to_string() },
    );
    assert!(report.affected.is_empty());
    assert!(report.orphaned.is_empty());
}
