// ironlayer-core/tests/contracts.rs
// ============================================================================
// Module: Contract Validator Tests
// Description: Tests for schema contract validation.
// ============================================================================
//! ## Overview
//! Validates violation detection, severities, deterministic ordering, and
//! the WARN-mode downgrade.

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

use ironlayer_core::ColumnContract;
use ironlayer_core::ContractMode;
use ironlayer_core::Materialization;
use ironlayer_core::ModelDefinition;
use ironlayer_core::ModelKind;
use ironlayer_core::ModelName;
use ironlayer_core::ViolationKind;
use ironlayer_core::ViolationSeverity;
use ironlayer_core::normalize_data_type;
use ironlayer_core::validate_contract;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a model with a contract and recorded output columns.
fn contracted_model(
    mode: ContractMode,
    contract: &[(&str, &str, bool)],
    output: &[&str],
) -> ModelDefinition {
    ModelDefinition {
        name: ModelName::new("orders"),
        kind: ModelKind::FullRefresh,
        materialization: Materialization::Table,
        time_column: None,
        unique_key: None,
        owner: None,
        tags: Vec::new(),
        file_path: "models/orders.sql".to_string(),
        raw_sql: "SELECT 1".to_string(),
        clean_sql: "SELECT 1".to_string(),
        content_hash: "abc".to_string(),
        referenced_tables: Vec::new(),
        dependencies: Vec::new(),
        output_columns: output.iter().map(ToString::to_string).collect(),
        contract_mode: mode,
        contract_columns: contract
            .iter()
            .map(|(name, data_type, nullable)| ColumnContract {
                name: (*name).to_string(),
                data_type: (*data_type).to_string(),
                nullable: *nullable,
            })
            .collect(),
        tests: Vec::new(),
    }
}

// ============================================================================
// SECTION: Violation Detection
// ============================================================================

/// Tests a disabled contract is never checked.
#[test]
fn test_disabled_contract_skipped() {
    let model = contracted_model(ContractMode::Disabled, &[("id", "INT", false)], &["other"]);
    let result = validate_contract(&model, None, None, None);
    assert!(result.violations.is_empty());
    assert_eq!(result.models_checked, 0);
}

/// Tests a missing contracted column is a breaking removal and an extra
/// column is informational.
#[test]
fn test_removed_and_added_columns() {
    let model = contracted_model(
        ContractMode::Strict,
        &[("id", "INT", false), ("name", "STRING", true)],
        &["id", "amount"],
    );
    let result = validate_contract(&model, None, None, None);

    assert_eq!(result.violations.len(), 2);
    let added = &result.violations[0];
    assert_eq!(added.column_name, "amount");
    assert_eq!(added.violation_type, ViolationKind::ColumnAdded);
    assert_eq!(added.severity, ViolationSeverity::Info);

    let removed = &result.violations[1];
    assert_eq!(removed.column_name, "name");
    assert_eq!(removed.violation_type, ViolationKind::ColumnRemoved);
    assert_eq!(removed.severity, ViolationSeverity::Breaking);

    assert!(result.has_breaking());
    assert_eq!(result.breaking_count(), 1);
}

/// Tests a normalized type mismatch is breaking.
#[test]
fn test_type_changed_breaking() {
    let model = contracted_model(ContractMode::Strict, &[("id", "INT", true)], &["id"]);
    let mut types = BTreeMap::new();
    types.insert("id".to_string(), "STRING".to_string());
    let result = validate_contract(&model, None, Some(&types), None);
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].violation_type, ViolationKind::TypeChanged);
    assert_eq!(result.violations[0].severity, ViolationSeverity::Breaking);
}

/// Tests aliased types compare as equal after normalization.
#[test]
fn test_type_aliases_compare_equal() {
    let model = contracted_model(ContractMode::Strict, &[("id", "INTEGER", true)], &["id"]);
    let mut types = BTreeMap::new();
    types.insert("id".to_string(), "int".to_string());
    let result = validate_contract(&model, None, Some(&types), None);
    assert!(result.violations.is_empty());
}

/// Tests a NOT NULL contract over a nullable output is breaking.
#[test]
fn test_nullable_tightened_breaking() {
    let model = contracted_model(ContractMode::Strict, &[("id", "INT", false)], &["id"]);
    let mut nullability = BTreeMap::new();
    nullability.insert("id".to_string(), true);
    let result = validate_contract(&model, None, None, Some(&nullability));
    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].violation_type, ViolationKind::NullableTightened);
}

/// Tests a nullable contract over a NOT NULL output passes.
#[test]
fn test_loosening_is_not_a_violation() {
    let model = contracted_model(ContractMode::Strict, &[("id", "INT", true)], &["id"]);
    let mut nullability = BTreeMap::new();
    nullability.insert("id".to_string(), false);
    let result = validate_contract(&model, None, None, Some(&nullability));
    assert!(result.violations.is_empty());
}

/// Tests column matching is case-insensitive.
#[test]
fn test_case_insensitive_column_match() {
    let model = contracted_model(ContractMode::Strict, &[("ID", "INT", true)], &["id"]);
    let result = validate_contract(&model, None, None, None);
    assert!(result.violations.is_empty());
}

/// Tests explicit actual columns override the recorded output columns.
#[test]
fn test_actual_columns_override() {
    let model = contracted_model(ContractMode::Strict, &[("id", "INT", true)], &["id"]);
    let actual = vec!["wrong".to_string()];
    let result = validate_contract(&model, Some(&actual), None, None);
    assert!(result
        .violations
        .iter()
        .any(|v| v.violation_type == ViolationKind::ColumnRemoved));
}

// ============================================================================
// SECTION: Ordering and Modes
// ============================================================================

/// Tests violations sort by (model, column, kind).
#[test]
fn test_violations_sorted_deterministically() {
    let model = contracted_model(
        ContractMode::Strict,
        &[("zeta", "INT", false), ("alpha", "INT", false)],
        &["extra_b", "extra_a"],
    );
    let result = validate_contract(&model, None, None, None);
    let columns: Vec<&str> = result
        .violations
        .iter()
        .map(|v| v.column_name.as_str())
        .collect();
    assert_eq!(columns, vec!["alpha", "extra_a", "extra_b", "zeta"]);
}

/// Tests WARN mode downgrades breaking violations to warnings.
#[test]
fn test_warn_mode_downgrades_severity() {
    let model = contracted_model(ContractMode::Warn, &[("gone", "INT", false)], &["id"]);
    let result = validate_contract(&model, None, None, None);
    assert!(!result.has_breaking());
    assert!(result
        .violations
        .iter()
        .any(|v| v.severity == ViolationSeverity::Warning));
}

/// Tests an empty contract checks the model without violations.
#[test]
fn test_empty_contract_counts_model() {
    let model = contracted_model(ContractMode::Strict, &[], &["id"]);
    let result = validate_contract(&model, None, None, None);
    assert!(result.violations.is_empty());
    assert_eq!(result.models_checked, 1);
}

// ============================================================================
// SECTION: Type Normalization
// ============================================================================

/// Tests the canonical alias table.
#[test]
fn test_normalize_data_type_aliases() {
    assert_eq!(normalize_data_type("integer"), "INT");
    assert_eq!(normalize_data_type(" VARCHAR "), "STRING");
    assert_eq!(normalize_data_type("bool"), "BOOLEAN");
    assert_eq!(normalize_data_type("NUMERIC"), "DECIMAL");
    assert_eq!(normalize_data_type("datetime"), "TIMESTAMP");
    assert_eq!(normalize_data_type("double precision"), "DOUBLE");
    assert_eq!(normalize_data_type("CUSTOM_TYPE"), "CUSTOM_TYPE");
}
