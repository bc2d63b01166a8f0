// ironlayer-core/tests/lineage.rs
// ============================================================================
// Module: Column Lineage Tests
// Description: Tests for per-column source tracing.
// ============================================================================
//! ## Overview
//! Validates transform classification, alias resolution, CTE pass-through,
//! wildcard expansion, and cross-model tracing.

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

use ironlayer_core::ContractMode;
use ironlayer_core::Materialization;
use ironlayer_core::ModelDefinition;
use ironlayer_core::ModelKind;
use ironlayer_core::ModelName;
use ironlayer_core::SchemaMap;
use ironlayer_core::TransformKind;
use ironlayer_core::analyze_lineage;
use ironlayer_core::trace_column;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a schema map for one table.
fn schema_for(table: &str, columns: &[&str]) -> SchemaMap {
    let mut map = SchemaMap::new();
    let cols: BTreeMap<String, String> = columns
        .iter()
        .map(|c| ((*c).to_string(), "STRING".to_string()))
        .collect();
    map.insert(table.to_string(), cols);
    map
}

// ============================================================================
// SECTION: Direct Columns
// ============================================================================

/// Tests a plain column reference is direct lineage.
#[test]
fn test_simple_select_direct() {
    let result = analyze_lineage("SELECT id, name FROM users", None).unwrap();
    let nodes = &result.column_lineage["id"];
    assert_eq!(nodes[0].transform_type, TransformKind::Direct);
    assert_eq!(nodes[0].source_table.as_deref(), Some("users"));
    assert_eq!(nodes[0].source_column.as_deref(), Some("id"));
}

/// Tests an aliased column keeps its source column.
#[test]
fn test_aliased_column() {
    let result = analyze_lineage("SELECT user_id AS id FROM users", None).unwrap();
    let nodes = &result.column_lineage["id"];
    assert_eq!(nodes[0].source_column.as_deref(), Some("user_id"));
    assert_eq!(nodes[0].transform_type, TransformKind::Direct);
}

/// Tests a table alias resolves to the full table name.
#[test]
fn test_table_alias_resolution() {
    let result = analyze_lineage("SELECT u.id FROM analytics.users u", None).unwrap();
    let nodes = &result.column_lineage["id"];
    assert_eq!(nodes[0].source_table.as_deref(), Some("analytics.users"));
}

// ============================================================================
// SECTION: Transforms
// ============================================================================

/// Tests arithmetic classifies as expression.
#[test]
fn test_arithmetic_expression() {
    let result = analyze_lineage("SELECT amount * 2 AS doubled FROM orders", None).unwrap();
    assert_eq!(
        result.column_lineage["doubled"][0].transform_type,
        TransformKind::Expression
    );
}

/// Tests SUM classifies as aggregation.
#[test]
fn test_sum_aggregation() {
    let result =
        analyze_lineage("SELECT SUM(amount) AS total FROM orders GROUP BY region", None).unwrap();
    assert_eq!(
        result.column_lineage["total"][0].transform_type,
        TransformKind::Aggregation
    );
}

/// Tests COUNT classifies as aggregation.
#[test]
fn test_count_aggregation() {
    let result = analyze_lineage("SELECT COUNT(id) AS n FROM orders", None).unwrap();
    assert_eq!(result.column_lineage["n"][0].transform_type, TransformKind::Aggregation);
}

/// Tests a window function classifies as window.
#[test]
fn test_window_function() {
    let sql = "SELECT ROW_NUMBER() OVER (PARTITION BY region ORDER BY amount) AS rn FROM orders";
    let result = analyze_lineage(sql, None).unwrap();
    assert_eq!(result.column_lineage["rn"][0].transform_type, TransformKind::Window);
}

/// Tests CASE classifies as case.
#[test]
fn test_case_expression() {
    let sql = "SELECT CASE WHEN amount > 0 THEN 'pos' ELSE 'neg' END AS sign FROM orders";
    let result = analyze_lineage(sql, None).unwrap();
    assert_eq!(result.column_lineage["sign"][0].transform_type, TransformKind::Case);
}

/// Tests a literal classifies as literal with no source.
#[test]
fn test_literal_classification() {
    let result = analyze_lineage("SELECT 'fixed' AS label, id FROM users", None).unwrap();
    let node = &result.column_lineage["label"][0];
    assert_eq!(node.transform_type, TransformKind::Literal);
    assert!(node.source_column.is_none());
}

// ============================================================================
// SECTION: CTE Pass-Through
// ============================================================================

/// Tests a direct CTE pass-through resolves the underlying table.
#[test]
fn test_simple_cte_pass_through() {
    let sql = "WITH base AS (SELECT id FROM raw.users) SELECT id FROM base";
    let result = analyze_lineage(sql, None).unwrap();
    let node = &result.column_lineage["id"][0];
    assert_eq!(node.source_table.as_deref(), Some("raw.users"));
    assert_eq!(node.transform_type, TransformKind::Direct);
}

/// Tests an aggregating CTE surfaces the deeper transform.
#[test]
fn test_cte_aggregation_surfaces() {
    let sql = "WITH totals AS (SELECT SUM(amount) AS total FROM orders) SELECT total FROM totals";
    let result = analyze_lineage(sql, None).unwrap();
    assert_eq!(
        result.column_lineage["total"][0].transform_type,
        TransformKind::Aggregation
    );
}

// ============================================================================
// SECTION: Wildcard Expansion
// ============================================================================

/// Tests `SELECT *` without a schema records the wildcard unresolved.
#[test]
fn test_star_without_schema_unresolved() {
    let result = analyze_lineage("SELECT * FROM mystery_table", None).unwrap();
    assert!(result.unresolved_columns.contains(&"*".to_string()));
}

/// Tests `SELECT *` with a schema expands to explicit columns.
#[test]
fn test_star_with_schema_expands() {
    let schemas = schema_for("users", &["id", "email"]);
    let result = analyze_lineage("SELECT * FROM users", Some(&schemas)).unwrap();
    assert!(result.column_lineage.contains_key("id"));
    assert!(result.column_lineage.contains_key("email"));
    assert!(!result.unresolved_columns.contains(&"*".to_string()));
}

// ============================================================================
// SECTION: Error Handling
// ============================================================================

/// Tests invalid SQL fails lineage analysis.
#[test]
fn test_invalid_sql_fails() {
    assert!(analyze_lineage("NOT SQL @@@", None).is_err());
}

// ============================================================================
// SECTION: Cross-Model Tracing
// ============================================================================

/// Builds a model with explicit SQL.
fn model(name: &str, sql: &str, refs: &[&str]) -> ModelDefinition {
    ModelDefinition {
        name: ModelName::new(name),
        kind: ModelKind::FullRefresh,
        materialization: Materialization::Table,
        time_column: None,
        unique_key: None,
        owner: None,
        tags: Vec::new(),
        file_path: format!("models/{name}.sql"),
        raw_sql: sql.to_string(),
        clean_sql: sql.to_string(),
        content_hash: "abc".to_string(),
        referenced_tables: refs.iter().map(ToString::to_string).collect(),
        dependencies: Vec::new(),
        output_columns: Vec::new(),
        contract_mode: ContractMode::Disabled,
        contract_columns: Vec::new(),
        tests: Vec::new(),
    }
}

/// Tests tracing follows direct sources through upstream models.
#[test]
fn test_trace_through_models() {
    let mut models = BTreeMap::new();
    models.insert(
        "staging.users".to_string(),
        model("staging.users", "SELECT id FROM raw_users", &["raw_users"]),
    );
    models.insert(
        "analytics.users".to_string(),
        model("analytics.users", "SELECT id FROM staging.users", &["staging.users"]),
    );

    let hops = trace_column(&models, "analytics.users", "id", None).unwrap();
    assert_eq!(hops.len(), 2);
    assert_eq!(hops[0].model, "analytics.users");
    assert_eq!(hops[0].source_table.as_deref(), Some("staging.users"));
    assert_eq!(hops[1].model, "staging.users");
    assert_eq!(hops[1].source_table.as_deref(), Some("raw_users"));
}

/// Tests tracing stops at a non-direct transform.
#[test]
fn test_trace_stops_at_aggregation() {
    let mut models = BTreeMap::new();
    models.insert(
        "staging.totals".to_string(),
        model(
            "staging.totals",
            "SELECT SUM(amount) AS amount FROM raw_orders",
            &["raw_orders"],
        ),
    );
    models.insert(
        "analytics.totals".to_string(),
        model(
            "analytics.totals",
            "SELECT amount FROM staging.totals",
            &["staging.totals"],
        ),
    );

    let hops = trace_column(&models, "analytics.totals", "amount", None).unwrap();
    assert_eq!(hops.len(), 2);
    assert_eq!(hops[1].transform_type, TransformKind::Aggregation);
}
