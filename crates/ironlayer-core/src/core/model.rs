// ironlayer-core/src/core/model.rs
// ============================================================================
// Module: Model Definitions
// Description: Canonical model records parsed from SQL files with headers.
// Purpose: Describe a model's kind, contract, tests, and content identity.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`ModelDefinition`] is the atomic unit of the dependency graph: a named
//! SQL artifact with a declared kind, optional schema contract, and declared
//! tests. The `content_hash` field is the basis for structural diffing
//! between git revisions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ModelName;

// ============================================================================
// SECTION: Model Kind
// ============================================================================

/// How a model is recomputed when its inputs change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModelKind {
    /// Rebuild the full output on every run.
    FullRefresh,
    /// Process only the date window that changed; requires `time_column`.
    IncrementalByTimeRange,
    /// Merge rows on a unique key; requires `unique_key`.
    MergeByKey,
    /// Append new rows without rewriting history.
    AppendOnly,
}

/// How a model's output is materialized in the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Materialization {
    /// Plain table.
    Table,
    /// View over the model SQL.
    View,
    /// Partition-overwriting insert.
    InsertOverwrite,
    /// Keyed merge.
    Merge,
}

// ============================================================================
// SECTION: Schema Contracts
// ============================================================================

/// Enforcement mode for a model's schema contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractMode {
    /// Contract is ignored.
    #[default]
    Disabled,
    /// Violations are reported with downgraded severity.
    Warn,
    /// Breaking violations block plan apply.
    Strict,
}

/// One declared column in a schema contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnContract {
    /// Column name.
    pub name: String,
    /// Normalized data type, e.g. `BIGINT`.
    pub data_type: String,
    /// Whether the column may contain NULLs.
    pub nullable: bool,
}

// ============================================================================
// SECTION: Model Tests
// ============================================================================

/// Declarative assertion types supported by the check engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestType {
    /// Column must contain no NULLs.
    NotNull,
    /// Column values must be unique.
    Unique,
    /// Column values must be drawn from a fixed set.
    AcceptedValues,
    /// Table must contain at least a threshold of rows.
    RowCountMin,
}

/// Whether a failing test vetoes plan apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestSeverity {
    /// Failure blocks apply.
    #[default]
    Block,
    /// Failure is reported but does not block.
    Warn,
}

/// One declared test on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTest {
    /// Assertion type.
    pub test_type: TestType,
    /// Target column, when the test type takes one.
    #[serde(default)]
    pub column: Option<String>,
    /// Accepted literal values for [`TestType::AcceptedValues`].
    #[serde(default)]
    pub values: Vec<String>,
    /// Minimum row count for [`TestType::RowCountMin`].
    #[serde(default)]
    pub threshold: Option<u64>,
    /// Whether a failure vetoes apply.
    #[serde(default)]
    pub severity: TestSeverity,
}

// ============================================================================
// SECTION: Model Definition
// ============================================================================

/// Canonical model record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Dotted model name, unique within a tenant.
    pub name: ModelName,
    /// Recompute strategy.
    pub kind: ModelKind,
    /// Warehouse materialization.
    pub materialization: Materialization,
    /// Partitioning column; required for incremental-by-time-range models.
    #[serde(default)]
    pub time_column: Option<String>,
    /// Merge key; required for merge-by-key models.
    #[serde(default)]
    pub unique_key: Option<String>,
    /// Declared owner.
    #[serde(default)]
    pub owner: Option<String>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source file path relative to the models root.
    pub file_path: String,
    /// SQL body as read from disk.
    pub raw_sql: String,
    /// Normalized SQL when the parser succeeded, else the raw body.
    pub clean_sql: String,
    /// SHA-256 of the body SQL; the diffing identity.
    pub content_hash: String,
    /// Tables referenced by the SQL body.
    #[serde(default)]
    pub referenced_tables: Vec<String>,
    /// Explicitly declared upstream dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Output columns produced by the SELECT.
    #[serde(default)]
    pub output_columns: Vec<String>,
    /// Contract enforcement mode.
    #[serde(default)]
    pub contract_mode: ContractMode,
    /// Declared contract columns, in header order.
    #[serde(default)]
    pub contract_columns: Vec<ColumnContract>,
    /// Declared tests, in header order.
    #[serde(default)]
    pub tests: Vec<ModelTest>,
}

impl ModelDefinition {
    /// Returns every upstream name this model refers to, declared or parsed.
    #[must_use]
    pub fn upstream_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .referenced_tables
            .iter()
            .chain(self.dependencies.iter())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}
