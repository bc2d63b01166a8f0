// ironlayer-core/src/impact/mod.rs
// ============================================================================
// Module: Impact Simulator
// Description: What-if analysis for column and model changes over the DAG.
// Purpose: Predict downstream breakage before a change is made.
// Dependencies: serde, crate::{contracts, core, graph}
// ============================================================================

//! ## Overview
//! The impact simulator walks the DAG downstream from a proposed change and
//! reports, per descendant, the affected columns, a severity drawn from a
//! type-compatibility table, and whether the descendant's schema contract
//! covers an affected column. Each descendant appears exactly once even
//! when reachable through multiple paths (diamond dedup).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::contracts::normalize_data_type;
use crate::core::ContractMode;
use crate::core::ModelDefinition;
use crate::graph::ModelDag;

// ============================================================================
// SECTION: Change Descriptor
// ============================================================================

/// A proposed change to simulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeDescriptor {
    /// Remove a column from a model.
    RemoveColumn {
        /// Model being changed.
        model: String,
        /// Column being removed.
        column: String,
    },
    /// Add a column to a model.
    AddColumn {
        /// Model being changed.
        model: String,
        /// Column being added.
        column: String,
    },
    /// Rename a column on a model.
    RenameColumn {
        /// Model being changed.
        model: String,
        /// Current column name.
        old_column: String,
        /// New column name.
        new_column: String,
    },
    /// Change a column's data type.
    TypeChange {
        /// Model being changed.
        model: String,
        /// Column whose type changes.
        column: String,
        /// Current type.
        old_type: String,
        /// Proposed type.
        new_type: String,
    },
    /// Remove a whole model.
    RemoveModel {
        /// Model being removed.
        model: String,
    },
}

impl ChangeDescriptor {
    /// Returns the model the change originates on.
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::RemoveColumn { model, .. }
            | Self::AddColumn { model, .. }
            | Self::RenameColumn { model, .. }
            | Self::TypeChange { model, .. }
            | Self::RemoveModel { model } => model,
        }
    }
}

// ============================================================================
// SECTION: Report Types
// ============================================================================

/// Severity of a downstream reference to the changed source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceSeverity {
    /// The change will break the descendant.
    Breaking,
    /// The change is compatible but worth review.
    Warning,
    /// Informational; no action expected.
    Info,
}

/// One descendant affected by the simulated change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AffectedModel {
    /// Descendant model name.
    pub model: String,
    /// Descendant columns that reference the changed source.
    pub columns_affected: Vec<String>,
    /// Predicted severity for this descendant.
    pub severity: ReferenceSeverity,
    /// Whether the descendant's active contract covers an affected column.
    pub contract_violation: bool,
}

/// Result of simulating one change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactReport {
    /// Model the change originates on.
    pub model_name: String,
    /// Human-readable change description.
    pub change: String,
    /// Whether the changed model exists in the model set.
    pub model_found: bool,
    /// Affected descendants, sorted by name, each exactly once.
    pub affected: Vec<AffectedModel>,
    /// Models left with no remaining upstream after a model removal.
    pub orphaned: Vec<String>,
}

// ============================================================================
// SECTION: Type Compatibility
// ============================================================================

/// Widening conversions that do not break downstream consumers.
const SAFE_WIDENINGS: &[(&str, &str)] = &[
    ("SMALLINT", "INT"),
    ("SMALLINT", "BIGINT"),
    ("INT", "BIGINT"),
    ("INT", "FLOAT"),
    ("INT", "DOUBLE"),
    ("INT", "DECIMAL"),
    ("BIGINT", "DECIMAL"),
    ("FLOAT", "DOUBLE"),
    ("DATE", "TIMESTAMP"),
];

/// Returns true when changing `old_type` to `new_type` is non-breaking.
///
/// Identical normalized types are safe, listed widenings are safe, and
/// every unknown pair defaults to breaking.
#[must_use]
pub fn is_type_change_safe(old_type: &str, new_type: &str) -> bool {
    let old_norm = normalize_data_type(old_type);
    let new_norm = normalize_data_type(new_type);
    if old_norm == new_norm {
        return true;
    }
    SAFE_WIDENINGS
        .iter()
        .any(|(from, to)| *from == old_norm && *to == new_norm)
}

// ============================================================================
// SECTION: Simulation
// ============================================================================

/// Simulates a proposed change against the model set and DAG.
#[must_use]
pub fn simulate_change(
    models: &BTreeMap<String, ModelDefinition>,
    dag: &ModelDag,
    change: &ChangeDescriptor,
) -> ImpactReport {
    let source = change.model();
    if !models.contains_key(source) {
        return ImpactReport {
            model_name: source.to_string(),
            change: describe(change),
            model_found: false,
            affected: Vec::new(),
            orphaned: Vec::new(),
        };
    }

    let mut seeds = BTreeSet::new();
    seeds.insert(source.to_string());
    let mut descendants = dag.downstream_closure(&seeds);
    descendants.remove(source);

    let mut affected = Vec::new();
    let mut orphaned = Vec::new();

    for name in &descendants {
        let Some(model) = models.get(name) else {
            continue;
        };
        match change {
            ChangeDescriptor::RemoveModel { model: removed } => {
                affected.push(AffectedModel {
                    model: name.clone(),
                    columns_affected: Vec::new(),
                    severity: ReferenceSeverity::Breaking,
                    contract_violation: false,
                });
                let upstream = dag.upstream_of(name);
                if upstream.len() == 1 && upstream[0] == removed.as_str() {
                    orphaned.push(name.clone());
                }
            }
            ChangeDescriptor::AddColumn { column, .. } => {
                // Additive changes never break existing references.
                if references_column(model, column) {
                    affected.push(AffectedModel {
                        model: name.clone(),
                        columns_affected: matching_columns(model, column),
                        severity: ReferenceSeverity::Info,
                        contract_violation: false,
                    });
                }
            }
            ChangeDescriptor::RemoveColumn { column, .. } => {
                push_column_impact(&mut affected, model, column, ReferenceSeverity::Breaking);
            }
            ChangeDescriptor::RenameColumn { old_column, .. } => {
                push_column_impact(&mut affected, model, old_column, ReferenceSeverity::Breaking);
            }
            ChangeDescriptor::TypeChange { column, old_type, new_type, .. } => {
                let severity = if is_type_change_safe(old_type, new_type) {
                    ReferenceSeverity::Warning
                } else {
                    ReferenceSeverity::Breaking
                };
                push_column_impact(&mut affected, model, column, severity);
            }
        }
    }

    affected.sort_by(|a, b| a.model.cmp(&b.model));
    orphaned.sort();

    ImpactReport {
        model_name: source.to_string(),
        change: describe(change),
        model_found: true,
        affected,
        orphaned,
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Records an affected descendant when it references the changed column.
fn push_column_impact(
    affected: &mut Vec<AffectedModel>,
    model: &ModelDefinition,
    column: &str,
    severity: ReferenceSeverity,
) {
    if !references_column(model, column) {
        return;
    }
    let columns = matching_columns(model, column);
    let contract_violation = model.contract_mode != ContractMode::Disabled
        && model
            .contract_columns
            .iter()
            .any(|contract| contract.name.eq_ignore_ascii_case(column));
    affected.push(AffectedModel {
        model: model.name.as_str().to_string(),
        columns_affected: columns,
        severity,
        contract_violation,
    });
}

/// Returns true when the model's SQL or output mentions the column as a
/// standalone identifier.
fn references_column(model: &ModelDefinition, column: &str) -> bool {
    if model
        .output_columns
        .iter()
        .any(|output| output.eq_ignore_ascii_case(column))
    {
        return true;
    }
    contains_identifier(&model.raw_sql, column)
}

/// Returns the model's output columns matching the changed column name.
fn matching_columns(model: &ModelDefinition, column: &str) -> Vec<String> {
    model
        .output_columns
        .iter()
        .filter(|output| output.eq_ignore_ascii_case(column))
        .cloned()
        .collect()
}

/// Word-boundary identifier search, case-insensitive.
fn contains_identifier(sql: &str, identifier: &str) -> bool {
    let haystack = sql.to_lowercase();
    let needle = identifier.to_lowercase();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(&needle) {
        let absolute = start + pos;
        let before_ok = absolute == 0
            || !haystack[..absolute]
                .chars()
                .next_back()
                .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        let after = absolute + needle.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if before_ok && after_ok {
            return true;
        }
        start = absolute + needle.len();
    }
    false
}

/// Renders a stable description of the change.
fn describe(change: &ChangeDescriptor) -> String {
    match change {
        ChangeDescriptor::RemoveColumn { model, column } => {
            format!("remove column {column} from {model}")
        }
        ChangeDescriptor::AddColumn { model, column } => {
            format!("add column {column} to {model}")
        }
        ChangeDescriptor::RenameColumn { model, old_column, new_column } => {
            format!("rename column {old_column} to {new_column} on {model}")
        }
        ChangeDescriptor::TypeChange { model, column, old_type, new_type } => {
            format!("change type of {model}.{column} from {old_type} to {new_type}")
        }
        ChangeDescriptor::RemoveModel { model } => format!("remove model {model}"),
    }
}
