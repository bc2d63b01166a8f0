// ironlayer-core/src/contracts/mod.rs
// ============================================================================
// Module: Contract Validator
// Description: Schema contract validation for model output columns.
// Purpose: Detect breaking and additive drift between contracts and output.
// Dependencies: serde, crate::core
// ============================================================================

//! ## Overview
//! Compares declared column contracts against the columns a model actually
//! produces. Violations are sorted deterministically by
//! `(model_name, column_name, violation_kind)` so contract results can feed
//! the byte-reproducible plan tree. In WARN mode breaking violations are
//! downgraded to warnings; in STRICT mode a breaking violation blocks plan
//! apply (the caller gates on the breaking count).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::ContractMode;
use crate::core::ModelDefinition;

// ============================================================================
// SECTION: Type Normalization
// ============================================================================

/// Canonical aliases applied before type comparison.
const TYPE_ALIASES: &[(&str, &str)] = &[
    ("INTEGER", "INT"),
    ("BIGINTEGER", "BIGINT"),
    ("LONG", "BIGINT"),
    ("SHORT", "SMALLINT"),
    ("TINYINT", "SMALLINT"),
    ("REAL", "FLOAT"),
    ("DOUBLE PRECISION", "DOUBLE"),
    ("VARCHAR", "STRING"),
    ("TEXT", "STRING"),
    ("CHAR", "STRING"),
    ("NVARCHAR", "STRING"),
    ("DATETIME", "TIMESTAMP"),
    ("BOOL", "BOOLEAN"),
    ("NUMERIC", "DECIMAL"),
    ("NUMBER", "DECIMAL"),
];

/// Normalizes a data type string for comparison.
///
/// Strips whitespace, upper-cases, and applies canonical aliases so that
/// `VARCHAR` and `STRING` (or `INTEGER` and `INT`) compare as equal.
#[must_use]
pub fn normalize_data_type(data_type: &str) -> String {
    let normalized = data_type.trim().to_ascii_uppercase();
    for (alias, canonical) in TYPE_ALIASES {
        if normalized == *alias {
            return (*canonical).to_string();
        }
    }
    normalized
}

// ============================================================================
// SECTION: Violations
// ============================================================================

/// The kind of contract violation detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// A contracted column is missing from the output.
    ColumnRemoved,
    /// A column exists but its type does not match the contract.
    TypeChanged,
    /// The contract declares NOT NULL but the output allows NULLs.
    NullableTightened,
    /// An output column is not declared in the contract.
    ColumnAdded,
}

impl ViolationKind {
    /// Returns the stable label used for sorting and serialization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ColumnRemoved => "COLUMN_REMOVED",
            Self::TypeChanged => "TYPE_CHANGED",
            Self::NullableTightened => "NULLABLE_TIGHTENED",
            Self::ColumnAdded => "COLUMN_ADDED",
        }
    }
}

/// How critical a contract violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationSeverity {
    /// Blocks apply under STRICT contracts.
    Breaking,
    /// Reported but non-blocking.
    Warning,
    /// Informational only.
    Info,
}

/// A single schema contract violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractViolation {
    /// Model where the violation was detected.
    pub model_name: String,
    /// Column involved in the violation.
    pub column_name: String,
    /// Violation kind.
    pub violation_type: ViolationKind,
    /// How critical the violation is.
    pub severity: ViolationSeverity,
    /// What the contract declared.
    pub expected: String,
    /// What was actually found.
    pub actual: String,
    /// Human-readable description.
    pub message: String,
}

/// Result of validating contracts for one or more models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractValidation {
    /// All detected violations, sorted deterministically.
    pub violations: Vec<ContractViolation>,
    /// Number of models that had contracts checked.
    pub models_checked: usize,
}

impl ContractValidation {
    /// Returns the count of breaking violations.
    #[must_use]
    pub fn breaking_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|violation| violation.severity == ViolationSeverity::Breaking)
            .count()
    }

    /// Returns true when any violation is breaking.
    #[must_use]
    pub fn has_breaking(&self) -> bool {
        self.breaking_count() > 0
    }

    /// Returns the violations attributed to one model.
    #[must_use]
    pub fn for_model(&self, model_name: &str) -> Vec<ContractViolation> {
        self.violations
            .iter()
            .filter(|violation| violation.model_name == model_name)
            .cloned()
            .collect()
    }
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates one model's output against its declared schema contract.
///
/// `actual_columns` overrides the model's recorded `output_columns` when
/// provided. Type and nullability maps are optional; without them only
/// column presence is checked. Column matching is case-insensitive.
#[must_use]
pub fn validate_contract(
    model: &ModelDefinition,
    actual_columns: Option<&[String]>,
    actual_types: Option<&BTreeMap<String, String>>,
    actual_nullability: Option<&BTreeMap<String, bool>>,
) -> ContractValidation {
    if model.contract_mode == ContractMode::Disabled {
        return ContractValidation::default();
    }
    if model.contract_columns.is_empty() {
        return ContractValidation { violations: Vec::new(), models_checked: 1 };
    }

    let columns: Vec<String> = actual_columns
        .map_or_else(|| model.output_columns.clone(), <[String]>::to_vec);
    let columns_lower: Vec<String> =
        columns.iter().map(|column| column.to_lowercase()).collect();

    let mut violations = Vec::new();

    for contract in &model.contract_columns {
        let col_lower = contract.name.to_lowercase();

        if !columns_lower.contains(&col_lower) {
            violations.push(ContractViolation {
                model_name: model.name.as_str().to_string(),
                column_name: contract.name.clone(),
                violation_type: ViolationKind::ColumnRemoved,
                severity: ViolationSeverity::Breaking,
                expected: format!("{}: {}", contract.name, contract.data_type),
                actual: "(missing)".to_string(),
                message: format!(
                    "contracted column '{}' (type: {}) is missing from model output",
                    contract.name, contract.data_type
                ),
            });
            continue;
        }

        if let Some(types) = actual_types
            && let Some(actual_type) = lookup_ci(types, &col_lower)
        {
            let expected_norm = normalize_data_type(&contract.data_type);
            let actual_norm = normalize_data_type(&actual_type);
            if expected_norm != actual_norm {
                violations.push(ContractViolation {
                    model_name: model.name.as_str().to_string(),
                    column_name: contract.name.clone(),
                    violation_type: ViolationKind::TypeChanged,
                    severity: ViolationSeverity::Breaking,
                    expected: contract.data_type.clone(),
                    actual: actual_type.clone(),
                    message: format!(
                        "column '{}' type changed: contract declares {}, actual is {}",
                        contract.name, contract.data_type, actual_type
                    ),
                });
            }
        }

        if let Some(nullability) = actual_nullability
            && let Some(actual_nullable) = lookup_ci(nullability, &col_lower)
            && !contract.nullable
            && actual_nullable
        {
            violations.push(ContractViolation {
                model_name: model.name.as_str().to_string(),
                column_name: contract.name.clone(),
                violation_type: ViolationKind::NullableTightened,
                severity: ViolationSeverity::Breaking,
                expected: "NOT NULL".to_string(),
                actual: "NULLABLE".to_string(),
                message: format!(
                    "column '{}' is declared NOT NULL in contract but is nullable in actual output",
                    contract.name
                ),
            });
        }
    }

    let contracted_lower: Vec<String> = model
        .contract_columns
        .iter()
        .map(|contract| contract.name.to_lowercase())
        .collect();
    let mut sorted_columns = columns;
    sorted_columns.sort();
    for actual_col in &sorted_columns {
        if !contracted_lower.contains(&actual_col.to_lowercase()) {
            violations.push(ContractViolation {
                model_name: model.name.as_str().to_string(),
                column_name: actual_col.clone(),
                violation_type: ViolationKind::ColumnAdded,
                severity: ViolationSeverity::Info,
                expected: "(not in contract)".to_string(),
                actual: actual_col.clone(),
                message: format!(
                    "column '{actual_col}' exists in output but is not declared in the schema contract"
                ),
            });
        }
    }

    if model.contract_mode == ContractMode::Warn {
        for violation in &mut violations {
            if violation.severity == ViolationSeverity::Breaking {
                violation.severity = ViolationSeverity::Warning;
            }
        }
    }

    sort_violations(&mut violations);
    ContractValidation { violations, models_checked: 1 }
}

/// Validates contracts across multiple models, aggregating all violations.
#[must_use]
pub fn validate_contracts_batch(
    models: &[ModelDefinition],
    actual_columns: &BTreeMap<String, Vec<String>>,
    actual_types: &BTreeMap<String, BTreeMap<String, String>>,
    actual_nullability: &BTreeMap<String, BTreeMap<String, bool>>,
) -> ContractValidation {
    let mut sorted: Vec<&ModelDefinition> = models.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut violations = Vec::new();
    let mut models_checked = 0usize;

    for model in sorted {
        if model.contract_mode == ContractMode::Disabled {
            continue;
        }
        let name = model.name.as_str();
        let result = validate_contract(
            model,
            actual_columns.get(name).map(Vec::as_slice),
            actual_types.get(name),
            actual_nullability.get(name),
        );
        violations.extend(result.violations);
        models_checked += result.models_checked;
    }

    sort_violations(&mut violations);
    ContractValidation { violations, models_checked }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Sorts violations by (model, column, violation kind) for determinism.
fn sort_violations(violations: &mut [ContractViolation]) {
    violations.sort_by(|a, b| {
        (a.model_name.as_str(), a.column_name.as_str(), a.violation_type).cmp(&(
            b.model_name.as_str(),
            b.column_name.as_str(),
            b.violation_type,
        ))
    });
}

/// Looks up a map entry by case-insensitive key.
fn lookup_ci<V: Clone>(map: &BTreeMap<String, V>, key_lower: &str) -> Option<V> {
    map.iter()
        .find(|(key, _)| key.to_lowercase() == key_lower)
        .map(|(_, value)| value.clone())
}
