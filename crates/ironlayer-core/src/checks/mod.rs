// ironlayer-core/src/checks/mod.rs
// ============================================================================
// Module: Assertion SQL Generation
// Description: Safety-validated SQL generation for declarative model tests.
// Purpose: Emit warehouse assertions without any injection surface.
// Dependencies: regex, crate::core
// ============================================================================

//! ## Overview
//! Declarative tests compile to scalar SQL assertions: a test passes iff
//! the single returned value is zero. Identifiers are embedded directly in
//! the SQL text, so every identifier is validated against a strict
//! allowlist and every accepted-values literal against a rejection set
//! before any SQL is constructed. This validation is the only injection
//! defense; parameterization is unavailable for identifiers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::core::ModelTest;
use crate::core::TestType;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while generating assertion SQL.
#[derive(Debug, Error)]
pub enum CheckError {
    /// An identifier failed the allowlist.
    #[error("unsafe SQL identifier: '{0}'")]
    UnsafeIdentifier(String),
    /// An accepted value contained a rejected character.
    #[error("unsafe accepted value: '{0}'")]
    UnsafeAcceptedValue(String),
    /// The test declaration is missing a required field.
    #[error("test declaration missing required field: {0}")]
    MissingField(&'static str),
}

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Allowlist for dotted SQL identifiers: each part matches
/// `[A-Za-z_][A-Za-z0-9_]*`. `None` only if the constant pattern failed to
/// compile, in which case every identifier is rejected (fail closed).
fn identifier_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").ok())
        .as_ref()
}

/// Characters rejected in accepted-values literals.
const REJECTED_VALUE_CHARS: &[char] = &['\'', '\\', ';'];

/// Validates a dotted SQL identifier against the allowlist.
///
/// # Errors
///
/// Returns [`CheckError::UnsafeIdentifier`] when the identifier contains
/// anything outside `[A-Za-z0-9_.]`, starts a part with a digit, or is
/// empty.
pub fn validate_identifier(identifier: &str) -> Result<&str, CheckError> {
    if identifier_pattern().is_some_and(|pattern| pattern.is_match(identifier)) {
        Ok(identifier)
    } else {
        Err(CheckError::UnsafeIdentifier(identifier.to_string()))
    }
}

/// Validates an accepted-values literal for direct SQL embedding.
///
/// # Errors
///
/// Returns [`CheckError::UnsafeAcceptedValue`] when the value contains a
/// quote, backslash, or semicolon.
pub fn validate_accepted_value(value: &str) -> Result<&str, CheckError> {
    if value.contains(REJECTED_VALUE_CHARS) {
        Err(CheckError::UnsafeAcceptedValue(value.to_string()))
    } else {
        Ok(value)
    }
}

// ============================================================================
// SECTION: SQL Generation
// ============================================================================

/// A generated assertion with its pass criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionSql {
    /// The generated query; returns a single scalar.
    pub sql: String,
    /// The test the query asserts.
    pub test: ModelTest,
}

impl AssertionSql {
    /// Returns true when the scalar result means the test passed.
    #[must_use]
    pub const fn passed(scalar: i64) -> bool {
        scalar == 0
    }
}

/// Generates the assertion query for one test on one model.
///
/// Every embedded identifier is validated before any SQL text is built.
///
/// # Errors
///
/// Returns [`CheckError`] when an identifier or value is unsafe, or a
/// required field is missing from the declaration.
pub fn generate_test_sql(test: &ModelTest, model_name: &str) -> Result<AssertionSql, CheckError> {
    let model = validate_identifier(model_name)?;

    let sql = match test.test_type {
        TestType::NotNull => {
            let column = required_column(test)?;
            format!("SELECT COUNT(*) FROM {model} WHERE {column} IS NULL")
        }
        TestType::Unique => {
            let column = required_column(test)?;
            format!(
                "SELECT COUNT(*) FROM (SELECT {column} FROM {model} GROUP BY {column} HAVING COUNT(*) > 1) duplicates"
            )
        }
        TestType::AcceptedValues => {
            let column = required_column(test)?;
            if test.values.is_empty() {
                return Err(CheckError::MissingField("values"));
            }
            let mut literals = Vec::with_capacity(test.values.len());
            for value in &test.values {
                literals.push(format!("'{}'", validate_accepted_value(value)?));
            }
            format!(
                "SELECT COUNT(*) FROM {model} WHERE {column} NOT IN ({})",
                literals.join(", ")
            )
        }
        TestType::RowCountMin => {
            let threshold = test.threshold.ok_or(CheckError::MissingField("threshold"))?;
            format!("SELECT CASE WHEN COUNT(*) < {threshold} THEN 1 ELSE 0 END FROM {model}")
        }
    };

    Ok(AssertionSql { sql, test: test.clone() })
}

/// Validates and returns the test's target column.
fn required_column(test: &ModelTest) -> Result<&str, CheckError> {
    let column = test
        .column
        .as_deref()
        .ok_or(CheckError::MissingField("column"))?;
    validate_identifier(column)
}
