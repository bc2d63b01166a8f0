// ironlayer-core/src/parser/normalizer.rs
// ============================================================================
// Module: SQL Normalizer
// Description: Canonical SQL rendering for cosmetic-change detection.
// Purpose: Make whitespace- and comment-only edits hash identically.
// Dependencies: sqlparser, sha2
// ============================================================================

//! ## Overview
//! Normalization parses SQL and re-renders it from the AST, discarding
//! whitespace and comments. The result is idempotent: normalizing an
//! already-normalized query returns it unchanged. Unparsable SQL fails
//! loudly instead of falling back to the raw text, so a broken normalizer
//! can never silently disable cosmetic-change detection in one direction
//! while leaving it on in the other.

// ============================================================================
// SECTION: Imports
// ============================================================================

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::core::hashing::hash_bytes;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while canonicalizing SQL.
#[derive(Debug, Error)]
pub enum NormalizationError {
    /// The SQL could not be parsed into an AST.
    #[error("failed to canonicalize sql: {0}")]
    Canonicalize(String),
}

// ============================================================================
// SECTION: Normalization
// ============================================================================

/// Normalizes SQL by parsing and re-rendering it canonically.
///
/// Empty and comment-only input returns an empty string. Multiple
/// statements are joined with `;\n`.
///
/// # Errors
///
/// Returns [`NormalizationError::Canonicalize`] when the SQL cannot be
/// parsed.
pub fn normalize_sql(sql: &str) -> Result<String, NormalizationError> {
    if sql.trim().is_empty() {
        return Ok(String::new());
    }
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|err| NormalizationError::Canonicalize(err.to_string()))?;
    Ok(statements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(";\n"))
}

/// Hashes the canonical form of SQL.
///
/// # Errors
///
/// Returns [`NormalizationError::Canonicalize`] when the SQL cannot be
/// parsed.
pub fn canonical_content_hash(sql: &str) -> Result<String, NormalizationError> {
    let normalized = normalize_sql(sql)?;
    Ok(hash_bytes(normalized.as_bytes()))
}
