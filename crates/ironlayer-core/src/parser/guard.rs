// ironlayer-core/src/parser/guard.rs
// ============================================================================
// Module: SQL Safety Guard
// Description: Detects dangerous statements in submitted model SQL.
// Purpose: Abort plan generation before destructive SQL reaches the backend.
// Dependencies: sqlparser
// ============================================================================

//! ## Overview
//! Models are SELECT-shaped artifacts; anything that mutates or destroys
//! warehouse state inside a model body is suspect. The guard scans the
//! parsed statements and reports findings: CRITICAL findings abort plan
//! generation, lesser findings are logged as warnings by the caller.
//! Unparsable SQL produces no findings; the normalizer already fails
//! loudly on that path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

// ============================================================================
// SECTION: Findings
// ============================================================================

/// How dangerous a guarded statement is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardSeverity {
    /// Aborts plan generation.
    Critical,
    /// Logged as a warning.
    Warning,
}

/// One dangerous statement detected in model SQL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardFinding {
    /// Statement classification, e.g. `DROP`.
    pub statement: String,
    /// Finding severity.
    pub severity: GuardSeverity,
    /// Human-readable description.
    pub message: String,
}

// ============================================================================
// SECTION: Scan
// ============================================================================

/// Scans model SQL for dangerous statements.
///
/// Unparsable SQL yields no findings; the caller's normalizer surfaces the
/// parse failure separately.
#[must_use]
pub fn scan_sql(sql: &str) -> Vec<GuardFinding> {
    let Ok(statements) = Parser::parse_sql(&GenericDialect {}, sql) else {
        return Vec::new();
    };

    let mut findings = Vec::new();
    for statement in &statements {
        match statement {
            Statement::Drop { .. } => findings.push(critical("DROP", "drops a database object")),
            Statement::Truncate { .. } => {
                findings.push(critical("TRUNCATE", "truncates a table"));
            }
            Statement::Delete(delete) => {
                if delete.selection.is_none() {
                    findings.push(critical("DELETE", "deletes every row (no WHERE clause)"));
                } else {
                    findings.push(warning("DELETE", "deletes rows inside a model body"));
                }
            }
            Statement::Update { selection, .. } => {
                if selection.is_none() {
                    findings.push(critical("UPDATE", "updates every row (no WHERE clause)"));
                } else {
                    findings.push(warning("UPDATE", "updates rows inside a model body"));
                }
            }
            Statement::Grant { .. } => findings.push(warning("GRANT", "changes privileges")),
            Statement::Revoke { .. } => findings.push(warning("REVOKE", "changes privileges")),
            Statement::AlterTable { .. } => {
                findings.push(warning("ALTER TABLE", "alters a table definition"));
            }
            _ => {}
        }
    }
    findings
}

/// Returns true when any finding is critical.
#[must_use]
pub fn has_critical(findings: &[GuardFinding]) -> bool {
    findings
        .iter()
        .any(|finding| finding.severity == GuardSeverity::Critical)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a critical finding.
fn critical(statement: &str, message: &str) -> GuardFinding {
    GuardFinding {
        statement: statement.to_string(),
        severity: GuardSeverity::Critical,
        message: message.to_string(),
    }
}

/// Builds a warning finding.
fn warning(statement: &str, message: &str) -> GuardFinding {
    GuardFinding {
        statement: statement.to_string(),
        severity: GuardSeverity::Warning,
        message: message.to_string(),
    }
}
