// ironlayer-core/src/parser/tables.rs
// ============================================================================
// Module: Reference Extraction
// Description: Referenced-table and output-column extraction from SQL.
// Purpose: Feed the DAG builder and contract validator from parsed SQL.
// Dependencies: sqlparser
// ============================================================================

//! ## Overview
//! Extracts the tables a model reads from and the columns its top-level
//! SELECT produces. CTE names declared in a statement's WITH clause are
//! excluded from the referenced set since they are not real upstream
//! tables. Extraction is best-effort: callers treat parse failures as
//! "no information" rather than a hard error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::ops::ControlFlow;

use sqlparser::ast::Query;
use sqlparser::ast::Select;
use sqlparser::ast::SelectItem;
use sqlparser::ast::SetExpr;
use sqlparser::ast::Statement;
use sqlparser::ast::visit_relations;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::parser::normalizer::NormalizationError;

// ============================================================================
// SECTION: Referenced Tables
// ============================================================================

/// Extracts the sorted set of tables referenced by the SQL.
///
/// CTE aliases are excluded. Qualified names keep their dotted form.
///
/// # Errors
///
/// Returns [`NormalizationError::Canonicalize`] when the SQL cannot be
/// parsed.
pub fn extract_referenced_tables(sql: &str) -> Result<Vec<String>, NormalizationError> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|err| NormalizationError::Canonicalize(err.to_string()))?;

    let mut cte_names = BTreeSet::new();
    for statement in &statements {
        if let Statement::Query(query) = statement {
            collect_cte_names(query, &mut cte_names);
        }
    }

    let mut tables = BTreeSet::new();
    for statement in &statements {
        let _flow: ControlFlow<()> = visit_relations(statement, |relation| {
            let name = relation.to_string();
            if !cte_names.contains(&name) {
                tables.insert(name);
            }
            ControlFlow::Continue(())
        });
    }

    Ok(tables.into_iter().collect())
}

/// Collects CTE aliases declared anywhere in a query.
fn collect_cte_names(query: &Query, names: &mut BTreeSet<String>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            names.insert(cte.alias.name.value.clone());
            collect_cte_names(&cte.query, names);
        }
    }
}

// ============================================================================
// SECTION: Output Columns
// ============================================================================

/// Extracts the output column names of the top-level SELECT.
///
/// Aliased expressions use the alias; plain column references use the final
/// identifier part. A `SELECT *` contributes no names because expansion
/// requires a schema.
///
/// # Errors
///
/// Returns [`NormalizationError::Canonicalize`] when the SQL cannot be
/// parsed.
pub fn extract_output_columns(sql: &str) -> Result<Vec<String>, NormalizationError> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|err| NormalizationError::Canonicalize(err.to_string()))?;

    let mut columns = Vec::new();
    for statement in &statements {
        if let Statement::Query(query) = statement
            && let Some(select) = leading_select(query)
        {
            for item in &select.projection {
                match item {
                    SelectItem::UnnamedExpr(expr) => {
                        if let Some(name) = trailing_identifier(&expr.to_string()) {
                            columns.push(name);
                        }
                    }
                    SelectItem::ExprWithAlias { alias, .. } => {
                        columns.push(alias.value.clone());
                    }
                    SelectItem::QualifiedWildcard(..) | SelectItem::Wildcard(_) => {}
                }
            }
        }
    }
    Ok(columns)
}

/// Returns the first plain SELECT body of a query, if any.
fn leading_select(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(inner) => leading_select(inner),
        _ => None,
    }
}

/// Returns the final identifier segment of a rendered expression, when the
/// expression is a plain (possibly qualified) column reference.
fn trailing_identifier(rendered: &str) -> Option<String> {
    let candidate = rendered.rsplit('.').next().unwrap_or(rendered);
    let is_ident = !candidate.is_empty()
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
        && !candidate.starts_with(|ch: char| ch.is_ascii_digit());
    if is_ident { Some(candidate.to_string()) } else { None }
}
