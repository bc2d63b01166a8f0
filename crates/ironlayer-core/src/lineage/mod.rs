// ironlayer-core/src/lineage/mod.rs
// ============================================================================
// Module: Column Lineage
// Description: Per-output-column source tracing over parsed SQL.
// Purpose: Answer where a column's data comes from, optionally cross-model.
// Dependencies: sqlparser, crate::{core, graph}
// ============================================================================

//! ## Overview
//! Lineage analysis parses a model's SQL and classifies every output column
//! by its source table, source column, and transform kind. `SELECT *`
//! expands against a provided schema map; without one the wildcard is
//! recorded as unresolved. CTE pass-throughs are traced into the defining
//! query. Cross-model tracing follows direct sources through the DAG until
//! it reaches an external (non-model) table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::ops::ControlFlow;

use serde::Serialize;
use sqlparser::ast::Expr;
use sqlparser::ast::Query;
use sqlparser::ast::Select;
use sqlparser::ast::SelectItem;
use sqlparser::ast::SetExpr;
use sqlparser::ast::Statement;
use sqlparser::ast::TableFactor;
use sqlparser::ast::visit_expressions;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::core::ModelDefinition;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Schema map: table name to column-name-to-type.
pub type SchemaMap = BTreeMap<String, BTreeMap<String, String>>;

/// How an output column derives from its sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Plain column reference.
    Direct,
    /// Arithmetic, concatenation, casts, or other scalar expressions.
    Expression,
    /// Aggregate function.
    Aggregation,
    /// Window function.
    Window,
    /// CASE expression.
    Case,
    /// Literal value with no source column.
    Literal,
}

/// Lineage for one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageNode {
    /// Output column name.
    pub output_column: String,
    /// Source table, when resolvable.
    pub source_table: Option<String>,
    /// Source column, when resolvable.
    pub source_column: Option<String>,
    /// Transform classification.
    pub transform_type: TransformKind,
}

/// Lineage result for one model's SQL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnLineage {
    /// Per-output-column lineage nodes, keyed by output column.
    pub column_lineage: BTreeMap<String, Vec<LineageNode>>,
    /// Columns that could not be resolved (e.g. `*` without a schema).
    pub unresolved_columns: Vec<String>,
}

/// One hop in a cross-model trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageHop {
    /// Model the hop passes through.
    pub model: String,
    /// Source table feeding the column at this hop.
    pub source_table: Option<String>,
    /// Source column feeding the column at this hop.
    pub source_column: Option<String>,
    /// Transform applied at this hop.
    pub transform_type: TransformKind,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised during lineage analysis.
#[derive(Debug, Error)]
pub enum LineageError {
    /// The SQL could not be parsed.
    #[error("failed to parse sql for lineage: {0}")]
    Parse(String),
    /// The SQL contained no SELECT to analyze.
    #[error("sql contains no select statement")]
    NoSelect,
}

// ============================================================================
// SECTION: Analysis
// ============================================================================

/// Aggregate function names recognized for transform classification.
const AGGREGATES: &[&str] = &["sum", "count", "avg", "min", "max"];

/// Analyzes per-column lineage for one SQL statement.
///
/// # Errors
///
/// Returns [`LineageError`] when the SQL cannot be parsed or contains no
/// SELECT.
pub fn analyze_lineage(sql: &str, schemas: Option<&SchemaMap>) -> Result<ColumnLineage, LineageError> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|err| LineageError::Parse(err.to_string()))?;

    let query = statements
        .iter()
        .find_map(|statement| match statement {
            Statement::Query(query) => Some(query.as_ref()),
            _ => None,
        })
        .ok_or(LineageError::NoSelect)?;

    analyze_query(query, schemas)
}

/// Analyzes one query body, resolving CTE pass-throughs.
fn analyze_query(query: &Query, schemas: Option<&SchemaMap>) -> Result<ColumnLineage, LineageError> {
    let mut ctes: BTreeMap<String, &Query> = BTreeMap::new();
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            ctes.insert(cte.alias.name.value.clone(), &cte.query);
        }
    }

    let select = leading_select(query).ok_or(LineageError::NoSelect)?;
    let sources = table_sources(select);

    let mut result = ColumnLineage::default();
    for item in &select.projection {
        match item {
            SelectItem::UnnamedExpr(expr) => {
                let name = default_output_name(expr);
                let node = classify(expr, &name, &sources, &ctes, schemas);
                result.column_lineage.entry(name).or_default().push(node);
            }
            SelectItem::ExprWithAlias { expr, alias } => {
                let name = alias.value.clone();
                let node = classify(expr, &name, &sources, &ctes, schemas);
                result.column_lineage.entry(name).or_default().push(node);
            }
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {
                expand_wildcard(&sources, schemas, &mut result);
            }
        }
    }
    Ok(result)
}

/// Expands `SELECT *` against the provided schema, or records it unresolved.
fn expand_wildcard(
    sources: &BTreeMap<String, String>,
    schemas: Option<&SchemaMap>,
    result: &mut ColumnLineage,
) {
    let mut expanded = false;
    if let Some(schemas) = schemas {
        let tables: BTreeSet<&String> = sources.values().collect();
        for table in tables {
            if let Some(columns) = schemas.get(table) {
                expanded = true;
                for column in columns.keys() {
                    result
                        .column_lineage
                        .entry(column.clone())
                        .or_default()
                        .push(LineageNode {
                            output_column: column.clone(),
                            source_table: Some(table.clone()),
                            source_column: Some(column.clone()),
                            transform_type: TransformKind::Direct,
                        });
                }
            }
        }
    }
    if !expanded {
        result.unresolved_columns.push("*".to_string());
    }
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Classifies one projection expression into a lineage node.
fn classify(
    expr: &Expr,
    output_name: &str,
    sources: &BTreeMap<String, String>,
    ctes: &BTreeMap<String, &Query>,
    schemas: Option<&SchemaMap>,
) -> LineageNode {
    let transform = transform_kind(expr);
    let (source_table, source_column) = primary_source(expr, sources);

    let mut node = LineageNode {
        output_column: output_name.to_string(),
        source_table,
        source_column,
        transform_type: transform,
    };

    // A direct reference into a CTE is resolved through the CTE's own
    // projection so callers see the real underlying table.
    if node.transform_type == TransformKind::Direct
        && let (Some(table), Some(column)) = (node.source_table.clone(), node.source_column.clone())
        && let Some(cte_query) = ctes.get(&table)
        && let Ok(inner) = analyze_query(cte_query, schemas)
        && let Some(inner_nodes) = inner.column_lineage.get(&column)
        && let Some(inner_node) = inner_nodes.first()
    {
        node.source_table = inner_node.source_table.clone();
        node.source_column = inner_node.source_column.clone();
        if inner_node.transform_type != TransformKind::Direct {
            node.transform_type = inner_node.transform_type;
        }
    }

    node
}

/// Determines the transform kind from the expression shape.
fn transform_kind(expr: &Expr) -> TransformKind {
    match expr {
        Expr::Identifier(_) | Expr::CompoundIdentifier(_) => TransformKind::Direct,
        Expr::Case { .. } => TransformKind::Case,
        Expr::Value(_) => TransformKind::Literal,
        Expr::Function(function) => {
            if function.over.is_some() {
                TransformKind::Window
            } else {
                let name = function.name.to_string().to_lowercase();
                if AGGREGATES.contains(&name.as_str()) {
                    TransformKind::Aggregation
                } else {
                    TransformKind::Expression
                }
            }
        }
        Expr::Nested(inner) => transform_kind(inner),
        _ => TransformKind::Expression,
    }
}

/// Resolves the first source (table, column) referenced by the expression.
fn primary_source(
    expr: &Expr,
    sources: &BTreeMap<String, String>,
) -> (Option<String>, Option<String>) {
    let mut found: Option<(Option<String>, String)> = None;
    let _flow: ControlFlow<()> = visit_expressions(expr, |inner: &Expr| {
        if found.is_some() {
            return ControlFlow::Continue(());
        }
        match inner {
            Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
                let qualifier = parts[parts.len() - 2].value.clone();
                let column = parts[parts.len() - 1].value.clone();
                let table = sources.get(&qualifier).cloned().or(Some(qualifier));
                found = Some((table, column));
            }
            Expr::Identifier(ident) => {
                let table = single_source(sources);
                found = Some((table, ident.value.clone()));
            }
            _ => {}
        }
        ControlFlow::Continue(())
    });
    match found {
        Some((table, column)) => (table, Some(column)),
        None => (None, None),
    }
}

/// Returns the sole source table when the FROM clause has exactly one.
fn single_source(sources: &BTreeMap<String, String>) -> Option<String> {
    let mut tables: Vec<&String> = sources.values().collect();
    tables.sort();
    tables.dedup();
    if tables.len() == 1 {
        Some(tables[0].clone())
    } else {
        None
    }
}

// ============================================================================
// SECTION: Source Tables
// ============================================================================

/// Maps alias (or name) to full table name for every FROM/JOIN relation.
fn table_sources(select: &Select) -> BTreeMap<String, String> {
    let mut sources = BTreeMap::new();
    for table_with_joins in &select.from {
        collect_table(&table_with_joins.relation, &mut sources);
        for join in &table_with_joins.joins {
            collect_table(&join.relation, &mut sources);
        }
    }
    sources
}

/// Records one table factor under its alias and full name.
fn collect_table(factor: &TableFactor, sources: &mut BTreeMap<String, String>) {
    if let TableFactor::Table { name, alias, .. } = factor {
        let full = name.to_string();
        if let Some(alias) = alias {
            sources.insert(alias.name.value.clone(), full.clone());
        }
        sources.insert(full.clone(), full);
    }
}

/// Derives an output name for an unaliased projection expression.
fn default_output_name(expr: &Expr) -> String {
    match expr {
        Expr::Identifier(ident) => ident.value.clone(),
        Expr::CompoundIdentifier(parts) => parts
            .last()
            .map(|ident| ident.value.clone())
            .unwrap_or_else(|| expr.to_string()),
        _ => expr.to_string(),
    }
}

/// Returns the first plain SELECT body of a query, if any.
fn leading_select(query: &Query) -> Option<&Select> {
    match query.body.as_ref() {
        SetExpr::Select(select) => Some(select),
        SetExpr::Query(inner) => leading_select(inner),
        _ => None,
    }
}

// ============================================================================
// SECTION: Cross-Model Tracing
// ============================================================================

/// Traces one column through upstream models until an external source.
///
/// Each hop records the model the trace passes through and the source that
/// feeds the column there. Tracing stops when the source table is not a
/// known model, when lineage becomes unresolvable, or when the transform is
/// no longer a direct pass-through.
///
/// # Errors
///
/// Returns [`LineageError`] when the starting model's SQL cannot be parsed.
pub fn trace_column(
    models: &BTreeMap<String, ModelDefinition>,
    model_name: &str,
    column: &str,
    schemas: Option<&SchemaMap>,
) -> Result<Vec<LineageHop>, LineageError> {
    let mut hops = Vec::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut current_model = model_name.to_string();
    let mut current_column = column.to_string();

    while let Some(model) = models.get(&current_model) {
        if !visited.insert(current_model.clone()) {
            break;
        }
        let lineage = analyze_lineage(&model.raw_sql, schemas)?;
        let Some(nodes) = lineage.column_lineage.get(&current_column) else {
            break;
        };
        let Some(node) = nodes.first() else {
            break;
        };
        hops.push(LineageHop {
            model: current_model.clone(),
            source_table: node.source_table.clone(),
            source_column: node.source_column.clone(),
            transform_type: node.transform_type,
        });

        let (Some(table), Some(source_column)) =
            (node.source_table.clone(), node.source_column.clone())
        else {
            break;
        };
        if node.transform_type != TransformKind::Direct || !models.contains_key(&table) {
            break;
        }
        current_model = table;
        current_column = source_column;
    }

    Ok(hops)
}
