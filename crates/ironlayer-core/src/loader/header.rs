// ironlayer-core/src/loader/header.rs
// ============================================================================
// Module: Header Parsing
// Description: Comment-style model header and contract column grammar.
// Purpose: Extract declared model metadata from the top of a SQL file.
// Dependencies: crate::{contracts, core}
// ============================================================================

//! ## Overview
//! A model file begins with consecutive lines of the form `-- key: value`,
//! terminated by the first blank or non-header line. Keys are
//! case-sensitive; values are trimmed; list values are comma-separated.
//! Unknown keys are ignored so ordinary leading comments do not break
//! loading. The `contract_columns` value uses the grammar
//! `name:TYPE[:NOT_NULL]` and fails loudly on malformed entries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::contracts::normalize_data_type;
use crate::core::ColumnContract;
use crate::core::ContractMode;
use crate::core::Materialization;
use crate::core::ModelKind;
use crate::core::ModelTest;
use crate::core::TestSeverity;
use crate::core::TestType;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Comment prefix that introduces a header line.
const HEADER_PREFIX: &str = "--";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing a model header.
#[derive(Debug, Error)]
pub enum HeaderParseError {
    /// A contract entry had an empty column name.
    #[error("empty column name in contract entry '{0}'")]
    EmptyColumnName(String),
    /// A contract entry had an empty data type.
    #[error("empty data type in contract entry '{0}'")]
    EmptyDataType(String),
    /// A contract entry was stated without a type; expected `name:TYPE`.
    #[error("contract entry '{0}' is missing a type; expected name:TYPE")]
    MissingType(String),
    /// A contract entry carried a modifier other than `NOT_NULL`.
    #[error("invalid modifier '{modifier}' in contract entry '{entry}'; expected 'NOT_NULL'")]
    InvalidModifier {
        /// The offending modifier text.
        modifier: String,
        /// The full entry the modifier appeared in.
        entry: String,
    },
    /// A header value failed to parse as its declared enum.
    #[error("invalid value '{value}' for header key '{key}'")]
    InvalidValue {
        /// The header key.
        key: String,
        /// The unparseable value.
        value: String,
    },
    /// A test declaration was malformed.
    #[error("invalid test declaration '{0}'")]
    InvalidTest(String),
}

// ============================================================================
// SECTION: Parsed Header
// ============================================================================

/// Declared metadata extracted from a model file header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelHeader {
    /// Declared model name.
    pub name: Option<String>,
    /// Declared model kind.
    pub kind: Option<ModelKind>,
    /// Declared materialization.
    pub materialization: Option<Materialization>,
    /// Declared time column.
    pub time_column: Option<String>,
    /// Declared merge key.
    pub unique_key: Option<String>,
    /// Declared owner.
    pub owner: Option<String>,
    /// Declared tags.
    pub tags: Vec<String>,
    /// Declared contract mode.
    pub contract_mode: Option<ContractMode>,
    /// Declared contract columns.
    pub contract_columns: Vec<ColumnContract>,
    /// Explicitly declared upstream dependencies.
    pub depends_on: Vec<String>,
    /// Declared tests, in header order.
    pub tests: Vec<ModelTest>,
    /// Number of lines the header consumed, including its terminator.
    pub lines_consumed: usize,
}

// ============================================================================
// SECTION: Header Parsing
// ============================================================================

/// Parses the comment-style header at the top of a model file.
///
/// # Errors
///
/// Returns [`HeaderParseError`] when a recognized key carries an invalid
/// value or a contract entry is malformed.
pub fn parse_header(text: &str) -> Result<ModelHeader, HeaderParseError> {
    let mut header = ModelHeader::default();
    let mut consumed = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();
        let Some(rest) = trimmed.strip_prefix(HEADER_PREFIX) else {
            break;
        };
        let Some((key, value)) = rest.split_once(':') else {
            break;
        };
        consumed += 1;
        let key = key.trim();
        let value = value.trim();
        apply_header_field(&mut header, key, value)?;
    }

    header.lines_consumed = consumed;
    Ok(header)
}

/// Applies one parsed `key: value` pair to the header. Unknown keys are
/// ignored so plain leading comments never break loading.
fn apply_header_field(
    header: &mut ModelHeader,
    key: &str,
    value: &str,
) -> Result<(), HeaderParseError> {
    match key {
        "name" => header.name = Some(value.to_string()),
        "kind" => header.kind = Some(parse_kind(value)?),
        "materialization" => header.materialization = Some(parse_materialization(value)?),
        "time_column" => header.time_column = Some(value.to_string()),
        "unique_key" => header.unique_key = Some(value.to_string()),
        "owner" => header.owner = Some(value.to_string()),
        "tags" => header.tags = split_list(value),
        "contract_mode" => header.contract_mode = Some(parse_contract_mode(value)?),
        "contract_columns" => header.contract_columns = parse_contract_columns(value)?,
        "depends_on" => header.depends_on = split_list(value),
        "test_not_null" => push_column_tests(header, TestType::NotNull, value),
        "test_unique" => push_column_tests(header, TestType::Unique, value),
        "test_accepted_values" => header.tests.push(parse_accepted_values_test(value)?),
        "test_row_count_min" => header.tests.push(parse_row_count_test(value)?),
        _ => {}
    }
    Ok(())
}

// ============================================================================
// SECTION: Contract Columns
// ============================================================================

/// Parses a comma-separated list of `name:TYPE[:NOT_NULL]` contract entries.
///
/// Data types are normalized (case-folded, canonical aliases applied).
/// Trailing commas and surrounding whitespace are tolerated; an empty value
/// yields an empty list.
///
/// # Errors
///
/// Returns [`HeaderParseError`] when an entry has an empty name or type, is
/// missing a type, or carries a modifier other than `NOT_NULL`.
pub fn parse_contract_columns(value: &str) -> Result<Vec<ColumnContract>, HeaderParseError> {
    let mut columns = Vec::new();
    for entry in value.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        columns.push(parse_contract_entry(entry)?);
    }
    Ok(columns)
}

/// Parses one `name:TYPE[:NOT_NULL]` entry.
fn parse_contract_entry(entry: &str) -> Result<ColumnContract, HeaderParseError> {
    let mut parts = entry.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let Some(data_type) = parts.next().map(str::trim) else {
        return Err(HeaderParseError::MissingType(entry.to_string()));
    };
    if name.is_empty() {
        return Err(HeaderParseError::EmptyColumnName(entry.to_string()));
    }
    if data_type.is_empty() {
        return Err(HeaderParseError::EmptyDataType(entry.to_string()));
    }
    let nullable = match parts.next().map(str::trim) {
        None => true,
        Some(modifier) if modifier.eq_ignore_ascii_case("NOT_NULL") => false,
        Some(modifier) => {
            return Err(HeaderParseError::InvalidModifier {
                modifier: modifier.to_string(),
                entry: entry.to_string(),
            });
        }
    };
    Ok(ColumnContract {
        name: name.to_string(),
        data_type: normalize_data_type(data_type),
        nullable,
    })
}

// ============================================================================
// SECTION: Field Parsers
// ============================================================================

/// Parses a declared model kind.
fn parse_kind(value: &str) -> Result<ModelKind, HeaderParseError> {
    match value {
        "FULL_REFRESH" => Ok(ModelKind::FullRefresh),
        "INCREMENTAL_BY_TIME_RANGE" => Ok(ModelKind::IncrementalByTimeRange),
        "MERGE_BY_KEY" => Ok(ModelKind::MergeByKey),
        "APPEND_ONLY" => Ok(ModelKind::AppendOnly),
        _ => Err(HeaderParseError::InvalidValue {
            key: "kind".to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parses a declared materialization.
fn parse_materialization(value: &str) -> Result<Materialization, HeaderParseError> {
    match value {
        "TABLE" => Ok(Materialization::Table),
        "VIEW" => Ok(Materialization::View),
        "INSERT_OVERWRITE" => Ok(Materialization::InsertOverwrite),
        "MERGE" => Ok(Materialization::Merge),
        _ => Err(HeaderParseError::InvalidValue {
            key: "materialization".to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parses a declared contract mode.
fn parse_contract_mode(value: &str) -> Result<ContractMode, HeaderParseError> {
    match value {
        "DISABLED" => Ok(ContractMode::Disabled),
        "WARN" => Ok(ContractMode::Warn),
        "STRICT" => Ok(ContractMode::Strict),
        _ => Err(HeaderParseError::InvalidValue {
            key: "contract_mode".to_string(),
            value: value.to_string(),
        }),
    }
}

/// Splits a comma-separated list value, dropping empty entries.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

// ============================================================================
// SECTION: Test Declarations
// ============================================================================

/// Appends one column test per comma-separated entry. Each entry may carry
/// a `:WARN` suffix to downgrade the severity.
fn push_column_tests(header: &mut ModelHeader, test_type: TestType, value: &str) {
    for entry in split_list(value) {
        let (column, severity) = split_severity(&entry);
        header.tests.push(ModelTest {
            test_type,
            column: Some(column),
            values: Vec::new(),
            threshold: None,
            severity,
        });
    }
}

/// Parses `column = v1 | v2 | ...` accepted-values declarations.
fn parse_accepted_values_test(value: &str) -> Result<ModelTest, HeaderParseError> {
    let Some((column, values)) = value.split_once('=') else {
        return Err(HeaderParseError::InvalidTest(value.to_string()));
    };
    let (column, severity) = split_severity(column.trim());
    if column.is_empty() {
        return Err(HeaderParseError::InvalidTest(value.to_string()));
    }
    let values: Vec<String> = values
        .split('|')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect();
    if values.is_empty() {
        return Err(HeaderParseError::InvalidTest(value.to_string()));
    }
    Ok(ModelTest {
        test_type: TestType::AcceptedValues,
        column: Some(column),
        values,
        threshold: None,
        severity,
    })
}

/// Parses `threshold[:WARN]` row-count declarations.
fn parse_row_count_test(value: &str) -> Result<ModelTest, HeaderParseError> {
    let (threshold, severity) = split_severity(value.trim());
    let threshold: u64 = threshold
        .parse()
        .map_err(|_| HeaderParseError::InvalidTest(value.to_string()))?;
    Ok(ModelTest {
        test_type: TestType::RowCountMin,
        column: None,
        values: Vec::new(),
        threshold: Some(threshold),
        severity,
    })
}

/// Splits an optional `:WARN` suffix off a declaration fragment.
fn split_severity(entry: &str) -> (String, TestSeverity) {
    entry.rsplit_once(':').map_or_else(
        || (entry.to_string(), TestSeverity::Block),
        |(head, tail)| {
            if tail.eq_ignore_ascii_case("WARN") {
                (head.trim().to_string(), TestSeverity::Warn)
            } else {
                (entry.to_string(), TestSeverity::Block)
            }
        },
    )
}
