// ironlayer-core/src/loader/discovery.rs
// ============================================================================
// Module: Model Discovery
// Description: Walks a models root and parses every SQL file found.
// Purpose: Produce the canonical model set for one repository revision.
// Dependencies: walkdir, crate::{core, loader, parser}
// ============================================================================

//! ## Overview
//! Discovery walks the configured models root in deterministic (sorted)
//! order, parses each `.sql` file's header, hashes the body, and extracts
//! referenced tables and output columns. A file whose SQL fails to parse is
//! still loaded, with empty extraction results and a warning, because an
//! unparsable model must still participate in diffing and planning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

use crate::core::Materialization;
use crate::core::ModelDefinition;
use crate::core::ModelKind;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::ModelName;
use crate::loader::header::HeaderParseError;
use crate::loader::header::parse_header;
use crate::parser::extract_output_columns;
use crate::parser::extract_referenced_tables;
use crate::parser::normalize_sql;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading a models directory.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The models root does not exist or is not a directory.
    #[error("models root does not exist: {0}")]
    MissingRoot(PathBuf),
    /// A model file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A model file's header was malformed.
    #[error("invalid header in {path}: {source}")]
    Header {
        /// The file with the malformed header.
        path: PathBuf,
        /// The underlying parse error.
        #[source]
        source: HeaderParseError,
    },
    /// Two files declared the same model name.
    #[error("duplicate model name '{0}'")]
    DuplicateName(String),
}

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Loads model definitions from a directory tree of `.sql` files.
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Root directory containing model files.
    root: PathBuf,
}

impl ModelLoader {
    /// Creates a loader over the given models root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Loads every model under the root, keyed and sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the root is missing, a file cannot be
    /// read, a header is malformed, or two files declare the same name.
    pub fn load_all(&self) -> Result<BTreeMap<String, ModelDefinition>, LoadError> {
        if !self.root.is_dir() {
            return Err(LoadError::MissingRoot(self.root.clone()));
        }

        let mut paths: Vec<PathBuf> = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
            .map(|entry| entry.path().to_path_buf())
            .collect();
        paths.sort();

        let mut models = BTreeMap::new();
        for path in paths {
            let model = self.load_file(&path)?;
            let name = model.name.as_str().to_string();
            if models.insert(name.clone(), model).is_some() {
                return Err(LoadError::DuplicateName(name));
            }
        }
        Ok(models)
    }

    /// Loads and parses one model file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] when the file cannot be read or its header is
    /// malformed.
    pub fn load_file(&self, path: &Path) -> Result<ModelDefinition, LoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let header = parse_header(&text).map_err(|source| LoadError::Header {
            path: path.to_path_buf(),
            source,
        })?;

        let body: String = text
            .lines()
            .skip(header.lines_consumed)
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        let name = header
            .name
            .clone()
            .unwrap_or_else(|| derive_name(&self.root, path));

        let declared_kind = header.kind.unwrap_or(ModelKind::FullRefresh);
        let (kind, materialization) = resolve_kind(
            declared_kind,
            header.materialization,
            header.time_column.as_deref(),
            header.unique_key.as_deref(),
            &name,
        );

        let (referenced_tables, output_columns, clean_sql) = match normalize_sql(&body) {
            Ok(clean) => {
                let tables = extract_referenced_tables(&body).unwrap_or_default();
                let columns = extract_output_columns(&body).unwrap_or_default();
                (tables, columns, clean)
            }
            Err(err) => {
                warn!(model = %name, error = %err, "sql parse failed; loading without extraction");
                (Vec::new(), Vec::new(), body.clone())
            }
        };

        let content_hash = hash_bytes(body.as_bytes());
        let file_path = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();

        Ok(ModelDefinition {
            name: ModelName::new(name),
            kind,
            materialization,
            time_column: header.time_column,
            unique_key: header.unique_key,
            owner: header.owner,
            tags: header.tags,
            file_path,
            raw_sql: body,
            clean_sql,
            content_hash,
            referenced_tables,
            dependencies: header.depends_on,
            output_columns,
            contract_mode: header.contract_mode.unwrap_or_default(),
            contract_columns: header.contract_columns,
            tests: header.tests,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Derives a dotted model name from the file path relative to the root.
fn derive_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts: Vec<String> = relative
        .parent()
        .map(|parent| {
            parent
                .components()
                .map(|component| component.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    parts.push(
        relative
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );
    parts.retain(|part| !part.is_empty());
    parts.join(".")
}

/// Resolves the effective kind and materialization.
///
/// An incremental-by-time-range model without a time column and a
/// merge-by-key model without a unique key both degrade to a full-refresh
/// table; the planner applies the same guard independently.
fn resolve_kind(
    declared: ModelKind,
    materialization: Option<Materialization>,
    time_column: Option<&str>,
    unique_key: Option<&str>,
    name: &str,
) -> (ModelKind, Materialization) {
    let degraded = match declared {
        ModelKind::IncrementalByTimeRange if time_column.is_none() => {
            warn!(model = name, "incremental model without time_column; degrading to full refresh");
            true
        }
        ModelKind::MergeByKey if unique_key.is_none() => {
            warn!(model = name, "merge model without unique_key; degrading to full refresh");
            true
        }
        _ => false,
    };
    if degraded {
        return (ModelKind::FullRefresh, Materialization::Table);
    }
    let materialization = materialization.unwrap_or(match declared {
        ModelKind::FullRefresh | ModelKind::AppendOnly => Materialization::Table,
        ModelKind::IncrementalByTimeRange => Materialization::InsertOverwrite,
        ModelKind::MergeByKey => Materialization::Merge,
    });
    (declared, materialization)
}
