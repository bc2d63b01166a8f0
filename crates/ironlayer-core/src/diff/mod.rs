// ironlayer-core/src/diff/mod.rs
// ============================================================================
// Module: Structural Diff
// Description: Content-addressed comparison of two model snapshots.
// Purpose: Classify added, removed, modified, and cosmetic model changes.
// Dependencies: serde, crate::parser
// ============================================================================

//! ## Overview
//! The diff engine compares `name -> content_hash` maps between two git
//! revisions. When the SQL for both sides of a modified model is available
//! and parses, a change whose normalized SQL is identical is classified as
//! cosmetic and omitted from the modified list. All output lists are sorted
//! and carry no timestamps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::parser::normalize_sql;

// ============================================================================
// SECTION: Diff Result
// ============================================================================

/// Result of comparing two model snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Models present only in the target, sorted.
    pub added_models: Vec<String>,
    /// Models present only in the base, sorted.
    pub removed_models: Vec<String>,
    /// Models present in both with differing content hashes, sorted.
    pub modified_models: Vec<String>,
    /// Modified models whose changes were whitespace or comments only,
    /// sorted. These appear in no other list.
    pub cosmetic_changes_skipped: Vec<String>,
}

impl DiffResult {
    /// Returns true when nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_models.is_empty()
            && self.removed_models.is_empty()
            && self.modified_models.is_empty()
    }
}

// ============================================================================
// SECTION: Diffing
// ============================================================================

/// Compares base and target version maps.
///
/// `base_sql` and `target_sql` optionally carry the SQL bodies for cosmetic
/// classification; a model missing from either map, or whose SQL fails to
/// normalize on either side, is conservatively treated as a real change.
#[must_use]
pub fn diff_snapshots(
    base_versions: &BTreeMap<String, String>,
    target_versions: &BTreeMap<String, String>,
    base_sql: &BTreeMap<String, String>,
    target_sql: &BTreeMap<String, String>,
) -> DiffResult {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut modified = Vec::new();
    let mut cosmetic = Vec::new();

    for name in target_versions.keys() {
        if !base_versions.contains_key(name) {
            added.push(name.clone());
        }
    }

    for name in base_versions.keys() {
        if !target_versions.contains_key(name) {
            removed.push(name.clone());
        }
    }

    for (name, base_hash) in base_versions {
        let Some(target_hash) = target_versions.get(name) else {
            continue;
        };
        if base_hash == target_hash {
            continue;
        }
        if is_cosmetic_change(name, base_sql, target_sql) {
            cosmetic.push(name.clone());
        } else {
            modified.push(name.clone());
        }
    }

    added.sort();
    removed.sort();
    modified.sort();
    cosmetic.sort();

    DiffResult {
        added_models: added,
        removed_models: removed,
        modified_models: modified,
        cosmetic_changes_skipped: cosmetic,
    }
}

// ============================================================================
// SECTION: Cosmetic Classification
// ============================================================================

/// Returns true when both sides normalize to identical SQL.
fn is_cosmetic_change(
    name: &str,
    base_sql: &BTreeMap<String, String>,
    target_sql: &BTreeMap<String, String>,
) -> bool {
    let (Some(base), Some(target)) = (base_sql.get(name), target_sql.get(name)) else {
        return false;
    };
    match (normalize_sql(base), normalize_sql(target)) {
        (Ok(base_norm), Ok(target_norm)) => base_norm == target_norm,
        _ => false,
    }
}
