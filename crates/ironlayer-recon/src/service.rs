// ironlayer-recon/src/service.rs
// ============================================================================
// Module: Reconciliation Service
// Description: Compares recorded run state against the execution backend.
// Purpose: Surface phantom successes and stale records for operators.
// Dependencies: ironlayer-core, crate::executor
// ============================================================================

//! ## Overview
//! For each recent run carrying a backend run identifier, the service asks
//! the executor for the authoritative status and classifies any mismatch.
//! Matched results are recorded as resolved checks with no discrepancy
//! kind; mismatches stay unresolved for operator review. Runs without a
//! backend identifier are skipped, as are runs the executor cannot answer
//! for. Schema drift comparison classifies column-level differences with
//! removed columns ranked worst.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ironlayer_core::ColumnContract;
use ironlayer_core::DiscrepancyKind;
use ironlayer_core::DriftKind;
use ironlayer_core::ModelName;
use ironlayer_core::PlanId;
use ironlayer_core::ReconciliationCheck;
use ironlayer_core::ReconciliationStore;
use ironlayer_core::RunStore;
use ironlayer_core::SchemaDrift;
use ironlayer_core::StoreError;
use ironlayer_core::normalize_data_type;
use serde::Serialize;
use tracing::warn;

use crate::executor::PlanExecutor;

// ============================================================================
// SECTION: Summary
// ============================================================================

/// Outcome counts of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    /// Runs considered.
    pub total_runs: usize,
    /// Runs verified against the backend.
    pub checked: usize,
    /// Runs whose statuses matched.
    pub matched: usize,
    /// Runs with a classified discrepancy.
    pub discrepancies: usize,
    /// Runs skipped (no backend id, or backend unavailable).
    pub skipped: usize,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Reconciliation over a tenant-bound store and an executor.
pub struct ReconciliationService<S, E> {
    /// Tenant-bound store.
    store: S,
    /// Execution backend.
    executor: E,
}

impl<S, E> ReconciliationService<S, E>
where
    S: RunStore + ReconciliationStore,
    E: PlanExecutor,
{
    /// Creates a service over the given store and executor.
    #[must_use]
    pub const fn new(store: S, executor: E) -> Self {
        Self { store, executor }
    }

    /// Reconciles runs from the trailing window.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails; executor failures only
    /// skip the affected run.
    pub async fn reconcile_recent(
        &self,
        hours_back: u32,
    ) -> Result<ReconciliationSummary, StoreError> {
        let runs = self.store.recent_runs(hours_back)?;
        self.reconcile_runs(runs).await
    }

    /// Reconciles every run of one plan.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store fails.
    pub async fn reconcile_plan(
        &self,
        plan_id: &PlanId,
    ) -> Result<ReconciliationSummary, StoreError> {
        let runs = self.store.runs_for_plan(plan_id)?;
        self.reconcile_runs(runs).await
    }

    /// Shared sweep over a run list.
    async fn reconcile_runs(
        &self,
        runs: Vec<ironlayer_core::RunRecord>,
    ) -> Result<ReconciliationSummary, StoreError> {
        let mut summary = ReconciliationSummary {
            total_runs: runs.len(),
            ..ReconciliationSummary::default()
        };

        for run in runs {
            let Some(external_id) = run.external_run_id.as_deref() else {
                summary.skipped += 1;
                continue;
            };

            let warehouse_status = match self.executor.verify_run(external_id).await {
                Ok(status) => status,
                Err(err) => {
                    warn!(
                        run_id = %run.run_id,
                        external_run_id = external_id,
                        error = %err,
                        "could not verify run against backend"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            summary.checked += 1;
            if run.status == warehouse_status {
                summary.matched += 1;
                self.store.record_check(&ReconciliationCheck {
                    run_id: run.run_id.clone(),
                    model_name: run.model_name.clone(),
                    expected_status: run.status,
                    warehouse_status,
                    discrepancy_type: None,
                    resolved: true,
                    resolved_by: None,
                    resolved_at: None,
                    resolution_note: None,
                })?;
            } else {
                summary.discrepancies += 1;
                let kind = DiscrepancyKind::classify(run.status, warehouse_status);
                warn!(
                    run_id = %run.run_id,
                    model = %run.model_name,
                    expected = ?run.status,
                    actual = ?warehouse_status,
                    kind = ?kind,
                    "reconciliation discrepancy"
                );
                self.store.record_check(&ReconciliationCheck {
                    run_id: run.run_id.clone(),
                    model_name: run.model_name.clone(),
                    expected_status: run.status,
                    warehouse_status,
                    discrepancy_type: Some(kind),
                    resolved: false,
                    resolved_by: None,
                    resolved_at: None,
                    resolution_note: None,
                })?;
            }
        }

        Ok(summary)
    }

    /// Compares a model's expected schema against the warehouse schema and
    /// records the drift.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when persisting the drift row fails.
    pub fn check_schema_drift(
        &self,
        model_name: &ModelName,
        expected: &[ColumnContract],
        actual: &[ColumnContract],
    ) -> Result<SchemaDrift, StoreError> {
        let details = compare_schemas(expected, actual);
        let drift_type = classify_drift(&details);

        let drift = SchemaDrift {
            model_name: model_name.clone(),
            expected_columns_json: columns_json(expected)?,
            actual_columns_json: columns_json(actual)?,
            drift_type,
            drift_details_json: if details.is_empty() {
                None
            } else {
                Some(
                    serde_json::to_string(&details)
                        .map_err(|err| StoreError::Invalid(err.to_string()))?,
                )
            },
            resolved: drift_type == DriftKind::None,
        };
        self.store.record_drift(&drift)?;
        Ok(drift)
    }
}

// ============================================================================
// SECTION: Schema Comparison
// ============================================================================

/// One column-level drift observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftDetail {
    /// Drift classification for this column.
    pub drift_type: DriftKind,
    /// Column involved.
    pub column_name: String,
    /// Expected description.
    pub expected: String,
    /// Actual description.
    pub actual: String,
}

/// Compares expected columns against actual columns.
///
/// Matching is case-insensitive on the column name; types compare after
/// canonical normalization.
#[must_use]
pub fn compare_schemas(expected: &[ColumnContract], actual: &[ColumnContract]) -> Vec<DriftDetail> {
    let mut details = Vec::new();

    for column in expected {
        let found = actual
            .iter()
            .find(|candidate| candidate.name.eq_ignore_ascii_case(&column.name));
        match found {
            None => details.push(DriftDetail {
                drift_type: DriftKind::ColumnRemoved,
                column_name: column.name.clone(),
                expected: format!("{}: {}", column.name, column.data_type),
                actual: "(missing)".to_string(),
            }),
            Some(candidate) => {
                let expected_type = normalize_data_type(&column.data_type);
                let actual_type = normalize_data_type(&candidate.data_type);
                if expected_type != actual_type {
                    details.push(DriftDetail {
                        drift_type: DriftKind::TypeChanged,
                        column_name: column.name.clone(),
                        expected: column.data_type.clone(),
                        actual: candidate.data_type.clone(),
                    });
                }
            }
        }
    }

    for column in actual {
        let known = expected
            .iter()
            .any(|candidate| candidate.name.eq_ignore_ascii_case(&column.name));
        if !known {
            details.push(DriftDetail {
                drift_type: DriftKind::ColumnAdded,
                column_name: column.name.clone(),
                expected: "(not expected)".to_string(),
                actual: format!("{}: {}", column.name, column.data_type),
            });
        }
    }

    details.sort_by(|a, b| a.column_name.cmp(&b.column_name));
    details
}

/// Classifies the worst drift among the details, removed columns first.
fn classify_drift(details: &[DriftDetail]) -> DriftKind {
    if details.is_empty() {
        return DriftKind::None;
    }
    for kind in [DriftKind::ColumnRemoved, DriftKind::TypeChanged, DriftKind::ColumnAdded] {
        if details.iter().any(|detail| detail.drift_type == kind) {
            return kind;
        }
    }
    DriftKind::None
}

/// Serializes columns sorted by lowercased name.
fn columns_json(columns: &[ColumnContract]) -> Result<Option<String>, StoreError> {
    if columns.is_empty() {
        return Ok(None);
    }
    let mut sorted: Vec<&ColumnContract> = columns.iter().collect();
    sorted.sort_by_key(|column| column.name.to_lowercase());
    serde_json::to_string(&sorted)
        .map(Some)
        .map_err(|err| StoreError::Invalid(err.to_string()))
}
