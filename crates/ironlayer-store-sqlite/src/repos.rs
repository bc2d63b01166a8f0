// ironlayer-store-sqlite/src/repos.rs
// ============================================================================
// Module: Tenant Repositories
// Description: Tenant-bound implementations of the storage interfaces.
// Purpose: Enforce row-level tenant isolation over the shared connection.
// Dependencies: ironlayer-core, rusqlite, serde_json, chrono
// ============================================================================

//! ## Overview
//! A [`TenantRepository`] is constructed with a tenant identifier and
//! filters every statement on it. Complex records are stored as JSON in a
//! single column next to the key columns the queries need; this mirrors how
//! plans must round-trip byte-for-byte. Constraint violations map to
//! [`StoreError::Conflict`] so services can surface duplicate-entity
//! semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use chrono::DateTime;
use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Utc;
use ironlayer_core::AdvisoryLocker;
use ironlayer_core::BillingCustomer;
use ironlayer_core::Jti;
use ironlayer_core::LlmUsageRecord;
use ironlayer_core::MeteringEvent;
use ironlayer_core::MeteringStore;
use ironlayer_core::ModelDefinition;
use ironlayer_core::ModelName;
use ironlayer_core::ModelStore;
use ironlayer_core::Plan;
use ironlayer_core::PlanId;
use ironlayer_core::PlanStore;
use ironlayer_core::ReconciliationCheck;
use ironlayer_core::ReconciliationStore;
use ironlayer_core::RevocationStore;
use ironlayer_core::RunId;
use ironlayer_core::RunRecord;
use ironlayer_core::RunStats;
use ironlayer_core::RunStatus;
use ironlayer_core::RunStore;
use ironlayer_core::SchemaDrift;
use ironlayer_core::Snapshot;
use ironlayer_core::SnapshotStore;
use ironlayer_core::StoreError;
use ironlayer_core::TenantConfig;
use ironlayer_core::TenantId;
use ironlayer_core::TenantStore;
use ironlayer_core::TokenRevocation;
use ironlayer_core::Watermark;
use ironlayer_core::WatermarkStore;
use ironlayer_core::plan::Approval;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::store::DialectUpsert;

// ============================================================================
// SECTION: Repository
// ============================================================================

/// Tenant-bound repository over the shared connection.
#[derive(Clone)]
pub struct TenantRepository {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Upsert dialect strategy.
    dialect: DialectUpsert,
    /// Tenant every statement is scoped to.
    tenant_id: TenantId,
}

impl TenantRepository {
    /// Binds a repository to one tenant.
    #[must_use]
    pub fn new(
        connection: Arc<Mutex<Connection>>,
        dialect: DialectUpsert,
        tenant_id: TenantId,
    ) -> Self {
        Self { connection, dialect, tenant_id }
    }

    /// Returns the bound tenant.
    #[must_use]
    pub const fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Locks the shared connection.
    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Db("connection mutex poisoned".to_string()))
    }

    /// Creates a user row; used for seat accounting.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the user or email already
    /// exists within the tenant.
    pub fn create_user(&self, user_id: &str, email: &str, role: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (tenant_id, user_id, email, role, deactivated_at)
             VALUES (?1, ?2, ?3, ?4, NULL)",
            params![self.tenant_id.as_str(), user_id, email, role],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    /// Soft-deletes a user row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the user does not exist.
    pub fn deactivate_user(&self, user_id: &str, at: DateTime<Utc>) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE users SET deactivated_at = ?3
                 WHERE tenant_id = ?1 AND user_id = ?2",
                params![self.tenant_id.as_str(), user_id, fmt_ts(at)],
            )
            .map_err(map_db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Advisory Locking
// ============================================================================

impl AdvisoryLocker for TenantRepository {
    fn advisory_lock(&self, key: i64) -> Result<(), StoreError> {
        // SQLite serializes writers through the connection mutex already;
        // only the PostgreSQL dialect issues a real lock statement.
        if self.dialect.supports_advisory_locks() {
            let conn = self.conn()?;
            conn.execute("SELECT pg_advisory_xact_lock(?1)", [key])
                .map_err(map_db_err)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Model Store
// ============================================================================

impl ModelStore for TenantRepository {
    fn upsert_model(&self, model: &ModelDefinition) -> Result<(), StoreError> {
        let json = to_json(model)?;
        let clause = self
            .dialect
            .conflict_clause("tenant_id, name", "definition_json = excluded.definition_json, content_hash = excluded.content_hash");
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO models (tenant_id, name, definition_json, content_hash)
                 VALUES (?1, ?2, ?3, ?4) {clause}"
            ),
            params![
                self.tenant_id.as_str(),
                model.name.as_str(),
                json,
                model.content_hash
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn get_model(&self, name: &ModelName) -> Result<Option<ModelDefinition>, StoreError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT definition_json FROM models WHERE tenant_id = ?1 AND name = ?2",
                params![self.tenant_id.as_str(), name.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_err)?;
        json.map(|text| from_json(&text)).transpose()
    }

    fn list_models(&self) -> Result<Vec<ModelDefinition>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare("SELECT definition_json FROM models WHERE tenant_id = ?1 ORDER BY name")
            .map_err(map_db_err)?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str()], |row| row.get::<_, String>(0))
            .map_err(map_db_err)?;
        let mut models = Vec::new();
        for row in rows {
            models.push(from_json(&row.map_err(map_db_err)?)?);
        }
        Ok(models)
    }

    fn count_models(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM models WHERE tenant_id = ?1",
                params![self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .map_err(map_db_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Snapshot Store
// ============================================================================

impl SnapshotStore for TenantRepository {
    fn create_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let versions = to_json(&snapshot.model_versions)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO snapshots (tenant_id, snapshot_id, environment, git_sha, model_versions_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.tenant_id.as_str(),
                snapshot.snapshot_id,
                snapshot.environment,
                snapshot.git_sha,
                versions
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn versions_at(
        &self,
        environment: &str,
        git_sha: &str,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT model_versions_json FROM snapshots
                 WHERE tenant_id = ?1 AND environment = ?2 AND git_sha = ?3
                 ORDER BY rowid DESC LIMIT 1",
                params![self.tenant_id.as_str(), environment, git_sha],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_err)?;
        json.map(|text| from_json(&text)).transpose()
    }
}

// ============================================================================
// SECTION: Plan Store
// ============================================================================

impl PlanStore for TenantRepository {
    fn create_plan(&self, plan: &Plan) -> Result<(), StoreError> {
        let plan_json = to_json(plan)?;
        let approvals_json = to_json(&plan.approvals)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO plans (tenant_id, plan_id, plan_json, approvals_json, auto_approved)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.tenant_id.as_str(),
                plan.plan_id.as_str(),
                plan_json,
                approvals_json,
                i64::from(plan.auto_approved)
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn get_plan(&self, plan_id: &PlanId) -> Result<Option<Plan>, StoreError> {
        let conn = self.conn()?;
        let row: Option<(String, String, i64)> = conn
            .query_row(
                "SELECT plan_json, approvals_json, auto_approved FROM plans
                 WHERE tenant_id = ?1 AND plan_id = ?2",
                params![self.tenant_id.as_str(), plan_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(map_db_err)?;
        row.map(|(plan_json, approvals_json, auto_approved)| {
            let mut plan: Plan = from_json(&plan_json)?;
            plan.approvals = from_json(&approvals_json)?;
            plan.auto_approved = auto_approved != 0;
            Ok(plan)
        })
        .transpose()
    }

    fn list_recent_plans(&self, limit: u32) -> Result<Vec<Plan>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT plan_json, approvals_json, auto_approved FROM plans
                 WHERE tenant_id = ?1 ORDER BY rowid DESC LIMIT ?2",
            )
            .map_err(map_db_err)?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str(), limit], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(map_db_err)?;
        let mut plans = Vec::new();
        for row in rows {
            let (plan_json, approvals_json, auto_approved) = row.map_err(map_db_err)?;
            let mut plan: Plan = from_json(&plan_json)?;
            plan.approvals = from_json(&approvals_json)?;
            plan.auto_approved = auto_approved != 0;
            plans.push(plan);
        }
        Ok(plans)
    }

    fn append_approval(&self, plan_id: &PlanId, approval: &Approval) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let approvals_json: Option<String> = conn
            .query_row(
                "SELECT approvals_json FROM plans WHERE tenant_id = ?1 AND plan_id = ?2",
                params![self.tenant_id.as_str(), plan_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_err)?;
        let Some(approvals_json) = approvals_json else {
            return Err(StoreError::NotFound(format!("plan {plan_id}")));
        };
        let mut approvals: Vec<Approval> = from_json(&approvals_json)?;
        approvals.push(approval.clone());
        let updated = to_json(&approvals)?;
        conn.execute(
            "UPDATE plans SET approvals_json = ?3 WHERE tenant_id = ?1 AND plan_id = ?2",
            params![self.tenant_id.as_str(), plan_id.as_str(), updated],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn set_auto_approved(&self, plan_id: &PlanId, auto_approved: bool) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE plans SET auto_approved = ?3 WHERE tenant_id = ?1 AND plan_id = ?2",
                params![
                    self.tenant_id.as_str(),
                    plan_id.as_str(),
                    i64::from(auto_approved)
                ],
            )
            .map_err(map_db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("plan {plan_id}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Run Store
// ============================================================================

impl RunStore for TenantRepository {
    fn create_run(&self, run: &RunRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (tenant_id, run_id, plan_id, step_id, model_name, status,
                               started_at, finished_at, external_run_id, error_message,
                               logs_uri, cost_usd)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                self.tenant_id.as_str(),
                run.run_id.as_str(),
                run.plan_id.as_str(),
                run.step_id.as_str(),
                run.model_name.as_str(),
                status_label(run.status),
                run.started_at.map(fmt_ts),
                run.finished_at.map(fmt_ts),
                run.external_run_id,
                run.error_message,
                run.logs_uri,
                run.cost_usd
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn update_run_status(
        &self,
        run_id: &RunId,
        status: RunStatus,
        finished_at: Option<DateTime<Utc>>,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE runs SET status = ?3, finished_at = ?4, error_message = ?5
                 WHERE tenant_id = ?1 AND run_id = ?2",
                params![
                    self.tenant_id.as_str(),
                    run_id.as_str(),
                    status_label(status),
                    finished_at.map(fmt_ts),
                    error_message
                ],
            )
            .map_err(map_db_err)?;
        if updated == 0 {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        Ok(())
    }

    fn runs_for_plan(&self, plan_id: &PlanId) -> Result<Vec<RunRecord>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT run_id, plan_id, step_id, model_name, status, started_at, finished_at,
                        external_run_id, error_message, logs_uri, cost_usd
                 FROM runs WHERE tenant_id = ?1 AND plan_id = ?2 ORDER BY run_id",
            )
            .map_err(map_db_err)?;
        collect_runs(statement.query_map(params![self.tenant_id.as_str(), plan_id.as_str()], run_from_row))
    }

    fn recent_runs(&self, hours_back: u32) -> Result<Vec<RunRecord>, StoreError> {
        let cutoff = Utc::now() - chrono::Duration::hours(i64::from(hours_back));
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT run_id, plan_id, step_id, model_name, status, started_at, finished_at,
                        external_run_id, error_message, logs_uri, cost_usd
                 FROM runs
                 WHERE tenant_id = ?1 AND started_at IS NOT NULL AND started_at >= ?2
                 ORDER BY started_at DESC",
            )
            .map_err(map_db_err)?;
        collect_runs(statement.query_map(params![self.tenant_id.as_str(), fmt_ts(cutoff)], run_from_row))
    }

    fn run_stats(&self) -> Result<BTreeMap<String, RunStats>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT model_name,
                        AVG((julianday(finished_at) - julianday(started_at)) * 86400.0),
                        COUNT(*)
                 FROM runs
                 WHERE tenant_id = ?1 AND status = 'SUCCESS'
                   AND started_at IS NOT NULL AND finished_at IS NOT NULL
                 GROUP BY model_name",
            )
            .map_err(map_db_err)?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
            .map_err(map_db_err)?;
        let mut stats = BTreeMap::new();
        for row in rows {
            let (model, avg, count) = row.map_err(map_db_err)?;
            stats.insert(
                model,
                RunStats {
                    avg_runtime_seconds: avg,
                    run_count: u64::try_from(count).unwrap_or(0),
                },
            );
        }
        Ok(stats)
    }
}

// ============================================================================
// SECTION: Watermark Store
// ============================================================================

impl WatermarkStore for TenantRepository {
    fn watermarks(&self) -> Result<BTreeMap<String, Watermark>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT model_name, partition_start, partition_end
                 FROM watermarks WHERE tenant_id = ?1",
            )
            .map_err(map_db_err)?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(map_db_err)?;
        let mut watermarks = BTreeMap::new();
        for row in rows {
            let (model, start, end) = row.map_err(map_db_err)?;
            watermarks.insert(
                model.clone(),
                Watermark {
                    model_name: ModelName::new(model),
                    partition_start: parse_date(&start)?,
                    partition_end: parse_date(&end)?,
                },
            );
        }
        Ok(watermarks)
    }

    fn advance_watermark(
        &self,
        model_name: &ModelName,
        partition_start: NaiveDate,
        partition_end: NaiveDate,
    ) -> Result<(), StoreError> {
        let clause = self.dialect.conflict_clause(
            "tenant_id, model_name",
            "partition_start = MIN(watermarks.partition_start, excluded.partition_start),
             partition_end = MAX(watermarks.partition_end, excluded.partition_end)",
        );
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO watermarks (tenant_id, model_name, partition_start, partition_end)
                 VALUES (?1, ?2, ?3, ?4) {clause}"
            ),
            params![
                self.tenant_id.as_str(),
                model_name.as_str(),
                partition_start.to_string(),
                partition_end.to_string()
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Tenant Store
// ============================================================================

impl TenantStore for TenantRepository {
    fn tenant_config(&self) -> Result<Option<TenantConfig>, StoreError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT config_json FROM tenant_configs WHERE tenant_id = ?1",
                params![self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_err)?;
        json.map(|text| from_json(&text)).transpose()
    }

    fn upsert_tenant_config(&self, config: &TenantConfig) -> Result<(), StoreError> {
        let json = to_json(config)?;
        let clause = self
            .dialect
            .conflict_clause("tenant_id", "config_json = excluded.config_json, deactivated_at = excluded.deactivated_at");
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO tenant_configs (tenant_id, config_json, deactivated_at)
                 VALUES (?1, ?2, ?3) {clause}"
            ),
            params![
                self.tenant_id.as_str(),
                json,
                config.deactivated_at.map(fmt_ts)
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn deactivate_tenant(&self, at: DateTime<Utc>) -> Result<(), StoreError> {
        let existing = self
            .tenant_config()?
            .ok_or_else(|| StoreError::NotFound(format!("tenant config {}", self.tenant_id)))?;
        let mut config = existing;
        config.deactivated_at = Some(at);
        self.upsert_tenant_config(&config)
    }

    fn billing_customer(&self) -> Result<Option<BillingCustomer>, StoreError> {
        let conn = self.conn()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT customer_json FROM billing_customers WHERE tenant_id = ?1",
                params![self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_db_err)?;
        json.map(|text| from_json(&text)).transpose()
    }

    fn upsert_billing_customer(&self, customer: &BillingCustomer) -> Result<(), StoreError> {
        let json = to_json(customer)?;
        let clause = self
            .dialect
            .conflict_clause("tenant_id", "customer_json = excluded.customer_json");
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO billing_customers (tenant_id, customer_json)
                 VALUES (?1, ?2) {clause}"
            ),
            params![self.tenant_id.as_str(), json],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn count_active_users(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM users
                 WHERE tenant_id = ?1 AND deactivated_at IS NULL",
                params![self.tenant_id.as_str()],
                |row| row.get(0),
            )
            .map_err(map_db_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

// ============================================================================
// SECTION: Revocation Store
// ============================================================================

impl RevocationStore for TenantRepository {
    fn revoke(&self, revocation: &TokenRevocation) -> Result<(), StoreError> {
        let clause = self.dialect.conflict_clause(
            "tenant_id, jti",
            "reason = excluded.reason, revoked_at = excluded.revoked_at,
             expires_at = excluded.expires_at",
        );
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO token_revocations (tenant_id, jti, reason, revoked_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5) {clause}"
            ),
            params![
                self.tenant_id.as_str(),
                revocation.jti.as_str(),
                revocation.reason,
                fmt_ts(revocation.revoked_at),
                fmt_ts(revocation.expires_at)
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn is_revoked(&self, jti: &Jti, now: DateTime<Utc>) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM token_revocations
                 WHERE tenant_id = ?1 AND jti = ?2 AND expires_at > ?3",
                params![self.tenant_id.as_str(), jti.as_str(), fmt_ts(now)],
                |row| row.get(0),
            )
            .map_err(map_db_err)?;
        Ok(count > 0)
    }
}

// ============================================================================
// SECTION: Metering Store
// ============================================================================

impl MeteringStore for TenantRepository {
    fn insert_events(&self, events: &[MeteringEvent]) -> Result<(), StoreError> {
        let conn = self.conn()?;
        for event in events {
            let metadata = to_json(&event.metadata)?;
            conn.execute(
                "INSERT INTO metering_events
                     (tenant_id, event_id, event_type, quantity, metadata_json, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    self.tenant_id.as_str(),
                    event.event_id,
                    event.event_type.as_str(),
                    i64::try_from(event.quantity).unwrap_or(i64::MAX),
                    metadata,
                    fmt_ts(event.timestamp)
                ],
            )
            .map_err(map_db_err)?;
        }
        Ok(())
    }

    fn record_llm_usage(&self, usage: &LlmUsageRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO llm_usage (tenant_id, usage_date, cost_usd, call_type)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.tenant_id.as_str(),
                usage.usage_date.to_string(),
                usage.cost_usd,
                usage.call_type
            ],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn monthly_event_count(&self, event_type: &str, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let (month_start, month_end) = month_window(now)?;
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM metering_events
                 WHERE tenant_id = ?1 AND event_type = ?2
                   AND timestamp >= ?3 AND timestamp < ?4",
                params![self.tenant_id.as_str(), event_type, month_start, month_end],
                |row| row.get(0),
            )
            .map_err(map_db_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn llm_cost_on(&self, date: NaiveDate) -> Result<f64, StoreError> {
        let conn = self.conn()?;
        let cost: Option<f64> = conn
            .query_row(
                "SELECT SUM(cost_usd) FROM llm_usage
                 WHERE tenant_id = ?1 AND usage_date = ?2",
                params![self.tenant_id.as_str(), date.to_string()],
                |row| row.get(0),
            )
            .map_err(map_db_err)?;
        Ok(cost.unwrap_or(0.0))
    }

    fn llm_cost_month_to_date(&self, date: NaiveDate) -> Result<f64, StoreError> {
        let month_start = date
            .with_day(1)
            .ok_or_else(|| StoreError::Invalid(format!("invalid date {date}")))?;
        let conn = self.conn()?;
        let cost: Option<f64> = conn
            .query_row(
                "SELECT SUM(cost_usd) FROM llm_usage
                 WHERE tenant_id = ?1 AND usage_date >= ?2 AND usage_date <= ?3",
                params![
                    self.tenant_id.as_str(),
                    month_start.to_string(),
                    date.to_string()
                ],
                |row| row.get(0),
            )
            .map_err(map_db_err)?;
        Ok(cost.unwrap_or(0.0))
    }
}

// ============================================================================
// SECTION: Reconciliation Store
// ============================================================================

impl ReconciliationStore for TenantRepository {
    fn record_check(&self, check: &ReconciliationCheck) -> Result<(), StoreError> {
        let json = to_json(check)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO reconciliation_checks (tenant_id, check_json, resolved)
             VALUES (?1, ?2, ?3)",
            params![self.tenant_id.as_str(), json, i64::from(check.resolved)],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn unresolved_checks(&self, limit: u32) -> Result<Vec<ReconciliationCheck>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT check_json FROM reconciliation_checks
                 WHERE tenant_id = ?1 AND resolved = 0 ORDER BY id LIMIT ?2",
            )
            .map_err(map_db_err)?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str(), limit], |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_db_err)?;
        let mut checks = Vec::new();
        for row in rows {
            checks.push(from_json(&row.map_err(map_db_err)?)?);
        }
        Ok(checks)
    }

    fn record_drift(&self, drift: &SchemaDrift) -> Result<(), StoreError> {
        let json = to_json(drift)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO schema_drift (tenant_id, drift_json, resolved)
             VALUES (?1, ?2, ?3)",
            params![self.tenant_id.as_str(), json, i64::from(drift.resolved)],
        )
        .map_err(map_db_err)?;
        Ok(())
    }

    fn unresolved_drift(&self, limit: u32) -> Result<Vec<SchemaDrift>, StoreError> {
        let conn = self.conn()?;
        let mut statement = conn
            .prepare(
                "SELECT drift_json FROM schema_drift
                 WHERE tenant_id = ?1 AND resolved = 0 ORDER BY id LIMIT ?2",
            )
            .map_err(map_db_err)?;
        let rows = statement
            .query_map(params![self.tenant_id.as_str(), limit], |row| {
                row.get::<_, String>(0)
            })
            .map_err(map_db_err)?;
        let mut drifts = Vec::new();
        for row in rows {
            drifts.push(from_json(&row.map_err(map_db_err)?)?);
        }
        Ok(drifts)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Maps a run row into a record.
fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRun> {
    Ok(RawRun {
        run_id: row.get(0)?,
        plan_id: row.get(1)?,
        step_id: row.get(2)?,
        model_name: row.get(3)?,
        status: row.get(4)?,
        started_at: row.get(5)?,
        finished_at: row.get(6)?,
        external_run_id: row.get(7)?,
        error_message: row.get(8)?,
        logs_uri: row.get(9)?,
        cost_usd: row.get(10)?,
    })
}

/// Intermediate row shape before timestamp parsing.
struct RawRun {
    /// Run identifier.
    run_id: String,
    /// Plan identifier.
    plan_id: String,
    /// Step identifier.
    step_id: String,
    /// Model name.
    model_name: String,
    /// Status label.
    status: String,
    /// Start time text.
    started_at: Option<String>,
    /// Finish time text.
    finished_at: Option<String>,
    /// Backend run identifier.
    external_run_id: Option<String>,
    /// Error message.
    error_message: Option<String>,
    /// Log URI.
    logs_uri: Option<String>,
    /// Observed cost.
    cost_usd: Option<f64>,
}

/// Collects raw rows into run records.
fn collect_runs(
    rows: rusqlite::Result<rusqlite::MappedRows<'_, impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<RawRun>>>,
) -> Result<Vec<RunRecord>, StoreError> {
    let rows = rows.map_err(map_db_err)?;
    let mut runs = Vec::new();
    for row in rows {
        let raw = row.map_err(map_db_err)?;
        runs.push(RunRecord {
            run_id: RunId::new(raw.run_id),
            plan_id: PlanId::new(raw.plan_id),
            step_id: ironlayer_core::StepId::new(raw.step_id),
            model_name: ModelName::new(raw.model_name),
            status: parse_status(&raw.status)?,
            started_at: raw.started_at.as_deref().map(parse_ts).transpose()?,
            finished_at: raw.finished_at.as_deref().map(parse_ts).transpose()?,
            external_run_id: raw.external_run_id,
            error_message: raw.error_message,
            logs_uri: raw.logs_uri,
            cost_usd: raw.cost_usd,
        });
    }
    Ok(runs)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serializes a value to JSON text.
fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Deserializes JSON text.
fn from_json<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, StoreError> {
    serde_json::from_str(text).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Formats a timestamp as RFC 3339 in UTC with millisecond precision, the
/// most fractional digits `SQLite`'s date functions parse.
fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp.
fn parse_ts(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Invalid(format!("bad timestamp '{text}': {err}")))
}

/// Parses a calendar date.
fn parse_date(text: &str) -> Result<NaiveDate, StoreError> {
    text.parse()
        .map_err(|_| StoreError::Invalid(format!("bad date '{text}'")))
}

/// Returns the stable label for a run status.
const fn status_label(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Pending => "PENDING",
        RunStatus::Running => "RUNNING",
        RunStatus::Success => "SUCCESS",
        RunStatus::Fail => "FAIL",
        RunStatus::Cancelled => "CANCELLED",
    }
}

/// Parses a run status label.
fn parse_status(label: &str) -> Result<RunStatus, StoreError> {
    match label {
        "PENDING" => Ok(RunStatus::Pending),
        "RUNNING" => Ok(RunStatus::Running),
        "SUCCESS" => Ok(RunStatus::Success),
        "FAIL" => Ok(RunStatus::Fail),
        "CANCELLED" => Ok(RunStatus::Cancelled),
        other => Err(StoreError::Invalid(format!("unknown run status '{other}'"))),
    }
}

/// Returns the RFC 3339 bounds of the calendar month containing `now`.
fn month_window(now: DateTime<Utc>) -> Result<(String, String), StoreError> {
    let date = now.date_naive();
    let month_start = date
        .with_day(1)
        .ok_or_else(|| StoreError::Invalid(format!("invalid date {date}")))?;
    let next_month = if month_start.month() == 12 {
        NaiveDate::from_ymd_opt(month_start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(month_start.year(), month_start.month() + 1, 1)
    }
    .ok_or_else(|| StoreError::Invalid(format!("invalid month for {date}")))?;
    // Bounds use the same fractional-seconds format as stored timestamps so
    // lexicographic comparison is exact at the month boundary.
    Ok((
        format!("{month_start}T00:00:00.000Z"),
        format!("{next_month}T00:00:00.000Z"),
    ))
}

/// Maps rusqlite errors into store errors, detecting constraint conflicts.
fn map_db_err(error: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, ref message) = error
        && failure.code == ErrorCode::ConstraintViolation
    {
        return StoreError::Conflict(
            message
                .clone()
                .unwrap_or_else(|| "constraint violation".to_string()),
        );
    }
    StoreError::Db(error.to_string())
}
