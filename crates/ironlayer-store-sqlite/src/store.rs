// ironlayer-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Store
// Description: Connection management, schema, and dialect-aware upserts.
// Purpose: Own the database handle behind the tenant-bound repositories.
// Dependencies: ironlayer-core, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! The store opens one `SQLite` connection (WAL by default), initializes the
//! schema, and hands out tenant-bound repositories sharing the connection
//! behind a mutex. Upsert statements go through a [`DialectUpsert`] strategy
//! selected at open time so a PostgreSQL deployment can swap the conflict
//! clause without touching repository code. Advisory locks are a no-op on
//! `SQLite`; the PostgreSQL strategy names the seam.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use ironlayer_core::StoreError;
use ironlayer_core::TenantId;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use thiserror::Error;

use crate::repos::TenantRepository;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the `SQLite` store.
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the database file; `:memory:` opens an in-memory database.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Builds a config with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS }
    }

    /// Builds a config for an in-memory database (tests).
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }
}

// ============================================================================
// SECTION: Dialect Upsert
// ============================================================================

/// Upsert strategy selected at session bind time.
///
/// Both supported dialects speak `ON CONFLICT`, but PostgreSQL requires the
/// conflict target to be spelled and supports `EXCLUDED` differently enough
/// that the clause is built here rather than inline in repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialectUpsert {
    /// `SQLite` `ON CONFLICT (...) DO UPDATE SET`.
    #[default]
    Sqlite,
    /// PostgreSQL `ON CONFLICT (...) DO UPDATE SET`.
    Postgres,
}

impl DialectUpsert {
    /// Renders the conflict clause for the given key columns and update
    /// assignments.
    #[must_use]
    pub fn conflict_clause(self, key_columns: &str, assignments: &str) -> String {
        match self {
            Self::Sqlite | Self::Postgres => {
                format!("ON CONFLICT ({key_columns}) DO UPDATE SET {assignments}")
            }
        }
    }

    /// Returns true when the dialect supports transaction-scoped advisory
    /// locks.
    #[must_use]
    pub const fn supports_advisory_locks(self) -> bool {
        matches!(self, Self::Postgres)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version recorded in the database.
        found: i64,
        /// Version this build expects.
        expected: i64,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Db(message),
            SqliteStoreError::VersionMismatch { found, expected } => {
                Self::Invalid(format!("schema version {found} != {expected}"))
            }
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed store handing out tenant-bound repositories.
#[derive(Clone)]
pub struct SqliteStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Upsert dialect strategy.
    dialect: DialectUpsert,
}

impl SqliteStore {
    /// Opens the store and initializes the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// migrated.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        let connection = if config.path.as_os_str() == ":memory:" {
            Connection::open_in_memory().map_err(db_err)?
        } else {
            if let Some(parent) = config.path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)
                    .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
            }
            Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            )
            .map_err(db_err)?
        };

        connection
            .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(db_err)?;
        connection
            .pragma_update(None, "journal_mode", "wal")
            .or_else(|_| connection.pragma_update(None, "journal_mode", "memory"))
            .map_err(db_err)?;
        connection
            .pragma_update(None, "foreign_keys", "on")
            .map_err(db_err)?;

        initialize_schema(&connection)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            dialect: DialectUpsert::Sqlite,
        })
    }

    /// Binds a repository to one tenant.
    ///
    /// Every query issued through the returned repository filters on this
    /// tenant; there is no API to read another tenant's rows.
    #[must_use]
    pub fn for_tenant(&self, tenant_id: TenantId) -> TenantRepository {
        TenantRepository::new(Arc::clone(&self.connection), self.dialect, tenant_id)
    }

    /// Returns the active upsert dialect.
    #[must_use]
    pub const fn dialect(&self) -> DialectUpsert {
        self.dialect
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates all tables and records the schema version.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_meta (
                 id INTEGER PRIMARY KEY CHECK (id = 1),
                 version INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS models (
                 tenant_id TEXT NOT NULL,
                 name TEXT NOT NULL,
                 definition_json TEXT NOT NULL,
                 content_hash TEXT NOT NULL,
                 PRIMARY KEY (tenant_id, name)
             );
             CREATE TABLE IF NOT EXISTS snapshots (
                 tenant_id TEXT NOT NULL,
                 snapshot_id TEXT NOT NULL,
                 environment TEXT NOT NULL,
                 git_sha TEXT NOT NULL,
                 model_versions_json TEXT NOT NULL,
                 PRIMARY KEY (tenant_id, snapshot_id)
             );
             CREATE TABLE IF NOT EXISTS plans (
                 tenant_id TEXT NOT NULL,
                 plan_id TEXT NOT NULL,
                 plan_json TEXT NOT NULL,
                 approvals_json TEXT NOT NULL,
                 auto_approved INTEGER NOT NULL,
                 PRIMARY KEY (tenant_id, plan_id)
             );
             CREATE TABLE IF NOT EXISTS runs (
                 tenant_id TEXT NOT NULL,
                 run_id TEXT NOT NULL,
                 plan_id TEXT NOT NULL,
                 step_id TEXT NOT NULL,
                 model_name TEXT NOT NULL,
                 status TEXT NOT NULL,
                 started_at TEXT,
                 finished_at TEXT,
                 external_run_id TEXT,
                 error_message TEXT,
                 logs_uri TEXT,
                 cost_usd REAL,
                 PRIMARY KEY (tenant_id, run_id)
             );
             CREATE TABLE IF NOT EXISTS watermarks (
                 tenant_id TEXT NOT NULL,
                 model_name TEXT NOT NULL,
                 partition_start TEXT NOT NULL,
                 partition_end TEXT NOT NULL,
                 PRIMARY KEY (tenant_id, model_name)
             );
             CREATE TABLE IF NOT EXISTS tenant_configs (
                 tenant_id TEXT PRIMARY KEY,
                 config_json TEXT NOT NULL,
                 deactivated_at TEXT
             );
             CREATE TABLE IF NOT EXISTS billing_customers (
                 tenant_id TEXT PRIMARY KEY,
                 customer_json TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS users (
                 tenant_id TEXT NOT NULL,
                 user_id TEXT NOT NULL,
                 email TEXT NOT NULL,
                 role TEXT NOT NULL,
                 deactivated_at TEXT,
                 PRIMARY KEY (tenant_id, user_id)
             );
             CREATE UNIQUE INDEX IF NOT EXISTS users_email
                 ON users (tenant_id, email);
             CREATE TABLE IF NOT EXISTS token_revocations (
                 tenant_id TEXT NOT NULL,
                 jti TEXT NOT NULL,
                 reason TEXT NOT NULL,
                 revoked_at TEXT NOT NULL,
                 expires_at TEXT NOT NULL,
                 PRIMARY KEY (tenant_id, jti)
             );
             CREATE TABLE IF NOT EXISTS metering_events (
                 tenant_id TEXT NOT NULL,
                 event_id TEXT NOT NULL,
                 event_type TEXT NOT NULL,
                 quantity INTEGER NOT NULL,
                 metadata_json TEXT NOT NULL,
                 timestamp TEXT NOT NULL,
                 PRIMARY KEY (tenant_id, event_id)
             );
             CREATE INDEX IF NOT EXISTS metering_events_window
                 ON metering_events (tenant_id, event_type, timestamp);
             CREATE TABLE IF NOT EXISTS llm_usage (
                 tenant_id TEXT NOT NULL,
                 usage_date TEXT NOT NULL,
                 cost_usd REAL NOT NULL,
                 call_type TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS llm_usage_window
                 ON llm_usage (tenant_id, usage_date);
             CREATE TABLE IF NOT EXISTS reconciliation_checks (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 tenant_id TEXT NOT NULL,
                 check_json TEXT NOT NULL,
                 resolved INTEGER NOT NULL
             );
             CREATE TABLE IF NOT EXISTS schema_drift (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 tenant_id TEXT NOT NULL,
                 drift_json TEXT NOT NULL,
                 resolved INTEGER NOT NULL
             );",
        )
        .map_err(db_err)?;

    let existing: Option<i64> = connection
        .query_row("SELECT version FROM schema_meta WHERE id = 1", [], |row| row.get(0))
        .map(Some)
        .or_else(|err| match err {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(db_err(other)),
        })?;

    match existing {
        None => {
            connection
                .execute(
                    "INSERT INTO schema_meta (id, version) VALUES (1, ?1)",
                    [SCHEMA_VERSION],
                )
                .map_err(db_err)?;
            Ok(())
        }
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(SqliteStoreError::VersionMismatch {
            found: version,
            expected: SCHEMA_VERSION,
        }),
    }
}

/// Maps a rusqlite error into a store error.
fn db_err(error: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(error.to_string())
}
