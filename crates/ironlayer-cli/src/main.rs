// ironlayer-cli/src/main.rs
// ============================================================================
// Module: IronLayer CLI Entry Point
// Description: Command dispatcher for loading, diffing, and planning.
// Purpose: Provide a local operator surface over the planning engine.
// Dependencies: clap, ironlayer-core, ironlayer-gate, ironlayer-store-sqlite
// ============================================================================

//! ## Overview
//! The IronLayer CLI drives the deterministic planning pipeline from the
//! filesystem: load a models directory, diff two revisions, generate a
//! canonical plan, simulate what-if changes, trace column lineage, and vet
//! model SQL with the safety guard. Output is JSON on stdout; diagnostics
//! go through tracing on stderr.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::NaiveDate;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use ironlayer_config::GateSettings;
use ironlayer_core::ChangeDescriptor;
use ironlayer_core::ModelDag;
use ironlayer_core::ModelDefinition;
use ironlayer_core::ModelLoader;
use ironlayer_core::PlannerConfig;
use ironlayer_core::PlannerRequest;
use ironlayer_core::TenantId;
use ironlayer_core::analyze_lineage;
use ironlayer_core::diff_snapshots;
use ironlayer_core::generate_plan;
use ironlayer_core::has_critical;
use ironlayer_core::scan_sql;
use ironlayer_core::trace_column;
use ironlayer_core::validate_contracts_batch;
use ironlayer_gate::PlanGate;
use ironlayer_gate::validate_git_sha;
use ironlayer_store_sqlite::SqliteStore;
use ironlayer_store_sqlite::SqliteStoreConfig;
use thiserror::Error;
use tracing::error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "ironlayer", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load a models directory and print the definitions.
    Load(LoadCommand),
    /// Diff two models directories.
    Diff(DiffCommand),
    /// Generate a canonical plan between two revisions.
    Plan(PlanCommand),
    /// Simulate the impact of a proposed change.
    Impact(ImpactCommand),
    /// Trace column lineage for one model.
    Lineage(LineageCommand),
    /// Vet model SQL with the unsafe-statement guard.
    CheckSql(CheckSqlCommand),
}

/// Arguments for `load`.
#[derive(Args, Debug)]
struct LoadCommand {
    /// Models directory.
    models_dir: PathBuf,
}

/// Arguments for `diff`.
#[derive(Args, Debug)]
struct DiffCommand {
    /// Base revision's models directory.
    base_dir: PathBuf,
    /// Target revision's models directory.
    target_dir: PathBuf,
}

/// Arguments for `plan`.
#[derive(Args, Debug)]
struct PlanCommand {
    /// Base revision's models directory.
    base_dir: PathBuf,
    /// Target revision's models directory.
    target_dir: PathBuf,
    /// Base git revision (4-40 hex characters).
    #[arg(long)]
    base: String,
    /// Target git revision (4-40 hex characters).
    #[arg(long)]
    target: String,
    /// Calendar date the plan is computed against (YYYY-MM-DD).
    #[arg(long)]
    as_of_date: NaiveDate,
    /// Lookback window for incremental models without watermarks.
    #[arg(long, default_value_t = 30)]
    lookback_days: u32,
    /// Optional SQLite store; when set the plan is persisted through the
    /// approval gate for this tenant.
    #[arg(long)]
    store: Option<PathBuf>,
    /// Tenant the persisted plan belongs to.
    #[arg(long, default_value = "default")]
    tenant: String,
}

/// What-if change kinds.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum ChangeKind {
    /// Remove a column.
    RemoveColumn,
    /// Add a column.
    AddColumn,
    /// Rename a column.
    RenameColumn,
    /// Change a column's type.
    TypeChange,
    /// Remove a whole model.
    RemoveModel,
}

/// Arguments for `impact`.
#[derive(Args, Debug)]
struct ImpactCommand {
    /// Models directory.
    models_dir: PathBuf,
    /// Change kind to simulate.
    #[arg(long, value_enum)]
    kind: ChangeKind,
    /// Model the change originates on.
    #[arg(long)]
    model: String,
    /// Column involved, where the kind takes one.
    #[arg(long)]
    column: Option<String>,
    /// New column name for renames.
    #[arg(long)]
    new_column: Option<String>,
    /// Current type for type changes.
    #[arg(long)]
    old_type: Option<String>,
    /// Proposed type for type changes.
    #[arg(long)]
    new_type: Option<String>,
}

/// Arguments for `lineage`.
#[derive(Args, Debug)]
struct LineageCommand {
    /// Models directory.
    models_dir: PathBuf,
    /// Model to analyze.
    #[arg(long)]
    model: String,
    /// When set, trace this column across upstream models.
    #[arg(long)]
    column: Option<String>,
}

/// Arguments for `check-sql`.
#[derive(Args, Debug)]
struct CheckSqlCommand {
    /// SQL file to vet.
    sql_file: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI failures surfaced to the operator.
#[derive(Debug, Error)]
enum CliError {
    /// A command failed; the message was already composed.
    #[error("{0}")]
    Command(String),
}

impl CliError {
    /// Wraps any displayable error.
    fn from_err(err: impl std::fmt::Display) -> Self {
        Self::Command(err.to_string())
    }
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point.
fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Dispatches one subcommand.
fn dispatch(command: Commands) -> Result<ExitCode, CliError> {
    match command {
        Commands::Load(args) => run_load(&args),
        Commands::Diff(args) => run_diff(&args),
        Commands::Plan(args) => run_plan(&args),
        Commands::Impact(args) => run_impact(&args),
        Commands::Lineage(args) => run_lineage(&args),
        Commands::CheckSql(args) => run_check_sql(&args),
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Loads and prints every model definition.
fn run_load(args: &LoadCommand) -> Result<ExitCode, CliError> {
    let models = load_models(&args.models_dir)?;
    for model in models.values() {
        print_json(model)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Diffs two models directories.
fn run_diff(args: &DiffCommand) -> Result<ExitCode, CliError> {
    let base = load_models(&args.base_dir)?;
    let target = load_models(&args.target_dir)?;
    let diff = diff_snapshots(
        &version_map(&base),
        &version_map(&target),
        &sql_map(&base),
        &sql_map(&target),
    );
    print_json(&diff)?;
    Ok(ExitCode::SUCCESS)
}

/// Generates (and optionally persists) a canonical plan.
fn run_plan(args: &PlanCommand) -> Result<ExitCode, CliError> {
    validate_git_sha(&args.base).map_err(CliError::from_err)?;
    validate_git_sha(&args.target).map_err(CliError::from_err)?;

    let base = load_models(&args.base_dir)?;
    let target = load_models(&args.target_dir)?;

    let diff = diff_snapshots(
        &version_map(&base),
        &version_map(&target),
        &sql_map(&base),
        &sql_map(&target),
    );

    let dag = ModelDag::build(&target).map_err(CliError::from_err)?;

    let guarded: Vec<String> = target
        .values()
        .filter(|model| has_critical(&scan_sql(&model.raw_sql)))
        .map(|model| model.name.as_str().to_string())
        .collect();
    if !guarded.is_empty() {
        return Err(CliError::Command(format!(
            "unsafe SQL detected in models: {}",
            guarded.join(", ")
        )));
    }

    let target_models: Vec<ModelDefinition> = target.values().cloned().collect();
    let contracts = validate_contracts_batch(
        &target_models,
        &BTreeMap::new(),
        &BTreeMap::new(),
        &BTreeMap::new(),
    );

    let plan = generate_plan(PlannerRequest {
        models: &target,
        diff: &diff,
        dag: &dag,
        watermarks: &BTreeMap::new(),
        run_stats: &BTreeMap::new(),
        base: &args.base,
        target: &args.target,
        as_of_date: Some(args.as_of_date),
        contracts: Some(&contracts),
        config: PlannerConfig {
            default_lookback_days: args.lookback_days,
            ..PlannerConfig::default()
        },
    })
    .map_err(CliError::from_err)?;

    let plan = if let Some(store_path) = &args.store {
        let store = SqliteStore::open(&SqliteStoreConfig::new(store_path))
            .map_err(CliError::from_err)?;
        let repo = store.for_tenant(TenantId::new(args.tenant.clone()));
        PlanGate::new(GateSettings::default())
            .persist_plan(&repo, plan)
            .map_err(CliError::from_err)?
    } else {
        plan
    };

    let canonical = plan.canonical_json().map_err(CliError::from_err)?;
    let text = String::from_utf8(canonical)
        .map_err(|_| CliError::Command("plan json was not utf-8".to_string()))?;
    write_stdout_line(&text)?;
    Ok(ExitCode::SUCCESS)
}

/// Simulates a proposed change.
fn run_impact(args: &ImpactCommand) -> Result<ExitCode, CliError> {
    let models = load_models(&args.models_dir)?;
    let dag = ModelDag::build(&models).map_err(CliError::from_err)?;
    let change = build_change(args)?;
    let report = ironlayer_core::simulate_change(&models, &dag, &change);
    print_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Analyzes or traces column lineage.
fn run_lineage(args: &LineageCommand) -> Result<ExitCode, CliError> {
    let models = load_models(&args.models_dir)?;
    let model = models
        .get(&args.model)
        .ok_or_else(|| CliError::Command(format!("unknown model '{}'", args.model)))?;

    if let Some(column) = &args.column {
        let hops =
            trace_column(&models, &args.model, column, None).map_err(CliError::from_err)?;
        print_json(&hops)?;
    } else {
        let lineage = analyze_lineage(&model.raw_sql, None).map_err(CliError::from_err)?;
        print_json(&lineage)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Vets one SQL file; critical findings fail the command.
fn run_check_sql(args: &CheckSqlCommand) -> Result<ExitCode, CliError> {
    let sql = std::fs::read_to_string(&args.sql_file).map_err(CliError::from_err)?;
    let findings = scan_sql(&sql);
    print_json(&findings)?;
    if has_critical(&findings) {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads a models directory.
fn load_models(dir: &PathBuf) -> Result<BTreeMap<String, ModelDefinition>, CliError> {
    ModelLoader::new(dir).load_all().map_err(CliError::from_err)
}

/// Extracts the name-to-hash map of a model set.
fn version_map(models: &BTreeMap<String, ModelDefinition>) -> BTreeMap<String, String> {
    models
        .iter()
        .map(|(name, model)| (name.clone(), model.content_hash.clone()))
        .collect()
}

/// Extracts the name-to-SQL map of a model set.
fn sql_map(models: &BTreeMap<String, ModelDefinition>) -> BTreeMap<String, String> {
    models
        .iter()
        .map(|(name, model)| (name.clone(), model.raw_sql.clone()))
        .collect()
}

/// Builds a change descriptor from the impact arguments.
fn build_change(args: &ImpactCommand) -> Result<ChangeDescriptor, CliError> {
    let column = || {
        args.column
            .clone()
            .ok_or_else(|| CliError::Command("--column is required for this kind".to_string()))
    };
    Ok(match args.kind {
        ChangeKind::RemoveColumn => ChangeDescriptor::RemoveColumn {
            model: args.model.clone(),
            column: column()?,
        },
        ChangeKind::AddColumn => ChangeDescriptor::AddColumn {
            model: args.model.clone(),
            column: column()?,
        },
        ChangeKind::RenameColumn => ChangeDescriptor::RenameColumn {
            model: args.model.clone(),
            old_column: column()?,
            new_column: args.new_column.clone().ok_or_else(|| {
                CliError::Command("--new-column is required for renames".to_string())
            })?,
        },
        ChangeKind::TypeChange => ChangeDescriptor::TypeChange {
            model: args.model.clone(),
            column: column()?,
            old_type: args.old_type.clone().ok_or_else(|| {
                CliError::Command("--old-type is required for type changes".to_string())
            })?,
            new_type: args.new_type.clone().ok_or_else(|| {
                CliError::Command("--new-type is required for type changes".to_string())
            })?,
        },
        ChangeKind::RemoveModel => ChangeDescriptor::RemoveModel { model: args.model.clone() },
    })
}

/// Serializes a value as one JSON line on stdout.
fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string(value).map_err(CliError::from_err)?;
    write_stdout_line(&text)
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> Result<(), CliError> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(CliError::from_err)
}
