// ironlayer-core/src/core/mod.rs
// ============================================================================
// Module: IronLayer Core Types
// Description: Canonical data model shared across the control plane.
// Purpose: Group identifier, model, plan, run, tenant, and metering types.
// Dependencies: crate::core submodules
// ============================================================================

//! ## Overview
//! Core data model for IronLayer. Every persisted entity lives here so that
//! repositories, services, and the planner agree on one set of types.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod hashing;
pub mod identifiers;
pub mod metering;
pub mod model;
pub mod plan;
pub mod recon;
pub mod run;
pub mod tenant;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use hashing::HashError;
pub use hashing::canonical_json_bytes;
pub use hashing::compute_deterministic_id;
pub use hashing::compute_snapshot_id;
pub use hashing::hash_bytes;
pub use hashing::hash_canonical_json;
pub use identifiers::Jti;
pub use identifiers::ModelName;
pub use identifiers::PlanId;
pub use identifiers::RunId;
pub use identifiers::StepId;
pub use identifiers::TenantId;
pub use metering::MeteringEvent;
pub use metering::MeteringEventKind;
pub use model::ColumnContract;
pub use model::ContractMode;
pub use model::Materialization;
pub use model::ModelDefinition;
pub use model::ModelKind;
pub use model::ModelTest;
pub use model::TestSeverity;
pub use model::TestType;
pub use plan::Approval;
pub use plan::InputRange;
pub use plan::Plan;
pub use plan::PlanStep;
pub use plan::PlanSummary;
pub use plan::RunType;
pub use recon::DiscrepancyKind;
pub use recon::DriftKind;
pub use recon::ReconciliationCheck;
pub use recon::SchemaDrift;
pub use recon::TokenRevocation;
pub use run::RunRecord;
pub use run::RunStats;
pub use run::RunStatus;
pub use run::Watermark;
pub use tenant::BillingCustomer;
pub use tenant::LlmUsageRecord;
pub use tenant::PlanTier;
pub use tenant::Snapshot;
pub use tenant::TenantConfig;
