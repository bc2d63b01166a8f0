// ironlayer-recon/src/lib.rs
// ============================================================================
// Module: IronLayer Recon Library
// Description: Public API surface for execution and reconciliation.
// Purpose: Expose the executor seam, cron, service, and scheduler.
// Dependencies: crate::{executor, cron, service, scheduler}
// ============================================================================

//! ## Overview
//! The read-back half of the control plane: an abstract executor interface
//! with bounded polling and transient retry, a deliberately narrow cron
//! grammar, the reconciliation service that classifies discrepancies
//! between recorded and actual run state, and the single cooperative
//! scheduler task that drives periodic work.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod cron;
pub mod executor;
pub mod scheduler;
pub mod service;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cron::CronError;
pub use cron::compute_next_run;
pub use executor::ExecutorError;
pub use executor::PlanExecutor;
pub use executor::poll_until_terminal;
pub use executor::retry_transient;
pub use scheduler::Schedule;
pub use scheduler::ScheduledJob;
pub use scheduler::Scheduler;
pub use service::DriftDetail;
pub use service::ReconciliationService;
pub use service::ReconciliationSummary;
pub use service::compare_schemas;
