// ironlayer-config/src/lib.rs
// ============================================================================
// Module: IronLayer Config Library
// Description: Public API surface for IronLayer configuration.
// Purpose: Expose config structs, environment resolution, and validation.
// Dependencies: crate::config
// ============================================================================

//! ## Overview
//! Configuration for the IronLayer control plane. Every service has an
//! explicit config struct: unknown fields fail at parse time, defaults are
//! declared per field, and `validate()` reports every violation instead of
//! stopping at the first.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::AppConfig;
pub use config::AuthMode;
pub use config::AuthSettings;
pub use config::ConfigError;
pub use config::ExecutorSettings;
pub use config::GateSettings;
pub use config::KmsKeyKind;
pub use config::LicenseSettings;
pub use config::MeteringSettings;
pub use config::RevocationSettings;
pub use config::SchedulerSettings;
