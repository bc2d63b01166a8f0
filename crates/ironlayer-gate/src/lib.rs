// ironlayer-gate/src/lib.rs
// ============================================================================
// Module: IronLayer Gate Library
// Description: Public API surface for admission and approval gating.
// Purpose: Expose RBAC, tokens, revocation, quota, metering, and approvals.
// Dependencies: crate::{rbac, token, revocation, quota, metering, approval}
// ============================================================================

//! ## Overview
//! Everything that stands between a request and an applied plan: role-based
//! access control, bearer token validation with fail-closed revocation
//! checks, advisory-locked quota admission, best-effort usage metering, and
//! the plan approval gate itself.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod approval;
pub mod metering;
pub mod quota;
pub mod rbac;
pub mod revocation;
pub mod token;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use approval::GateError;
pub use approval::PlanGate;
pub use approval::validate_git_sha;
pub use metering::MeteringCollector;
pub use metering::MeteringSink;
pub use metering::SinkError;
pub use quota::QuotaDecision;
pub use quota::QuotaService;
pub use quota::TierDefaults;
pub use quota::lock_key;
pub use quota::tier_defaults;
pub use rbac::AuthzError;
pub use rbac::Permission;
pub use rbac::Role;
pub use rbac::require_permission;
pub use rbac::require_role;
pub use rbac::role_has_permission;
pub use rbac::role_permissions;
pub use revocation::RevocationCache;
pub use token::ApiKeyRegistry;
pub use token::Claims;
pub use token::IdentityKind;
pub use token::Redacted;
pub use token::TokenError;
pub use token::TokenManager;
