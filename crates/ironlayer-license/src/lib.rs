// ironlayer-license/src/lib.rs
// ============================================================================
// Module: IronLayer License Library
// Description: Public API surface for licensing and feature gating.
// Purpose: Expose tiers, features, license files, and the manager.
// Dependencies: crate::{features, license}
// ============================================================================

//! ## Overview
//! Licensing for IronLayer: billing tiers map to feature sets, and
//! enterprise deployments carry an Ed25519-signed license file whose
//! signature covers the canonical JSON of every field except the signature
//! itself. Verification order is signature, then expiry, then entitlement
//! queries.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod features;
pub mod license;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use features::Feature;
pub use features::tier_features;
pub use features::tier_has_feature;
pub use license::LicenseError;
pub use license::LicenseFile;
pub use license::LicenseManager;
pub use license::signing_bytes;
