// ironlayer-license/src/features.rs
// ============================================================================
// Module: Feature Gating
// Description: Tier-to-feature mapping for gated functionality.
// Purpose: Answer whether a billing tier unlocks a feature.
// Dependencies: serde, ironlayer-core
// ============================================================================

//! ## Overview
//! Features are gated by billing tier: AI advisory requires Team or above,
//! while the audit log and reconciliation surfaces are Enterprise only. A
//! license file may grant additional named features beyond the tier table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use ironlayer_core::PlanTier;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Features
// ============================================================================

/// Gated product features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// AI-assisted plan advisory (Team and above).
    AiAdvisory,
    /// Audit log access (Enterprise).
    AuditLog,
    /// Reconciliation surfaces (Enterprise).
    Reconciliation,
}

impl Feature {
    /// Returns the stable label used in license files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiAdvisory => "ai_advisory",
            Self::AuditLog => "audit_log",
            Self::Reconciliation => "reconciliation",
        }
    }

    /// Parses a feature label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "ai_advisory" => Some(Self::AiAdvisory),
            "audit_log" => Some(Self::AuditLog),
            "reconciliation" => Some(Self::Reconciliation),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Tier Mapping
// ============================================================================

/// Returns the features unlocked by a tier.
#[must_use]
pub const fn tier_features(tier: PlanTier) -> &'static [Feature] {
    match tier {
        PlanTier::Community => &[],
        PlanTier::Team => &[Feature::AiAdvisory],
        PlanTier::Enterprise => {
            &[Feature::AiAdvisory, Feature::AuditLog, Feature::Reconciliation]
        }
    }
}

/// Returns true when the tier unlocks the feature.
#[must_use]
pub fn tier_has_feature(tier: PlanTier, feature: Feature) -> bool {
    tier_features(tier).contains(&feature)
}
