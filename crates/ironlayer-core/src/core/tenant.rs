// ironlayer-core/src/core/tenant.rs
// ============================================================================
// Module: Tenant Records
// Description: Per-tenant configuration, billing, usage, and snapshots.
// Purpose: Carry tenant-scoped overrides and billing tier resolution inputs.
// Dependencies: serde, chrono
// ============================================================================

//! ## Overview
//! Tenant-scoped configuration and billing records. Quota resolution reads
//! [`TenantConfig`] overrides first, then falls back to the tier defaults
//! implied by [`BillingCustomer::plan_tier`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TenantId;

// ============================================================================
// SECTION: Plan Tier
// ============================================================================

/// Billing tier determining quota and feature defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    /// Free tier.
    #[default]
    Community,
    /// Paid team tier.
    Team,
    /// Enterprise tier.
    Enterprise,
}

impl PlanTier {
    /// Returns the canonical lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Team => "team",
            Self::Enterprise => "enterprise",
        }
    }
}

// ============================================================================
// SECTION: Tenant Config
// ============================================================================

/// Per-tenant overrides. A `None` field defers to the tier default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Whether AI advisory calls are enabled at all.
    pub llm_enabled: bool,
    /// Daily AI spend ceiling in USD.
    pub llm_daily_budget_usd: Option<f64>,
    /// Monthly AI spend ceiling in USD.
    pub llm_monthly_budget_usd: Option<f64>,
    /// Monthly plan run quota override.
    pub plan_quota_monthly: Option<u64>,
    /// Monthly AI call quota override.
    pub ai_quota_monthly: Option<u64>,
    /// Monthly API request quota override.
    pub api_quota_monthly: Option<u64>,
    /// Seat limit override.
    pub max_seats: Option<u64>,
    /// Model count limit override.
    pub max_models: Option<u64>,
    /// Soft-delete marker; a deactivated tenant keeps its rows.
    pub deactivated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// SECTION: Billing Customer
// ============================================================================

/// Billing linkage for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCustomer {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Billing provider's customer identifier.
    pub stripe_customer_id: String,
    /// Billing provider's subscription identifier.
    pub stripe_subscription_id: Option<String>,
    /// Current billing tier.
    pub plan_tier: PlanTier,
    /// Current billing period start.
    pub period_start: Option<DateTime<Utc>>,
    /// Current billing period end.
    pub period_end: Option<DateTime<Utc>>,
}

// ============================================================================
// SECTION: LLM Usage
// ============================================================================

/// One recorded AI advisory call and its cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmUsageRecord {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Calendar date the spend is attributed to.
    pub usage_date: NaiveDate,
    /// Cost of the call in USD.
    pub cost_usd: f64,
    /// Free-form call label for audit.
    pub call_type: String,
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// A content-addressed record of every model version at one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot identifier; includes the tenant in its preimage.
    pub snapshot_id: String,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Environment label, e.g. `default` or `production`.
    pub environment: String,
    /// Git revision the snapshot captures.
    pub git_sha: String,
    /// Model name to content hash, sorted by name when serialized.
    pub model_versions: std::collections::BTreeMap<String, String>,
}
