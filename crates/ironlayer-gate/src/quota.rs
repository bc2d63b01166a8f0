// ironlayer-gate/src/quota.rs
// ============================================================================
// Module: Quota Service
// Description: Per-tenant, advisory-locked admission control.
// Purpose: Decide whether an operation may proceed before it runs.
// Dependencies: ironlayer-core, sha2, tracing
// ============================================================================

//! ## Overview
//! Every check resolves its limit as explicit tenant override, then tier
//! default, then unlimited, and admits the operation iff `current < limit`
//! (strict). A transaction-scoped advisory lock keyed on the tenant and
//! event type is acquired before any usage read so two concurrent requests
//! cannot both pass the boundary between `limit - 1` and `limit`. Checks
//! are pre-execution: in-flight operations complete even if a boundary is
//! crossed while they run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use ironlayer_core::AdvisoryLocker;
use ironlayer_core::MeteringStore;
use ironlayer_core::PlanTier;
use ironlayer_core::StoreError;
use ironlayer_core::TenantConfig;
use ironlayer_core::TenantId;
use ironlayer_core::TenantStore;
use sha2::Digest;
use sha2::Sha256;
use tracing::warn;

// ============================================================================
// SECTION: Tier Defaults
// ============================================================================

/// Per-tier quota defaults; `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierDefaults {
    /// Monthly plan runs.
    pub plan_quota_monthly: Option<u64>,
    /// Monthly AI calls.
    pub ai_quota_monthly: Option<u64>,
    /// Monthly API requests.
    pub api_quota_monthly: Option<u64>,
    /// Seats.
    pub max_seats: Option<u64>,
    /// Registered models.
    pub max_models: Option<u64>,
}

/// Returns the quota defaults for a tier.
#[must_use]
pub const fn tier_defaults(tier: PlanTier) -> TierDefaults {
    match tier {
        PlanTier::Community => TierDefaults {
            plan_quota_monthly: Some(100),
            ai_quota_monthly: Some(500),
            api_quota_monthly: Some(10_000),
            max_seats: Some(1),
            max_models: Some(5),
        },
        PlanTier::Team => TierDefaults {
            plan_quota_monthly: Some(1_000),
            ai_quota_monthly: Some(5_000),
            api_quota_monthly: Some(100_000),
            max_seats: Some(10),
            max_models: None,
        },
        PlanTier::Enterprise => TierDefaults {
            plan_quota_monthly: None,
            ai_quota_monthly: None,
            api_quota_monthly: None,
            max_seats: None,
            max_models: None,
        },
    }
}

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaDecision {
    /// Whether the operation may proceed.
    pub allowed: bool,
    /// Human-readable denial reason; present iff denied.
    pub reason: Option<String>,
}

impl QuotaDecision {
    /// An allow decision.
    #[must_use]
    pub const fn allow() -> Self {
        Self { allowed: true, reason: None }
    }

    /// A deny decision with a reason.
    #[must_use]
    pub const fn deny(reason: String) -> Self {
        Self { allowed: false, reason: Some(reason) }
    }
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Pre-execution quota enforcement for tenant-scoped operations.
pub struct QuotaService<S> {
    /// Tenant-bound store.
    store: S,
    /// Tenant the checks apply to.
    tenant_id: TenantId,
}

impl<S> QuotaService<S>
where
    S: TenantStore + MeteringStore + AdvisoryLocker,
{
    /// Creates a quota service over a tenant-bound store.
    #[must_use]
    pub const fn new(store: S, tenant_id: TenantId) -> Self {
        Self { store, tenant_id }
    }

    /// Checks the monthly plan-run quota.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    pub fn check_plan_quota(&self, now: DateTime<Utc>) -> Result<QuotaDecision, StoreError> {
        self.check_event_quota("plan_run", "plan run", now)
    }

    /// Checks the monthly AI-call quota.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    pub fn check_ai_quota(&self, now: DateTime<Utc>) -> Result<QuotaDecision, StoreError> {
        self.check_event_quota("ai_call", "AI call", now)
    }

    /// Checks the monthly API-request quota.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    pub fn check_api_quota(&self, now: DateTime<Utc>) -> Result<QuotaDecision, StoreError> {
        self.check_event_quota("api_request", "API request", now)
    }

    /// Checks whether the tenant can add another seat.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    pub fn check_seat_quota(&self) -> Result<QuotaDecision, StoreError> {
        self.store.advisory_lock(lock_key(&self.tenant_id, "seat_check"))?;

        let limit = self.effective_limit(|config| config.max_seats, |defaults| defaults.max_seats)?;
        let Some(limit) = limit else {
            return Ok(QuotaDecision::allow());
        };
        let current = self.store.count_active_users()?;
        if current >= limit {
            let reason = format!(
                "Seat limit reached ({current}/{limit}). Upgrade your plan or contact support for additional seats."
            );
            warn!(tenant = %self.tenant_id, current, limit, "seat quota exceeded");
            return Ok(QuotaDecision::deny(reason));
        }
        Ok(QuotaDecision::allow())
    }

    /// Checks whether the tenant can register `model_count` models.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    pub fn check_model_quota(&self, model_count: u64) -> Result<QuotaDecision, StoreError> {
        let limit =
            self.effective_limit(|config| config.max_models, |defaults| defaults.max_models)?;
        let Some(limit) = limit else {
            return Ok(QuotaDecision::allow());
        };
        if model_count > limit {
            let reason = format!(
                "Model limit reached ({model_count}/{limit}). Upgrade your plan for unlimited models."
            );
            warn!(tenant = %self.tenant_id, model_count, limit, "model quota exceeded");
            return Ok(QuotaDecision::deny(reason));
        }
        Ok(QuotaDecision::allow())
    }

    /// Checks the daily and monthly LLM budgets for one AI call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unreachable.
    pub fn check_llm_budget(&self, today: NaiveDate) -> Result<QuotaDecision, StoreError> {
        let Some(config) = self.store.tenant_config()? else {
            return Ok(QuotaDecision::allow());
        };

        if let Some(daily_budget) = config.llm_daily_budget_usd {
            let daily_cost = self.store.llm_cost_on(today)?;
            if daily_cost >= daily_budget {
                let reason = format!(
                    "Daily LLM budget exceeded (${daily_cost:.2}/${daily_budget:.2}). Increase your budget in tenant settings."
                );
                warn!(tenant = %self.tenant_id, daily_cost, daily_budget, "daily llm budget exceeded");
                return Ok(QuotaDecision::deny(reason));
            }
        }

        if let Some(monthly_budget) = config.llm_monthly_budget_usd {
            let monthly_cost = self.store.llm_cost_month_to_date(today)?;
            if monthly_cost >= monthly_budget {
                let reason = format!(
                    "Monthly LLM budget exceeded (${monthly_cost:.2}/${monthly_budget:.2}). Increase your budget in tenant settings."
                );
                warn!(tenant = %self.tenant_id, monthly_cost, monthly_budget, "monthly llm budget exceeded");
                return Ok(QuotaDecision::deny(reason));
            }
        }

        Ok(QuotaDecision::allow())
    }

    /// Shared implementation for the monthly event quotas.
    fn check_event_quota(
        &self,
        event_type: &str,
        label: &str,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, StoreError> {
        // Serialize concurrent checks for the same tenant and event type.
        self.store.advisory_lock(lock_key(&self.tenant_id, event_type))?;

        let limit = match event_type {
            "plan_run" => self
                .effective_limit(|config| config.plan_quota_monthly, |d| d.plan_quota_monthly)?,
            "ai_call" => {
                self.effective_limit(|config| config.ai_quota_monthly, |d| d.ai_quota_monthly)?
            }
            _ => self.effective_limit(|config| config.api_quota_monthly, |d| d.api_quota_monthly)?,
        };
        let Some(limit) = limit else {
            return Ok(QuotaDecision::allow());
        };

        let current = self.store.monthly_event_count(event_type, now)?;
        if current >= limit {
            let reason = format!(
                "Monthly {label} quota exceeded ({current}/{limit}). Upgrade your plan for higher limits."
            );
            warn!(tenant = %self.tenant_id, event_type, current, limit, "quota exceeded");
            return Ok(QuotaDecision::deny(reason));
        }
        Ok(QuotaDecision::allow())
    }

    /// Resolves a limit: explicit override, then tier default, then
    /// unlimited.
    fn effective_limit(
        &self,
        from_config: impl Fn(&TenantConfig) -> Option<u64>,
        from_defaults: impl Fn(&TierDefaults) -> Option<u64>,
    ) -> Result<Option<u64>, StoreError> {
        if let Some(config) = self.store.tenant_config()?
            && let Some(explicit) = from_config(&config)
        {
            return Ok(Some(explicit));
        }
        let tier = self
            .store
            .billing_customer()?
            .map(|customer| customer.plan_tier)
            .unwrap_or_default();
        Ok(from_defaults(&tier_defaults(tier)))
    }
}

// ============================================================================
// SECTION: Lock Keys
// ============================================================================

/// Derives the advisory lock key for a tenant and event type.
///
/// The key is stable across processes (unlike a hasher seeded per process)
/// and masked to 31 bits to stay within PostgreSQL's advisory key space.
#[must_use]
pub fn lock_key(tenant_id: &TenantId, event_type: &str) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(b"quota_");
    hasher.update(tenant_id.as_str().as_bytes());
    hasher.update(b"_");
    hasher.update(event_type.as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (i64::from_be_bytes(prefix)) & 0x7FFF_FFFF
}
