// ironlayer-core/src/core/metering.rs
// ============================================================================
// Module: Metering Events
// Description: Best-effort usage telemetry records.
// Purpose: Carry tenant usage events from the collector to persistence.
// Dependencies: serde, chrono
// ============================================================================

//! ## Overview
//! Metering events feed quota accounting and billing reports. They are
//! best-effort telemetry, not audit: the collector may drop events when its
//! sink fails.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::TenantId;

// ============================================================================
// SECTION: Event Kind
// ============================================================================

/// Metered usage event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeteringEventKind {
    /// A plan was generated.
    PlanRun,
    /// A plan was applied.
    PlanApply,
    /// An AI advisory call was made.
    AiCall,
    /// Models were loaded from a repository.
    ModelLoaded,
    /// A backfill was executed.
    BackfillRun,
    /// An API request was served.
    ApiRequest,
}

impl MeteringEventKind {
    /// Returns the stable event label used in persistence and quota queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlanRun => "plan_run",
            Self::PlanApply => "plan_apply",
            Self::AiCall => "ai_call",
            Self::ModelLoaded => "model_loaded",
            Self::BackfillRun => "backfill_run",
            Self::ApiRequest => "api_request",
        }
    }
}

// ============================================================================
// SECTION: Metering Event
// ============================================================================

/// One usage event captured by the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteringEvent {
    /// Event identifier of the form `evt-<uuid>`.
    pub event_id: String,
    /// Tenant the usage is attributed to.
    pub tenant_id: TenantId,
    /// Usage category.
    pub event_type: MeteringEventKind,
    /// Units consumed; defaults to one.
    pub quantity: u64,
    /// Free-form string metadata.
    pub metadata: BTreeMap<String, String>,
    /// UTC capture time.
    pub timestamp: DateTime<Utc>,
}
