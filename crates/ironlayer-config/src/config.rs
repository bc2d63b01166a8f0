// ironlayer-config/src/config.rs
// ============================================================================
// Module: Configuration Structs
// Description: Explicit per-service configuration with validation.
// Purpose: Replace sprawling keyword configs with typed, validated structs.
// Dependencies: serde, thiserror, std::env
// ============================================================================

//! ## Overview
//! Each service owns one struct here. Deserialization rejects unknown
//! fields, environment resolution maps documented variables onto
//! [`AuthSettings`], and `validate()` returns the complete violation list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config document failed to deserialize.
    #[error("config parse error: {0}")]
    Parse(String),
    /// One or more fields failed validation.
    #[error("config validation failed: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Auth Mode
// ============================================================================

/// Token validation strategy selected by `AUTH_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// HS256 HMAC tokens signed with `JWT_SECRET`.
    Jwt,
    /// Tokens exchanged for KMS-signed assertions.
    KmsExchange,
    /// On-prem OIDC issuer validation.
    OidcOnprem,
    /// Local development tokens; no external trust anchor.
    #[default]
    Development,
}

impl AuthMode {
    /// Parses the `AUTH_MODE` environment value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "jwt" => Some(Self::Jwt),
            "kms_exchange" => Some(Self::KmsExchange),
            "oidc_onprem" => Some(Self::OidcOnprem),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// KMS provider detected from the configured key reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KmsKeyKind {
    /// AWS KMS key ARN (`arn:aws:kms:` prefix).
    Aws,
    /// Azure Key Vault key URI (`https://*.vault.azure.net/keys/`).
    Azure,
}

impl KmsKeyKind {
    /// Auto-detects the provider from a key reference.
    #[must_use]
    pub fn detect(key_ref: &str) -> Option<Self> {
        if key_ref.starts_with("arn:aws:kms:") {
            return Some(Self::Aws);
        }
        if key_ref.starts_with("https://")
            && key_ref.contains(".vault.azure.net/keys/")
        {
            return Some(Self::Azure);
        }
        None
    }
}

// ============================================================================
// SECTION: Auth Settings
// ============================================================================

/// Authentication configuration resolved from the environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthSettings {
    /// Token validation strategy.
    #[serde(default)]
    pub auth_mode: AuthMode,
    /// HMAC secret; required outside development mode.
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Access token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_seconds: u64,
    /// Hard ceiling on any issued token lifetime.
    #[serde(default = "default_max_token_ttl")]
    pub max_token_ttl_seconds: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_seconds: u64,
    /// KMS key reference for `kms_exchange` mode.
    #[serde(default)]
    pub kms_key_arn: Option<String>,
    /// OIDC issuer URL for `oidc_onprem` mode.
    #[serde(default)]
    pub oidc_issuer_url: Option<String>,
    /// Expected OIDC audience.
    #[serde(default)]
    pub oidc_audience: Option<String>,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            auth_mode: AuthMode::Development,
            jwt_secret: None,
            token_ttl_seconds: default_token_ttl(),
            max_token_ttl_seconds: default_max_token_ttl(),
            refresh_token_ttl_seconds: default_refresh_ttl(),
            kms_key_arn: None,
            oidc_issuer_url: None,
            oidc_audience: None,
        }
    }
}

impl AuthSettings {
    /// Resolves settings from an environment map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `AUTH_MODE` is unrecognized or
    /// a numeric variable fails to parse.
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(mode) = env.get("AUTH_MODE") {
            settings.auth_mode = AuthMode::parse(mode)
                .ok_or_else(|| ConfigError::Invalid(format!("unknown AUTH_MODE '{mode}'")))?;
        }
        settings.jwt_secret = env.get("JWT_SECRET").cloned();
        if let Some(raw) = env.get("TOKEN_TTL_SECONDS") {
            settings.token_ttl_seconds = parse_u64("TOKEN_TTL_SECONDS", raw)?;
        }
        if let Some(raw) = env.get("MAX_TOKEN_TTL_SECONDS") {
            settings.max_token_ttl_seconds = parse_u64("MAX_TOKEN_TTL_SECONDS", raw)?;
        }
        if let Some(raw) = env.get("REFRESH_TOKEN_TTL_SECONDS") {
            settings.refresh_token_ttl_seconds = parse_u64("REFRESH_TOKEN_TTL_SECONDS", raw)?;
        }
        settings.kms_key_arn = env.get("KMS_KEY_ARN").cloned();
        settings.oidc_issuer_url = env.get("OIDC_ISSUER_URL").cloned();
        settings.oidc_audience = env.get("OIDC_AUDIENCE").cloned();
        Ok(settings)
    }

    /// Returns the detected KMS provider, when a key is configured.
    #[must_use]
    pub fn kms_kind(&self) -> Option<KmsKeyKind> {
        self.kms_key_arn.as_deref().and_then(KmsKeyKind::detect)
    }

    /// Collects every validation violation.
    #[must_use]
    pub fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        if self.auth_mode != AuthMode::Development && self.jwt_secret.is_none() {
            violations.push("JWT_SECRET is required outside development mode".to_string());
        }
        if self.token_ttl_seconds == 0 {
            violations.push("TOKEN_TTL_SECONDS must be positive".to_string());
        }
        if self.token_ttl_seconds > self.max_token_ttl_seconds {
            violations.push(format!(
                "TOKEN_TTL_SECONDS ({}) exceeds MAX_TOKEN_TTL_SECONDS ({})",
                self.token_ttl_seconds, self.max_token_ttl_seconds
            ));
        }
        if self.auth_mode == AuthMode::KmsExchange {
            match self.kms_key_arn.as_deref() {
                None => violations.push("KMS_KEY_ARN is required in kms_exchange mode".to_string()),
                Some(key_ref) if KmsKeyKind::detect(key_ref).is_none() => {
                    violations.push(format!("KMS_KEY_ARN '{key_ref}' matches no known provider"));
                }
                Some(_) => {}
            }
        }
        if self.auth_mode == AuthMode::OidcOnprem && self.oidc_issuer_url.is_none() {
            violations.push("OIDC_ISSUER_URL is required in oidc_onprem mode".to_string());
        }
        violations
    }
}

/// Default access token lifetime.
const fn default_token_ttl() -> u64 {
    3600
}

/// Default token lifetime ceiling.
const fn default_max_token_ttl() -> u64 {
    86_400
}

/// Default refresh token lifetime.
const fn default_refresh_ttl() -> u64 {
    86_400
}

/// Parses a numeric environment value.
fn parse_u64(name: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::Invalid(format!("{name} must be a positive integer, got '{raw}'")))
}

// ============================================================================
// SECTION: Scheduler Settings
// ============================================================================

/// Reconciliation scheduler configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerSettings {
    /// Seconds the scheduler loop sleeps between wakes.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Trailing window of runs to reconcile.
    #[serde(default = "default_hours_back")]
    pub reconcile_hours_back: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            reconcile_hours_back: default_hours_back(),
        }
    }
}

/// Default scheduler wake interval.
const fn default_check_interval() -> u64 {
    60
}

/// Default reconciliation lookback window.
const fn default_hours_back() -> u32 {
    24
}

// ============================================================================
// SECTION: Metering Settings
// ============================================================================

/// Metering collector configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeteringSettings {
    /// Buffer size that triggers an immediate flush.
    #[serde(default = "default_buffer_size")]
    pub max_buffer_size: usize,
    /// Background flush cadence in seconds.
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: u64,
}

impl Default for MeteringSettings {
    fn default() -> Self {
        Self {
            max_buffer_size: default_buffer_size(),
            flush_interval_seconds: default_flush_interval(),
        }
    }
}

/// Default metering buffer size.
const fn default_buffer_size() -> usize {
    100
}

/// Default metering flush cadence.
const fn default_flush_interval() -> u64 {
    5
}

// ============================================================================
// SECTION: Revocation Settings
// ============================================================================

/// Revocation cache configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RevocationSettings {
    /// Cache entry lifetime in seconds; the bounded-staleness window.
    #[serde(default = "default_revocation_ttl")]
    pub ttl_seconds: u64,
    /// Hard cap on cached entries.
    #[serde(default = "default_revocation_cap")]
    pub max_entries: usize,
}

impl Default for RevocationSettings {
    fn default() -> Self {
        Self {
            ttl_seconds: default_revocation_ttl(),
            max_entries: default_revocation_cap(),
        }
    }
}

/// Default revocation cache TTL.
const fn default_revocation_ttl() -> u64 {
    30
}

/// Default revocation cache capacity.
const fn default_revocation_cap() -> usize {
    10_000
}

// ============================================================================
// SECTION: Executor Settings
// ============================================================================

/// Execution backend polling and retry configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutorSettings {
    /// Hard overall polling timeout in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    /// Initial per-poll backoff in seconds.
    #[serde(default = "default_poll_initial")]
    pub poll_initial_backoff_seconds: u64,
    /// Per-poll backoff cap in seconds.
    #[serde(default = "default_poll_max")]
    pub poll_max_backoff_seconds: u64,
    /// Consecutive poll errors tolerated before giving up.
    #[serde(default = "default_max_errors")]
    pub max_consecutive_errors: u32,
    /// Transient-retry base delay in seconds.
    #[serde(default = "default_retry_base")]
    pub retry_base_seconds: u64,
    /// Transient-retry delay cap in seconds.
    #[serde(default = "default_retry_max")]
    pub retry_max_seconds: u64,
    /// Transient-retry attempt cap.
    #[serde(default = "default_retry_attempts")]
    pub retry_max_attempts: u32,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            poll_timeout_seconds: default_poll_timeout(),
            poll_initial_backoff_seconds: default_poll_initial(),
            poll_max_backoff_seconds: default_poll_max(),
            max_consecutive_errors: default_max_errors(),
            retry_base_seconds: default_retry_base(),
            retry_max_seconds: default_retry_max(),
            retry_max_attempts: default_retry_attempts(),
        }
    }
}

/// Default overall polling timeout.
const fn default_poll_timeout() -> u64 {
    3600
}

/// Default initial poll backoff.
const fn default_poll_initial() -> u64 {
    10
}

/// Default poll backoff cap.
const fn default_poll_max() -> u64 {
    120
}

/// Default consecutive error cap.
const fn default_max_errors() -> u32 {
    10
}

/// Default transient retry base delay.
const fn default_retry_base() -> u64 {
    2
}

/// Default transient retry delay cap.
const fn default_retry_max() -> u64 {
    60
}

/// Default transient retry attempts.
const fn default_retry_attempts() -> u32 {
    5
}

// ============================================================================
// SECTION: Gate Settings
// ============================================================================

/// Plan lifecycle gate configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateSettings {
    /// Cost ceiling in USD under which risk-free plans auto-approve.
    #[serde(default = "default_auto_approve_ceiling")]
    pub auto_approve_cost_ceiling_usd: f64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self { auto_approve_cost_ceiling_usd: default_auto_approve_ceiling() }
    }
}

/// Default auto-approval cost ceiling.
const fn default_auto_approve_ceiling() -> f64 {
    50.0
}

// ============================================================================
// SECTION: License Settings
// ============================================================================

/// License verification configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LicenseSettings {
    /// Base64-encoded Ed25519 public key; verification is skipped when
    /// absent (development only).
    #[serde(default)]
    pub public_key_base64: Option<String>,
    /// Path to the tenant's license file.
    #[serde(default)]
    pub license_path: Option<String>,
}

// ============================================================================
// SECTION: App Config
// ============================================================================

/// Aggregate application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthSettings,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Metering settings.
    #[serde(default)]
    pub metering: MeteringSettings,
    /// Revocation cache settings.
    #[serde(default)]
    pub revocation: RevocationSettings,
    /// Executor settings.
    #[serde(default)]
    pub executor: ExecutorSettings,
    /// Plan gate settings.
    #[serde(default)]
    pub gate: GateSettings,
    /// License settings.
    #[serde(default)]
    pub license: LicenseSettings,
}

impl AppConfig {
    /// Parses a JSON config document. Unknown fields fail.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed or unknown input.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the full configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] carrying every violation joined by
    /// `; `.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut violations = self.auth.violations();
        if self.scheduler.check_interval_seconds == 0 {
            violations.push("scheduler.check_interval_seconds must be positive".to_string());
        }
        if self.metering.max_buffer_size == 0 {
            violations.push("metering.max_buffer_size must be positive".to_string());
        }
        if self.revocation.max_entries == 0 {
            violations.push("revocation.max_entries must be positive".to_string());
        }
        if self.executor.poll_initial_backoff_seconds > self.executor.poll_max_backoff_seconds {
            violations.push(
                "executor.poll_initial_backoff_seconds exceeds poll_max_backoff_seconds"
                    .to_string(),
            );
        }
        if self.gate.auto_approve_cost_ceiling_usd < 0.0 {
            violations.push("gate.auto_approve_cost_ceiling_usd must not be negative".to_string());
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(violations.join("; ")))
        }
    }
}
