// ironlayer-license/src/license.rs
// ============================================================================
// Module: License Files
// Description: Ed25519-signed license parsing, verification, and entitlements.
// Purpose: Establish the effective tier and enforce license limits.
// Dependencies: ed25519-dalek, base64, serde_jcs, chrono
// ============================================================================

//! ## Overview
//! A license file is JSON whose `signature` field carries
//! `base64(Ed25519(canonical_json(payload minus signature)))`. Canonical
//! JSON uses RFC 8785 (sorted keys, compact separators), so the bytes the
//! issuer signed are reproducible from the parsed document. When no public
//! key is configured, verification is skipped; that mode exists for local
//! development only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::DateTime;
use chrono::Utc;
use ed25519_dalek::Signature;
use ed25519_dalek::Verifier;
use ed25519_dalek::VerifyingKey;
use ironlayer_core::PlanTier;
use ironlayer_core::TenantId;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::features::Feature;
use crate::features::tier_has_feature;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Licensing errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The license document failed to parse.
    #[error("license parse error: {0}")]
    Parse(String),
    /// The license carries no signature.
    #[error("license has no signature")]
    NoSignature,
    /// The signature does not verify against the configured key.
    #[error("license signature verification failed")]
    VerificationFailed,
    /// The configured public key is malformed.
    #[error("invalid license public key: {0}")]
    BadPublicKey(String),
    /// The license expired.
    #[error("license expired at {0}")]
    Expired(DateTime<Utc>),
    /// An entitlement limit was exceeded.
    #[error("license limit exceeded: {0}")]
    LimitExceeded(String),
}

// ============================================================================
// SECTION: License File
// ============================================================================

/// Default model entitlement when the license omits one.
const fn default_max_models() -> u64 {
    50
}

/// Default daily plan-run entitlement when the license omits one.
const fn default_max_plan_runs() -> u64 {
    10
}

/// A parsed license file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseFile {
    /// License identifier.
    pub license_id: String,
    /// Tenant the license is issued to.
    pub tenant_id: TenantId,
    /// Licensed tier.
    pub tier: PlanTier,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Maximum registered models.
    #[serde(default = "default_max_models")]
    pub max_models: u64,
    /// Maximum plan runs per day.
    #[serde(default = "default_max_plan_runs")]
    pub max_plan_runs_per_day: u64,
    /// Whether AI advisory is enabled.
    #[serde(default)]
    pub ai_enabled: bool,
    /// Extra feature labels granted beyond the tier table.
    #[serde(default)]
    pub features: Vec<String>,
    /// Detached signature over the canonical payload.
    #[serde(default)]
    pub signature: String,
}

// ============================================================================
// SECTION: License Manager
// ============================================================================

/// Resolves the effective tier and enforces license entitlements.
pub struct LicenseManager {
    /// Configured verification key; absent in development.
    public_key: Option<VerifyingKey>,
    /// Loaded license, when one has been accepted.
    license: Option<LicenseFile>,
}

impl LicenseManager {
    /// Creates a manager from raw public key bytes.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::BadPublicKey`] when the key bytes are not a
    /// valid Ed25519 public key.
    pub fn new(public_key_bytes: Option<&[u8]>) -> Result<Self, LicenseError> {
        let public_key = public_key_bytes
            .map(|bytes| {
                let array: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| LicenseError::BadPublicKey("expected 32 bytes".to_string()))?;
                VerifyingKey::from_bytes(&array)
                    .map_err(|err| LicenseError::BadPublicKey(err.to_string()))
            })
            .transpose()?;
        Ok(Self { public_key, license: None })
    }

    /// Creates a manager from a base64-encoded public key.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::BadPublicKey`] when decoding or key parsing
    /// fails.
    pub fn from_base64_key(key: Option<&str>) -> Result<Self, LicenseError> {
        let bytes = key
            .map(|text| {
                BASE64
                    .decode(text)
                    .map_err(|err| LicenseError::BadPublicKey(err.to_string()))
            })
            .transpose()?;
        Self::new(bytes.as_deref())
    }

    /// Loads and verifies a license document, making it current.
    ///
    /// Verification order: signature, then expiry. Entitlement queries come
    /// later through the accessor methods.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError`] on parse, signature, or expiry failure.
    pub fn load_license_from_str(
        &mut self,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<&LicenseFile, LicenseError> {
        let license: LicenseFile =
            serde_json::from_str(text).map_err(|err| LicenseError::Parse(err.to_string()))?;

        if let Some(key) = &self.public_key {
            verify_signature(key, text, &license.signature)?;
        }

        if license.expires_at <= now {
            return Err(LicenseError::Expired(license.expires_at));
        }

        Ok(&*self.license.insert(license))
    }

    /// Returns the loaded license, if any.
    #[must_use]
    pub const fn license(&self) -> Option<&LicenseFile> {
        self.license.as_ref()
    }

    /// Resolves the effective tier: license first, then the billing tier.
    #[must_use]
    pub fn effective_tier(&self, billing_tier: Option<PlanTier>) -> PlanTier {
        self.license
            .as_ref()
            .map(|license| license.tier)
            .or(billing_tier)
            .unwrap_or_default()
    }

    /// Returns true when the feature is unlocked by tier or named grant.
    #[must_use]
    pub fn has_feature(&self, billing_tier: Option<PlanTier>, feature: Feature) -> bool {
        if tier_has_feature(self.effective_tier(billing_tier), feature) {
            return true;
        }
        self.license
            .as_ref()
            .is_some_and(|license| license.features.iter().any(|label| label == feature.as_str()))
    }

    /// Enforces the licensed model count.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::LimitExceeded`] when `model_count` exceeds
    /// the entitlement.
    pub fn check_model_limit(&self, model_count: u64) -> Result<(), LicenseError> {
        let Some(license) = &self.license else {
            return Ok(());
        };
        if model_count > license.max_models {
            return Err(LicenseError::LimitExceeded(format!(
                "model count {model_count} exceeds licensed maximum {}",
                license.max_models
            )));
        }
        Ok(())
    }

    /// Enforces the licensed daily plan-run count.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::LimitExceeded`] when `runs_today` has
    /// reached the entitlement.
    pub fn check_plan_runs_today(&self, runs_today: u64) -> Result<(), LicenseError> {
        let Some(license) = &self.license else {
            return Ok(());
        };
        if runs_today >= license.max_plan_runs_per_day {
            return Err(LicenseError::LimitExceeded(format!(
                "daily plan runs {runs_today} reached licensed maximum {}",
                license.max_plan_runs_per_day
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Signature Verification
// ============================================================================

/// Verifies the detached signature over the canonical payload.
fn verify_signature(
    key: &VerifyingKey,
    raw_document: &str,
    signature_b64: &str,
) -> Result<(), LicenseError> {
    if signature_b64.is_empty() {
        return Err(LicenseError::NoSignature);
    }
    let signature_bytes = BASE64
        .decode(signature_b64)
        .map_err(|_| LicenseError::VerificationFailed)?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| LicenseError::VerificationFailed)?;

    let message = signing_bytes(raw_document)
        .map_err(|err| LicenseError::Parse(err.to_string()))?;
    key.verify(&message, &signature)
        .map_err(|_| LicenseError::VerificationFailed)
}

/// Returns the canonical bytes the issuer signed: the document minus its
/// `signature` field, serialized as RFC 8785 JSON.
///
/// # Errors
///
/// Returns [`LicenseError::Parse`] when the document is not a JSON object.
pub fn signing_bytes(raw_document: &str) -> Result<Vec<u8>, LicenseError> {
    let mut value: serde_json::Value =
        serde_json::from_str(raw_document).map_err(|err| LicenseError::Parse(err.to_string()))?;
    let Some(object) = value.as_object_mut() else {
        return Err(LicenseError::Parse("license must be a json object".to_string()));
    };
    object.remove("signature");
    serde_jcs::to_vec(&value).map_err(|err| LicenseError::Parse(err.to_string()))
}
