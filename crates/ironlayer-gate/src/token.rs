// ironlayer-gate/src/token.rs
// ============================================================================
// Module: Token Management
// Description: Dev-mode HMAC tokens, API keys, and secret redaction.
// Purpose: Issue and validate bearer credentials without leaking secrets.
// Dependencies: hmac, sha2, base64, serde, uuid
// ============================================================================

//! ## Overview
//! Development tokens take the form
//! `bmdev.<base64url(claims_json)>.<hex(HMAC-SHA256(claims_json, secret))>`.
//! API keys use the `bmkey.` prefix followed by hex and are validated by
//! SHA-256 fingerprint lookup, never by storing the key itself. Secrets are
//! held in a [`Redacted`] wrapper whose `Display` and `Debug` output is
//! always `[REDACTED]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::DateTime;
use chrono::Utc;
use hmac::Hmac;
use hmac::Mac;
use ironlayer_core::Jti;
use ironlayer_core::TenantId;
use ironlayer_core::hashing::hash_bytes;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

use crate::rbac::Role;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Prefix for development bearer tokens.
const DEV_TOKEN_PREFIX: &str = "bmdev.";
/// Prefix for API keys.
const API_KEY_PREFIX: &str = "bmkey.";

/// HMAC-SHA256 alias.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Redaction
// ============================================================================

/// A secret that renders as `[REDACTED]` everywhere it could be logged.
#[derive(Clone)]
pub struct Redacted(String);

impl Redacted {
    /// Wraps a secret value.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying secret for cryptographic use.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Debug for Redacted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Whether the caller is a person or a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// Human user.
    User,
    /// Service account.
    Service,
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    pub sub: String,
    /// Tenant scope.
    pub tenant_id: TenantId,
    /// Issuer label.
    pub iss: String,
    /// Issued-at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
    /// Granted scopes.
    pub scopes: Vec<String>,
    /// Token identifier; the revocation key.
    pub jti: Jti,
    /// Caller kind.
    pub identity_kind: IdentityKind,
    /// Caller role.
    pub role: Role,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token validation errors.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The token does not have the expected three-segment form.
    #[error("malformed token")]
    Malformed,
    /// The HMAC signature does not verify.
    #[error("invalid token signature")]
    InvalidSignature,
    /// The token expired.
    #[error("token expired at {0}")]
    Expired(i64),
    /// The HMAC secret is unusable.
    #[error("invalid token secret")]
    BadSecret,
}

// ============================================================================
// SECTION: Token Manager
// ============================================================================

/// Issues and validates development bearer tokens.
pub struct TokenManager {
    /// HMAC secret.
    secret: Redacted,
    /// Issuer label stamped into claims.
    issuer: String,
    /// Token lifetime in seconds.
    ttl_seconds: u64,
}

impl TokenManager {
    /// Creates a manager with the given secret and lifetime.
    #[must_use]
    pub fn new(secret: Redacted, issuer: impl Into<String>, ttl_seconds: u64) -> Self {
        Self { secret, issuer: issuer.into(), ttl_seconds }
    }

    /// Issues a token for the subject at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::BadSecret`] when the HMAC key is unusable.
    pub fn issue(
        &self,
        sub: &str,
        tenant_id: &TenantId,
        role: Role,
        identity_kind: IdentityKind,
        scopes: Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: sub.to_string(),
            tenant_id: tenant_id.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX),
            scopes,
            jti: Jti::new(Uuid::new_v4().to_string()),
            identity_kind,
            role,
        };
        let payload = serde_json::to_string(&claims).map_err(|_| TokenError::BadSecret)?;
        let signature = self.sign(payload.as_bytes())?;
        Ok(format!(
            "{DEV_TOKEN_PREFIX}{}.{signature}",
            URL_SAFE_NO_PAD.encode(payload.as_bytes())
        ))
    }

    /// Validates a token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Malformed`] for structural failures,
    /// [`TokenError::InvalidSignature`] for HMAC mismatches, and
    /// [`TokenError::Expired`] once `exp` has passed.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let rest = token.strip_prefix(DEV_TOKEN_PREFIX).ok_or(TokenError::Malformed)?;
        let (payload_b64, signature_hex) = rest.split_once('.').ok_or(TokenError::Malformed)?;
        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| TokenError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(self.secret.expose().as_bytes())
            .map_err(|_| TokenError::BadSecret)?;
        mac.update(&payload);
        let expected = hex_decode(signature_hex).ok_or(TokenError::InvalidSignature)?;
        mac.verify_slice(&expected)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims =
            serde_json::from_slice(&payload).map_err(|_| TokenError::Malformed)?;
        if claims.exp <= now.timestamp() {
            return Err(TokenError::Expired(claims.exp));
        }
        Ok(claims)
    }

    /// Computes the hex HMAC of a payload.
    fn sign(&self, payload: &[u8]) -> Result<String, TokenError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose().as_bytes())
            .map_err(|_| TokenError::BadSecret)?;
        mac.update(payload);
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }
}

// ============================================================================
// SECTION: API Keys
// ============================================================================

/// Validates API keys by SHA-256 fingerprint lookup.
#[derive(Debug, Default)]
pub struct ApiKeyRegistry {
    /// Fingerprint to (tenant, role) for every registered key.
    keys: BTreeMap<String, (TenantId, Role)>,
}

impl ApiKeyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a key and returns its full `bmkey.` form.
    ///
    /// Only the fingerprint is retained.
    #[must_use]
    pub fn issue(&mut self, tenant_id: TenantId, role: Role) -> String {
        let raw = Uuid::new_v4().simple().to_string();
        let key = format!("{API_KEY_PREFIX}{raw}");
        self.keys.insert(hash_bytes(key.as_bytes()), (tenant_id, role));
        key
    }

    /// Validates a presented key, returning its tenant and role.
    #[must_use]
    pub fn validate(&self, presented: &str) -> Option<(TenantId, Role)> {
        if !presented.starts_with(API_KEY_PREFIX) {
            return None;
        }
        let suffix = &presented[API_KEY_PREFIX.len()..];
        if suffix.is_empty() || !suffix.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        self.keys.get(&hash_bytes(presented.as_bytes())).cloned()
    }
}

// ============================================================================
// SECTION: Hex Helpers
// ============================================================================

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Decodes a lowercase or uppercase hex string.
fn hex_decode(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::with_capacity(text.len() / 2);
    let bytes = text.as_bytes();
    for pair in bytes.chunks_exact(2) {
        let high = (pair[0] as char).to_digit(16)?;
        let low = (pair[1] as char).to_digit(16)?;
        let value = high * 16 + low;
        out.push(u8::try_from(value).ok()?);
    }
    Some(out)
}
