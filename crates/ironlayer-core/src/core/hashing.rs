// ironlayer-core/src/core/hashing.rs
// ============================================================================
// Module: IronLayer Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic hashes for plans, steps, and snapshots.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! IronLayer hashes all canonical JSON using RFC 8785 (JCS) to guarantee
//! stable, replayable digests. Composed identifiers join their parts with a
//! null byte so that `("ab", "")` and `("a", "b")` never collide.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::identifiers::TenantId;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes the canonical JSON form of a value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Hashes raw bytes with SHA-256 and returns lowercase hex.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Derives a deterministic identifier from ordered string parts.
///
/// Parts are joined with a null byte before hashing, so the derivation is
/// injective over part boundaries: `["ab", ""]` and `["a", "b"]` produce
/// distinct digests.
#[must_use]
pub fn compute_deterministic_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update([0u8]);
        }
        hasher.update(part.as_bytes());
    }
    hex_encode(&hasher.finalize())
}

/// Derives a snapshot identifier from tenant, environment, and model versions.
///
/// Model versions are folded in sorted name order. The tenant is part of the
/// preimage, so two tenants with identical model versions in the same
/// environment produce distinct snapshot identifiers.
#[must_use]
pub fn compute_snapshot_id(
    tenant_id: &TenantId,
    environment: &str,
    model_versions: &BTreeMap<String, String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tenant_id.as_str().as_bytes());
    hasher.update(environment.as_bytes());
    for (name, version) in model_versions {
        hasher.update(name.as_bytes());
        hasher.update(version.as_bytes());
    }
    hex_encode(&hasher.finalize())
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
