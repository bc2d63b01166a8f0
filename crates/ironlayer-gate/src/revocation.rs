// ironlayer-gate/src/revocation.rs
// ============================================================================
// Module: Revocation Cache
// Description: TTL cache over the revocation store with fail-closed reads.
// Purpose: Bound revocation-check latency while staying safe on outages.
// Dependencies: ironlayer-core, tracing
// ============================================================================

//! ## Overview
//! A process-local map from token identifier to `(is_revoked, cached_at)`
//! with a TTL and a hard capacity. Fresh entries answer immediately; stale
//! and missing entries query the store. When the store is unreachable the
//! cache serves its stale value if it has one and otherwise reports the
//! token revoked, so authentication fails closed. A revoked token may be
//! honored for up to one TTL after revocation; that bounded staleness is
//! documented behavior, not a bug.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use chrono::DateTime;
use chrono::Utc;
use ironlayer_core::Jti;
use ironlayer_core::RevocationStore;
use tracing::error;

// ============================================================================
// SECTION: Cache
// ============================================================================

/// One cached lookup result.
#[derive(Debug, Clone, Copy)]
struct Entry {
    /// Whether the token was revoked at lookup time.
    is_revoked: bool,
    /// Monotonic capture instant.
    cached_at: Instant,
}

/// Process-local revocation cache.
pub struct RevocationCache {
    /// Cached lookups keyed by token identifier.
    entries: Mutex<HashMap<String, Entry>>,
    /// Entry lifetime.
    ttl: Duration,
    /// Hard cap on cached entries.
    max_entries: usize,
}

impl RevocationCache {
    /// Creates a cache with the given TTL and capacity.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Checks whether a token is revoked.
    ///
    /// Lookup order: fresh cache entry, then the store. Store results are
    /// cached positive and negative. On store failure the stale cached
    /// value is served when present; otherwise the token is reported
    /// revoked and an error is logged.
    pub fn is_revoked<S: RevocationStore>(
        &self,
        store: &S,
        jti: &Jti,
        now: DateTime<Utc>,
    ) -> bool {
        let stale = {
            let Ok(entries) = self.entries.lock() else {
                return true;
            };
            match entries.get(jti.as_str()) {
                Some(entry) if entry.cached_at.elapsed() <= self.ttl => {
                    return entry.is_revoked;
                }
                Some(entry) => Some(entry.is_revoked),
                None => None,
            }
        };

        match store.is_revoked(jti, now) {
            Ok(is_revoked) => {
                self.insert(jti, is_revoked);
                is_revoked
            }
            Err(err) => match stale {
                Some(is_revoked) => is_revoked,
                None => {
                    error!(jti = %jti, error = %err, "revocation store unavailable; failing closed");
                    true
                }
            },
        }
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true when the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Caches a lookup result, evicting expired entries at capacity.
    ///
    /// When every entry is still fresh and the cache is full the new entry
    /// is dropped; the fail-closed contract covers the uncached identifier
    /// on the next miss.
    fn insert(&self, jti: &Jti, is_revoked: bool) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= self.max_entries && !entries.contains_key(jti.as_str()) {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.cached_at.elapsed() <= ttl);
            if entries.len() >= self.max_entries {
                return;
            }
        }
        entries.insert(
            jti.as_str().to_string(),
            Entry { is_revoked, cached_at: Instant::now() },
        );
    }
}
