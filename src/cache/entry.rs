//! Cache Entry Module
//!
//! Defines cached aggregate results with TTL and generation metadata.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::aggregation::AggregateResult;

// == Cache Entry ==
/// A cached aggregate plus the metadata deciding whether it may be served.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached result
    pub result: AggregateResult,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Source generation observed when the computation started
    pub generation: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry expiring `ttl` from now.
    pub fn new(result: AggregateResult, ttl: Duration, generation: u64) -> Self {
        let now = current_timestamp_ms();
        Self {
            result,
            created_at: now,
            expires_at: now.saturating_add(ttl.as_millis() as u64),
            generation,
        }
    }

    // == Is Expired ==
    /// Checks if the TTL has elapsed.
    ///
    /// An entry is expired once the current time reaches the expiration
    /// time, so a zero TTL produces an entry that is never live.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    // == Is Current ==
    /// True if no write has happened to the source since the entry's
    /// computation started.
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation >= generation
    }

    /// Live entries may be served without touching the store.
    pub fn is_live(&self, generation: u64) -> bool {
        !self.is_expired() && self.is_current(generation)
    }

    // == Retention ==
    /// True once the entry has been expired for longer than `grace` and is
    /// no longer useful even as a stale fallback.
    pub fn is_past_grace(&self, grace: Duration, now_ms: u64) -> bool {
        now_ms >= self.expires_at.saturating_add(grace.as_millis() as u64)
    }

    // == Time To Live ==
    /// Remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
