//! Cache Module
//!
//! Tenant-partitioned aggregate cache with TTL expiry, LRU bounding,
//! write-driven invalidation and single-flight computation.

mod coordinator;
mod entry;
mod key;
mod lru;
mod stats;
mod store;


use std::time::Duration;

use thiserror::Error;

use crate::aggregation::ComputeError;

// Re-export public types
pub use coordinator::{CacheCoordinator, CachedMetric, CoordinatorSettings};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use key::CacheKey;
pub use lru::LruTracker;
pub use stats::CacheStats;
pub use store::{CacheStore, Lookup};

// == Cache Error ==
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CacheError {
    /// The store could not be reached and no fallback was served
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Timed out after {0:?} waiting for aggregate")]
    Timeout(Duration),

    #[error(transparent)]
    Compute(ComputeError),

    #[error("Internal cache error: {0}")]
    Internal(String),
}
