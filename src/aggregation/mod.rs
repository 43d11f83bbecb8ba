//! Aggregation Module
//!
//! Metric definitions, fixed-point money, time windows, and the engine
//! that folds a tenant's records into aggregate results.

mod engine;
mod metric;
mod money;
mod window;

#[cfg(test)]
mod property_tests;

use thiserror::Error;

use crate::store::StoreError;
use crate::tenant::TenantId;

pub use engine::{AggregationEngine, RetryPolicy};
pub use metric::{AggregateResult, Metric, MetricValue};
pub use money::Money;
pub use window::{TimeWindow, MAX_WINDOW_DAYS};

// == Compute Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid window: {0}")]
    InvalidWindow(String),

    /// Store unreachable after retries
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Non-transient store failure
    #[error("Store error: {0}")]
    Store(String),

    /// The store returned a row belonging to another tenant
    #[error("Tenant mismatch: expected {expected}, found {found}")]
    TenantMismatch { expected: TenantId, found: TenantId },

    #[error("Arithmetic overflow computing {0}")]
    Overflow(Metric),
}

impl ComputeError {
    /// Errors caused by the request itself rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ComputeError::UnknownMetric(_) | ComputeError::InvalidWindow(_)
        )
    }
}

impl From<StoreError> for ComputeError {
    fn from(err: StoreError) -> Self {
        if err.is_transient() {
            ComputeError::StoreUnavailable(err.to_string())
        } else {
            ComputeError::Store(err.to_string())
        }
    }
}
