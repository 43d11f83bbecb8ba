//! Cache Key Module
//!
//! Structured cache keys scoped to a single tenant.

use std::fmt;

use crate::aggregation::{Metric, TimeWindow};
use crate::tenant::TenantId;

// == Cache Key ==
/// Composite key `(tenant_id, metric, window)`.
///
/// Fields are private so a key always carries a tenant, and tenant ids
/// cannot contain `:`, so two distinct keys never render the same.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    tenant_id: TenantId,
    metric: Metric,
    window: TimeWindow,
}

impl CacheKey {
    pub fn new(tenant_id: TenantId, metric: Metric, window: TimeWindow) -> Self {
        Self {
            tenant_id,
            metric,
            window,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tenant:{}:metric:{}:window:{}",
            self.tenant_id, self.metric, self.window
        )
    }
}
