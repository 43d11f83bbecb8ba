//! Response DTOs for the statistics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::aggregation::{MetricValue, TimeWindow};
use crate::auth::AccessCredential;
use crate::cache::{CacheStats, CachedMetric};
use crate::tenant::TenantId;

/// Response body for POST /auth/login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    /// Opaque bearer token
    pub token: String,
    /// Always "Bearer"
    pub token_type: &'static str,
    pub tenant_id: TenantId,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

impl From<AccessCredential> for LoginResponse {
    fn from(credential: AccessCredential) -> Self {
        Self {
            token: credential.token,
            token_type: "Bearer",
            tenant_id: credential.tenant_id,
            user_id: credential.user_id,
            expires_at: credential.expires_at,
        }
    }
}

/// Response body for POST /auth/logout
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    pub message: String,
}

impl LogoutResponse {
    pub fn new() -> Self {
        Self {
            message: "Logged out".to_string(),
        }
    }
}

impl Default for LogoutResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// One metric inside a dashboard response.
#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub value: MetricValue,
    /// Served from the cache
    pub cached: bool,
    /// Outdated figure served while the store is unavailable
    pub stale: bool,
    /// Records the figure was computed from
    pub record_count: u64,
    pub computed_at: DateTime<Utc>,
}

impl From<CachedMetric> for MetricReport {
    fn from(metric: CachedMetric) -> Self {
        Self {
            value: metric.result.value,
            cached: metric.cached,
            stale: metric.stale,
            record_count: metric.result.record_count,
            computed_at: metric.result.computed_at,
        }
    }
}

/// Response body for GET /dashboard/stats
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStatsResponse {
    pub tenant_id: TenantId,
    pub window: TimeWindow,
    pub generated_at: DateTime<Utc>,
    /// Metric name to report, sorted by name
    pub metrics: BTreeMap<String, MetricReport>,
}

impl DashboardStatsResponse {
    pub fn new(tenant_id: TenantId, window: TimeWindow) -> Self {
        Self {
            tenant_id,
            window,
            generated_at: Utc::now(),
            metrics: BTreeMap::new(),
        }
    }

    /// True if any figure in the response is stale.
    pub fn is_degraded(&self) -> bool {
        self.metrics.values().any(|m| m.stale)
    }
}

/// Response body for GET /cache/stats
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    /// Requests that waited on another request's computation
    pub coalesced: u64,
    pub computations: u64,
    pub stale_served: u64,
    pub evictions: u64,
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Computations currently running
    pub inflight: usize,
}

impl CacheStatsResponse {
    pub fn new(stats: &CacheStats, inflight: usize) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            coalesced: stats.coalesced,
            computations: stats.computations,
            stale_served: stats.stale_served,
            evictions: stats.evictions,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            inflight,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    pub app_name: String,
    pub version: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(app_name: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            app_name: app_name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Generic description of what went wrong
    pub error: String,
    /// Stable machine-readable code
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}
