//! Configuration Module
//!
//! Handles loading and managing service configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::aggregation::RetryPolicy;
use crate::cache::CoordinatorSettings;

/// Service configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Name reported by the health endpoint
    pub app_name: String,
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of cached aggregates
    pub cache_max_entries: usize,
    /// Safety bound on how long an aggregate is cached, in seconds
    pub cache_ttl_secs: u64,
    /// How long expired aggregates remain usable as stale fallback, in seconds
    pub stale_grace_secs: u64,
    /// Serve flagged stale aggregates while the store is down
    pub serve_stale: bool,
    /// Longest a request waits on an in-flight computation, in milliseconds
    pub single_flight_timeout_ms: u64,
    /// Lifetime of issued bearer credentials, in seconds
    pub credential_ttl_secs: u64,
    /// Number of pooled store connections
    pub store_pool_size: usize,
    /// Longest wait for a pooled connection, in milliseconds
    pub store_acquire_timeout_ms: u64,
    /// Attempts per aggregation when the store is unavailable
    pub store_retry_attempts: u32,
    /// Delay before the first retry, doubled per attempt, in milliseconds
    pub store_retry_base_ms: u64,
    /// Inventory below this counts as low stock
    pub low_stock_threshold: i64,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Load the demo tenants, users and records at start-up
    pub seed_demo_data: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `APP_NAME` - Service name (default: tenant-stats)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_MAX_ENTRIES` - Maximum cached aggregates (default: 10000)
    /// - `CACHE_TTL_SECS` - Aggregate TTL (default: 300)
    /// - `STALE_GRACE_SECS` - Stale fallback retention past TTL (default: 600)
    /// - `SERVE_STALE` - Serve flagged stale data on outage (default: true)
    /// - `SINGLE_FLIGHT_TIMEOUT_MS` - Wait bound on shared computations (default: 5000)
    /// - `CREDENTIAL_TTL_SECS` - Bearer credential lifetime (default: 3600)
    /// - `STORE_POOL_SIZE` - Store connections (default: 10)
    /// - `STORE_ACQUIRE_TIMEOUT_MS` - Connection acquire timeout (default: 1000)
    /// - `STORE_RETRY_ATTEMPTS` - Attempts on store outage (default: 3)
    /// - `STORE_RETRY_BASE_MS` - First retry delay (default: 25)
    /// - `LOW_STOCK_THRESHOLD` - Low stock inventory level (default: 10)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 30)
    /// - `SEED_DEMO_DATA` - Load demo data (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            app_name: env::var("APP_NAME").unwrap_or(defaults.app_name),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttl_secs: env_or("CACHE_TTL_SECS", defaults.cache_ttl_secs),
            stale_grace_secs: env_or("STALE_GRACE_SECS", defaults.stale_grace_secs),
            serve_stale: env_or("SERVE_STALE", defaults.serve_stale),
            single_flight_timeout_ms: env_or(
                "SINGLE_FLIGHT_TIMEOUT_MS",
                defaults.single_flight_timeout_ms,
            ),
            credential_ttl_secs: env_or("CREDENTIAL_TTL_SECS", defaults.credential_ttl_secs),
            store_pool_size: env_or("STORE_POOL_SIZE", defaults.store_pool_size),
            store_acquire_timeout_ms: env_or(
                "STORE_ACQUIRE_TIMEOUT_MS",
                defaults.store_acquire_timeout_ms,
            ),
            store_retry_attempts: env_or("STORE_RETRY_ATTEMPTS", defaults.store_retry_attempts),
            store_retry_base_ms: env_or("STORE_RETRY_BASE_MS", defaults.store_retry_base_ms),
            low_stock_threshold: env_or("LOW_STOCK_THRESHOLD", defaults.low_stock_threshold),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            seed_demo_data: env_or("SEED_DEMO_DATA", defaults.seed_demo_data),
        }
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            stale_grace: Duration::from_secs(self.stale_grace_secs),
            serve_stale: self.serve_stale,
            wait_timeout: Duration::from_millis(self.single_flight_timeout_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.store_retry_attempts,
            Duration::from_millis(self.store_retry_base_ms),
        )
    }

    pub fn credential_ttl(&self) -> Duration {
        Duration::from_secs(self.credential_ttl_secs)
    }

    pub fn store_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.store_acquire_timeout_ms)
    }
}

/// Parses an environment variable, falling back to `default` when unset or
/// malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "tenant-stats".to_string(),
            server_port: 3000,
            cache_max_entries: 10_000,
            cache_ttl_secs: 300,
            stale_grace_secs: 600,
            serve_stale: true,
            single_flight_timeout_ms: 5000,
            credential_ttl_secs: 3600,
            store_pool_size: 10,
            store_acquire_timeout_ms: 1000,
            store_retry_attempts: 3,
            store_retry_base_ms: 25,
            low_stock_threshold: 10,
            cleanup_interval: 30,
            seed_demo_data: true,
        }
    }
}
