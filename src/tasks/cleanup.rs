//! Cleanup Task
//!
//! Background task that periodically drops cache entries no longer useful
//! even as stale fallback, and credentials that have expired.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::auth::AuthGateway;
use crate::cache::CacheCoordinator;

/// Spawns a background task that periodically purges expired state.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between cleanup runs. Cache locks are only held for the purge itself.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_cleanup_task(state.coordinator.clone(), state.gateway.clone(), 30);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(
    coordinator: Arc<CacheCoordinator>,
    gateway: Arc<AuthGateway>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cleanup task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let entries = coordinator.cleanup_expired();
            let credentials = gateway.purge_expired();

            if entries > 0 || credentials > 0 {
                info!(entries, credentials, "Cleanup removed expired state");
            } else {
                debug!("Cleanup: nothing expired");
            }
        }
    })
}
