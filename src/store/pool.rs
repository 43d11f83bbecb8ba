//! Connection Pool
//!
//! Bounded pool of store connections. A connection is held only while a
//! query runs and goes back to the pool when its guard is dropped, on every
//! exit path including cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

use super::{StoreError, StoreResult};

// == Connection Pool ==
#[derive(Debug, Clone)]
pub struct ConnectionPool {
    permits: Arc<Semaphore>,
    size: usize,
    acquire_timeout: Duration,
}

/// A checked-out connection; returned to the pool on drop.
#[derive(Debug)]
pub struct PooledConnection {
    _permit: OwnedSemaphorePermit,
}

impl ConnectionPool {
    /// Creates a pool of `size` connections (at least one).
    pub fn new(size: usize, acquire_timeout: Duration) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
            acquire_timeout,
        }
    }

    // == Acquire ==
    /// Checks out a connection, waiting at most the acquire timeout.
    pub async fn acquire(&self) -> StoreResult<PooledConnection> {
        match tokio::time::timeout(self.acquire_timeout, self.permits.clone().acquire_owned())
            .await
        {
            Ok(Ok(permit)) => Ok(PooledConnection { _permit: permit }),
            Ok(Err(_)) => Err(StoreError::Unavailable("connection pool closed".to_string())),
            Err(_) => {
                warn!(
                    pool_size = self.size,
                    timeout_ms = self.acquire_timeout.as_millis() as u64,
                    "Timed out waiting for a store connection"
                );
                Err(StoreError::PoolTimeout)
            }
        }
    }

    /// Connections currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Closes the pool; pending and future acquires fail.
    pub fn close(&self) {
        self.permits.close();
    }
}
