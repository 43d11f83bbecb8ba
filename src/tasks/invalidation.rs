//! Invalidation Listener
//!
//! Forwards write events from a broadcast channel to the cache so
//! aggregates sourced from the written records stop being served as fresh.
//!
//! A store registered with the coordinator as a write observer does not
//! need this; the listener serves event sources that can only be
//! subscribed to.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheCoordinator;
use crate::store::WriteEvent;

/// Spawns the listener. It stops when the store's event channel closes.
///
/// A lagging listener has missed writes it cannot identify, so it
/// invalidates every cached aggregate instead.
pub fn spawn_invalidation_listener(
    coordinator: Arc<CacheCoordinator>,
    mut events: broadcast::Receiver<WriteEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting cache invalidation listener");

        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(tenant_id = %event.tenant_id, kind = ?event.kind, "Applying write event");
                    coordinator.apply(&event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Invalidation listener lagged, invalidating all cached aggregates");
                    coordinator.invalidate_all();
                }
                Err(RecvError::Closed) => {
                    info!("Write event channel closed, stopping invalidation listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use uuid::Uuid;

    use crate::aggregation::{AggregationEngine, Metric, MetricValue, Money, RetryPolicy, TimeWindow};
    use crate::cache::CoordinatorSettings;
    use crate::store::{ConnectionPool, MemoryStore, RecordKind, Sale};
    use crate::tenant::{TenantContext, TenantId};

    fn setup() -> (Arc<CacheCoordinator>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(ConnectionPool::new(
            2,
            Duration::from_secs(1),
        )));
        let engine = Arc::new(AggregationEngine::new(store.clone(), RetryPolicy::none(), 10));
        let coordinator = Arc::new(CacheCoordinator::new(
            engine,
            100,
            CoordinatorSettings::default(),
        ));
        (coordinator, store)
    }

    fn sale(tenant: &str) -> Sale {
        Sale::new(
            TenantId::parse(tenant).unwrap(),
            Uuid::new_v4(),
            1,
            Money::from_cents(100),
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_store_write_invalidates_cached_aggregate() {
        let (coordinator, store) = setup();
        let handle = spawn_invalidation_listener(coordinator.clone(), store.subscribe());
        let ctx = TenantContext::for_tests("t1");

        let before = coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        assert_eq!(before.result.value, MetricValue::Count(0));

        store.insert_sale(sale("t1"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let after = coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        assert!(!after.cached);
        assert_eq!(after.result.value, MetricValue::Count(1));

        handle.abort();
    }

    #[tokio::test]
    async fn test_other_tenant_write_keeps_entry() {
        let (coordinator, store) = setup();
        let handle = spawn_invalidation_listener(coordinator.clone(), store.subscribe());
        let ctx = TenantContext::for_tests("t1");

        coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        store.insert_sale(sale("t2"));
        tokio::time::sleep(Duration::from_millis(50)).await;

        let again = coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        assert!(again.cached);

        handle.abort();
    }

    #[tokio::test]
    async fn test_lagged_listener_invalidates_everything() {
        let (coordinator, _) = setup();
        let (sender, receiver) = broadcast::channel(1);
        let ctx = TenantContext::for_tests("t1");

        coordinator
            .get(&ctx, Metric::ProductCount, TimeWindow::all())
            .await
            .unwrap();

        // Overflow the channel before the listener starts reading
        for _ in 0..3 {
            sender
                .send(WriteEvent {
                    tenant_id: TenantId::parse("t2").unwrap(),
                    kind: RecordKind::Sale,
                })
                .unwrap();
        }
        let handle = spawn_invalidation_listener(coordinator.clone(), receiver);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let again = coordinator
            .get(&ctx, Metric::ProductCount, TimeWindow::all())
            .await
            .unwrap();
        assert!(!again.cached);

        drop(sender);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }
}
