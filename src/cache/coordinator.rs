//! Cache Coordinator
//!
//! Cache-aside access to aggregates with single-flight computation,
//! generation-based invalidation, and flagged stale fallback.
//!
//! # Concurrency
//! For a given key and generation at most one computation runs at a time;
//! every caller arriving while it runs waits on the same result. The
//! computation runs on its own task, so a caller giving up (timeout or
//! dropped request) never cancels it for the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::aggregation::{AggregateResult, AggregationEngine, ComputeError, Metric, TimeWindow};
use crate::cache::store::Lookup;
use crate::cache::{CacheError, CacheKey, CacheStats, CacheStore};
use crate::store::{RecordKind, WriteEvent, WriteObserver};
use crate::tenant::{TenantContext, TenantId};

// == Settings ==
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    /// Upper bound on how long an entry is served without recomputation
    pub ttl: Duration,
    /// How long expired entries are kept as stale-serve candidates
    pub stale_grace: Duration,
    /// Serve flagged stale entries when the store is unavailable
    pub serve_stale: bool,
    /// Longest a caller waits on an in-flight computation
    pub wait_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            stale_grace: Duration::from_secs(600),
            serve_stale: true,
            wait_timeout: Duration::from_secs(5),
        }
    }
}

// == Cached Metric ==
/// An aggregate together with how it was obtained.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedMetric {
    pub result: AggregateResult,
    /// Served from a cache entry rather than a fresh computation
    pub cached: bool,
    /// The entry is outdated (TTL or generation); degraded mode only
    pub stale: bool,
}

type FlightOutcome = Option<Result<AggregateResult, ComputeError>>;

struct Flight {
    id: u64,
    generation: u64,
    receiver: watch::Receiver<FlightOutcome>,
}

enum Waited {
    Done(Result<AggregateResult, ComputeError>),
    Aborted,
    TimedOut,
}

// == Cache Coordinator ==
pub struct CacheCoordinator {
    store: Mutex<CacheStore>,
    /// In-flight computations; always locked before `store` when both are held
    inflight: Mutex<HashMap<CacheKey, Flight>>,
    engine: Arc<AggregationEngine>,
    settings: CoordinatorSettings,
    next_flight: AtomicU64,
}

impl CacheCoordinator {
    // == Constructor ==
    pub fn new(engine: Arc<AggregationEngine>, max_entries: usize, settings: CoordinatorSettings) -> Self {
        Self {
            store: Mutex::new(CacheStore::new(max_entries)),
            inflight: Mutex::new(HashMap::new()),
            engine,
            settings,
            next_flight: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    // == Get ==
    /// Returns the aggregate for the context's tenant, computing it at most
    /// once per key across concurrent callers on a miss.
    pub async fn get(
        self: &Arc<Self>,
        ctx: &TenantContext,
        metric: Metric,
        window: TimeWindow,
    ) -> Result<CachedMetric, CacheError> {
        let key = CacheKey::new(ctx.tenant_id().clone(), metric, window);

        let mut receiver = {
            let mut inflight = self.inflight.lock();
            let (lookup, generation) = {
                let mut store = self.store.lock();
                let generation = store.generation(key.tenant_id(), metric.source());
                (store.lookup(&key), generation)
            };

            if let Lookup::Fresh(result) = lookup {
                debug!(%key, "Cache hit");
                return Ok(CachedMetric {
                    result,
                    cached: true,
                    stale: false,
                });
            }

            // A flight started before the latest write must not be joined
            let joinable = inflight
                .get(&key)
                .filter(|flight| flight.generation >= generation)
                .map(|flight| (flight.id, flight.receiver.clone()));

            match joinable {
                Some((id, receiver)) => {
                    debug!(%key, flight = id, "Joining in-flight computation");
                    self.store.lock().stats_mut().record_coalesced();
                    receiver
                }
                None => self.start_flight(&mut inflight, key.clone(), ctx.clone(), generation),
            }
        };

        let waited = match tokio::time::timeout(
            self.settings.wait_timeout,
            receiver.wait_for(Option::is_some),
        )
        .await
        {
            Ok(Ok(outcome)) => match outcome.as_ref() {
                Some(result) => Waited::Done(result.clone()),
                None => Waited::Aborted,
            },
            Ok(Err(_)) => Waited::Aborted,
            Err(_) => Waited::TimedOut,
        };

        match waited {
            Waited::Done(Ok(result)) => Ok(CachedMetric {
                result,
                cached: false,
                stale: false,
            }),
            Waited::Done(Err(ComputeError::StoreUnavailable(reason))) => self
                .stale_fallback(&key)
                .ok_or(CacheError::StoreUnavailable(reason)),
            Waited::Done(Err(err)) => Err(CacheError::Compute(err)),
            Waited::Aborted => Err(CacheError::Internal(format!(
                "computation for {} ended without a result",
                key
            ))),
            Waited::TimedOut => {
                warn!(%key, timeout_ms = self.settings.wait_timeout.as_millis() as u64, "Timed out waiting for computation");
                self.stale_fallback(&key)
                    .ok_or(CacheError::Timeout(self.settings.wait_timeout))
            }
        }
    }

    // == Get Many ==
    /// Fetches several metrics for one tenant and window concurrently.
    pub async fn get_many(
        self: &Arc<Self>,
        ctx: &TenantContext,
        metrics: &[Metric],
        window: TimeWindow,
    ) -> Vec<(Metric, Result<CachedMetric, CacheError>)> {
        let fetches = metrics.iter().map(|&metric| async move {
            (metric, self.get(ctx, metric, window).await)
        });
        join_all(fetches).await
    }

    fn start_flight(
        self: &Arc<Self>,
        inflight: &mut HashMap<CacheKey, Flight>,
        key: CacheKey,
        ctx: TenantContext,
        generation: u64,
    ) -> watch::Receiver<FlightOutcome> {
        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        inflight.insert(
            key.clone(),
            Flight {
                id,
                generation,
                receiver: receiver.clone(),
            },
        );
        debug!(%key, flight = id, generation, "Starting computation");

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let cleanup = FlightCleanup {
                coordinator: Arc::clone(&this),
                key: key.clone(),
                id,
            };

            let outcome = this
                .engine
                .compute(&ctx, key.metric(), key.window())
                .await;

            {
                let mut store = this.store.lock();
                store.stats_mut().record_computation();
                if let Ok(result) = &outcome {
                    store.insert(key.clone(), result.clone(), generation, this.settings.ttl);
                }
            }

            // Unregister before publishing so later callers see the entry.
            drop(cleanup);
            let _ = sender.send(Some(outcome));
        });

        receiver
    }

    fn stale_fallback(&self, key: &CacheKey) -> Option<CachedMetric> {
        if !self.settings.serve_stale {
            return None;
        }

        let mut store = self.store.lock();
        let (result, stale) = match store.peek(key) {
            Lookup::Fresh(result) => (result, false),
            Lookup::Stale(result) => (result, true),
            Lookup::Missing => return None,
        };
        if stale {
            store.stats_mut().record_stale_served();
            warn!(%key, computed_at = %result.computed_at, "Serving stale aggregate");
        }

        Some(CachedMetric {
            result,
            cached: true,
            stale,
        })
    }

    // == Invalidation ==
    /// Marks every cached metric sourced from `kind` records of the tenant
    /// as stale.
    pub fn record_write(&self, tenant_id: &TenantId, kind: RecordKind) {
        let generation = self.store.lock().record_write(tenant_id, kind);
        debug!(%tenant_id, ?kind, generation, "Generation bumped");
    }

    pub fn apply(&self, event: &WriteEvent) {
        self.record_write(&event.tenant_id, event.kind);
    }

    /// Marks every cached metric of the tenant as stale.
    pub fn invalidate_tenant(&self, tenant_id: &TenantId) {
        let mut store = self.store.lock();
        for kind in RecordKind::ALL {
            store.record_write(tenant_id, kind);
        }
        info!(%tenant_id, "Tenant cache invalidated");
    }

    /// Marks every cached metric of every tenant as stale.
    pub fn invalidate_all(&self) {
        self.store.lock().bump_epoch();
        info!("All cached aggregates invalidated");
    }

    // == Maintenance ==
    /// Drops entries expired for longer than the stale grace period.
    pub fn cleanup_expired(&self) -> usize {
        self.store.lock().cleanup_expired(self.settings.stale_grace)
    }

    pub fn stats(&self) -> CacheStats {
        self.store.lock().stats()
    }

    /// Number of computations currently in flight.
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }
}

/// Removes a flight's registration when its task finishes or unwinds.
struct FlightCleanup {
    coordinator: Arc<CacheCoordinator>,
    key: CacheKey,
    id: u64,
}

impl Drop for FlightCleanup {
    fn drop(&mut self) {
        let mut inflight = self.coordinator.inflight.lock();
        if inflight.get(&self.key).map(|f| f.id) == Some(self.id) {
            inflight.remove(&self.key);
        }
    }
}

// Registered on the record store so a write is reflected in the cache
// before the write call returns.
impl WriteObserver for CacheCoordinator {
    fn on_write(&self, event: &WriteEvent) {
        self.apply(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::{MetricValue, Money, RetryPolicy};
    use crate::store::{ConnectionPool, MemoryStore, Sale};
    use chrono::Utc;
    use uuid::Uuid;

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    fn setup(settings: CoordinatorSettings) -> (Arc<CacheCoordinator>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new(ConnectionPool::new(
            8,
            Duration::from_secs(1),
        )));
        store.insert_sale(Sale::new(
            tenant("t1"),
            Uuid::new_v4(),
            2,
            Money::from_cents(1000),
            Utc::now(),
        )
        .unwrap());
        store.insert_sale(Sale::new(
            tenant("t2"),
            Uuid::new_v4(),
            7,
            Money::from_cents(5000),
            Utc::now(),
        )
        .unwrap());

        let engine = Arc::new(AggregationEngine::new(
            store.clone(),
            RetryPolicy::new(2, Duration::from_millis(1)),
            10,
        ));
        (Arc::new(CacheCoordinator::new(engine, 100, settings)), store)
    }

    fn add_sale(store: &MemoryStore, coordinator: &CacheCoordinator, t: &str, cents: i64) {
        let sale = Sale::new(tenant(t), Uuid::new_v4(), 1, Money::from_cents(cents), Utc::now())
            .unwrap();
        store.insert_sale(sale);
        coordinator.record_write(&tenant(t), RecordKind::Sale);
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        let ctx = TenantContext::for_tests("t1");

        let first = coordinator
            .get(&ctx, Metric::TotalRevenue, TimeWindow::all())
            .await
            .unwrap();
        assert!(!first.cached);
        assert_eq!(first.result.value, MetricValue::Money(Money::from_cents(2000)));

        let second = coordinator
            .get(&ctx, Metric::TotalRevenue, TimeWindow::all())
            .await
            .unwrap();
        assert!(second.cached);
        assert!(!second.stale);
        assert!(first.result.same_figure(&second.result));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_tenants_never_share_entries() {
        let (coordinator, _) = setup(CoordinatorSettings::default());
        let t1 = TenantContext::for_tests("t1");
        let t2 = TenantContext::for_tests("t2");

        let a = coordinator.get(&t1, Metric::TotalRevenue, TimeWindow::all()).await.unwrap();
        let b = coordinator.get(&t2, Metric::TotalRevenue, TimeWindow::all()).await.unwrap();

        assert_eq!(a.result.tenant_id, tenant("t1"));
        assert_eq!(b.result.tenant_id, tenant("t2"));
        assert_eq!(b.result.value, MetricValue::Money(Money::from_cents(35_000)));
        assert!(!b.cached);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_flight_under_concurrency() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        store.set_query_delay(Duration::from_millis(100));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(async move {
                let ctx = TenantContext::for_tests("t1");
                coordinator
                    .get(&ctx, Metric::SalesCount, TimeWindow::all())
                    .await
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for handle in handles {
            values.push(handle.await.unwrap().result.value);
        }

        assert_eq!(store.query_count(), 1);
        assert_eq!(coordinator.stats().computations, 1);
        assert!(values.iter().all(|v| *v == MetricValue::Count(1)));
    }

    #[tokio::test]
    async fn test_write_forces_recompute() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        let ctx = TenantContext::for_tests("t1");

        coordinator.get(&ctx, Metric::TotalRevenue, TimeWindow::all()).await.unwrap();
        add_sale(&store, &coordinator, "t1", 500);

        let after = coordinator
            .get(&ctx, Metric::TotalRevenue, TimeWindow::all())
            .await
            .unwrap();
        assert!(!after.cached);
        assert_eq!(after.result.value, MetricValue::Money(Money::from_cents(2500)));
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_observed_store_write_is_visible_to_next_get() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        store.add_observer(&coordinator);
        let ctx = TenantContext::for_tests("t1");

        coordinator.get(&ctx, Metric::SalesCount, TimeWindow::all()).await.unwrap();
        let cached = coordinator.get(&ctx, Metric::SalesCount, TimeWindow::all()).await.unwrap();
        assert!(cached.cached);

        let sale = Sale::new(tenant("t1"), Uuid::new_v4(), 1, Money::from_cents(100), Utc::now())
            .unwrap();
        store.insert_sale(sale);

        let after = coordinator.get(&ctx, Metric::SalesCount, TimeWindow::all()).await.unwrap();
        assert!(!after.cached);
        assert!(!after.stale);
        assert_eq!(after.result.value, MetricValue::Count(2));
    }

    #[tokio::test]
    async fn test_write_during_flight_is_not_masked() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        store.set_query_delay(Duration::from_millis(100));
        let ctx = TenantContext::for_tests("t1");

        let early = {
            let coordinator = coordinator.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                coordinator.get(&ctx, Metric::SalesCount, TimeWindow::all()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Write lands while the first computation is running
        add_sale(&store, &coordinator, "t1", 100);
        let late = coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        assert_eq!(late.result.value, MetricValue::Count(2));

        early.await.unwrap().unwrap();
        let again = coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        assert!(again.cached);
        assert_eq!(again.result.value, MetricValue::Count(2));
    }

    #[tokio::test]
    async fn test_stale_fallback_when_store_down() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        let ctx = TenantContext::for_tests("t1");

        coordinator.get(&ctx, Metric::TotalRevenue, TimeWindow::all()).await.unwrap();
        add_sale(&store, &coordinator, "t1", 500);
        store.set_online(false);

        let degraded = coordinator
            .get(&ctx, Metric::TotalRevenue, TimeWindow::all())
            .await
            .unwrap();
        assert!(degraded.cached);
        assert!(degraded.stale);
        assert_eq!(degraded.result.value, MetricValue::Money(Money::from_cents(2000)));
        assert_eq!(coordinator.stats().stale_served, 1);
    }

    #[tokio::test]
    async fn test_store_down_without_fallback_surfaces_error() {
        let settings = CoordinatorSettings {
            serve_stale: false,
            ..CoordinatorSettings::default()
        };
        let (coordinator, store) = setup(settings);
        let ctx = TenantContext::for_tests("t1");

        coordinator.get(&ctx, Metric::TotalRevenue, TimeWindow::all()).await.unwrap();
        add_sale(&store, &coordinator, "t1", 500);
        store.set_online(false);

        let result = coordinator
            .get(&ctx, Metric::TotalRevenue, TimeWindow::all())
            .await;
        assert!(matches!(result, Err(CacheError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cold_cache_store_down_is_unavailable() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        store.set_online(false);
        let ctx = TenantContext::for_tests("t1");

        let result = coordinator.get(&ctx, Metric::UnitsSold, TimeWindow::all()).await;
        assert!(matches!(result, Err(CacheError::StoreUnavailable(_))));
        assert_eq!(coordinator.inflight_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_timeout_without_fallback() {
        let settings = CoordinatorSettings {
            wait_timeout: Duration::from_millis(20),
            ..CoordinatorSettings::default()
        };
        let (coordinator, store) = setup(settings);
        store.set_query_delay(Duration::from_millis(150));
        let ctx = TenantContext::for_tests("t1");

        let result = coordinator.get(&ctx, Metric::SalesCount, TimeWindow::all()).await;
        assert!(matches!(result, Err(CacheError::Timeout(_))));

        // The shared computation keeps running and fills the cache
        tokio::time::sleep(Duration::from_millis(250)).await;
        let later = coordinator
            .get(&ctx, Metric::SalesCount, TimeWindow::all())
            .await
            .unwrap();
        assert!(later.cached);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_cancel_computation() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        store.set_query_delay(Duration::from_millis(80));
        let ctx = TenantContext::for_tests("t1");

        let leader = {
            let coordinator = coordinator.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                coordinator.get(&ctx, Metric::UnitsSold, TimeWindow::all()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let follower = coordinator
            .get(&ctx, Metric::UnitsSold, TimeWindow::all());
        leader.abort();

        let result = follower.await.unwrap();
        assert_eq!(result.result.value, MetricValue::Units(2));
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn test_get_many_and_invalidate_tenant() {
        let (coordinator, store) = setup(CoordinatorSettings::default());
        let ctx = TenantContext::for_tests("t1");

        let results = coordinator
            .get_many(&ctx, &Metric::ALL, TimeWindow::all())
            .await;
        assert_eq!(results.len(), Metric::ALL.len());
        assert!(results.iter().all(|(_, r)| r.is_ok()));
        assert_eq!(store.query_count(), Metric::ALL.len() as u64);

        coordinator.invalidate_tenant(&tenant("t1"));
        let again = coordinator
            .get(&ctx, Metric::ProductCount, TimeWindow::all())
            .await
            .unwrap();
        assert!(!again.cached);
    }

    #[tokio::test]
    async fn test_invalidate_all_on_empty_cache() {
        let (coordinator, _) = setup(CoordinatorSettings::default());
        coordinator.invalidate_all();
        assert_eq!(coordinator.stats().total_entries, 0);
        assert_eq!(coordinator.cleanup_expired(), 0);
    }
}
