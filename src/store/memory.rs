//! In-Memory Record Store
//!
//! Process-local tables behind the [`RecordStore`] trait, with a write path
//! that notifies [`WriteObserver`]s before returning, publishes
//! [`WriteEvent`]s, and a switch for simulating outages.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    ConnectionPool, Product, RecordKind, RecordStore, Sale, StoreError, StoreResult, WriteEvent,
    WriteObserver,
};
use crate::aggregation::TimeWindow;
use crate::tenant::TenantId;

/// Capacity of the write-event channel before slow subscribers lag
const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    sales: Vec<Sale>,
}

// == Memory Store ==
pub struct MemoryStore {
    tables: RwLock<Tables>,
    pool: ConnectionPool,
    online: AtomicBool,
    /// Artificial per-query latency in milliseconds
    query_delay_ms: AtomicU64,
    /// Queries served so far
    queries: AtomicU64,
    events: broadcast::Sender<WriteEvent>,
    /// Held weakly: observers such as the cache coordinator own the
    /// store through their engine
    observers: RwLock<Vec<Weak<dyn WriteObserver>>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("pool", &self.pool)
            .field("online", &self.is_online())
            .field("queries", &self.query_count())
            .field("observers", &self.observers.read().len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    // == Constructor ==
    pub fn new(pool: ConnectionPool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tables: RwLock::new(Tables::default()),
            pool,
            online: AtomicBool::new(true),
            query_delay_ms: AtomicU64::new(0),
            queries: AtomicU64::new(0),
            events,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Registers an observer that sees every write before the write call
    /// returns. Dropped observers are pruned on the next write.
    pub fn add_observer<O: WriteObserver + 'static>(&self, observer: &Arc<O>) {
        let observer: Arc<dyn WriteObserver> = observer.clone();
        self.observers.write().push(Arc::downgrade(&observer));
    }

    /// Receiver for write events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WriteEvent> {
        self.events.subscribe()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    // == Availability ==
    /// Takes the store offline or brings it back; offline queries fail
    /// with [`StoreError::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
        info!(online, "Record store availability changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Adds fixed latency to every query.
    pub fn set_query_delay(&self, delay: Duration) {
        self.query_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Number of queries that reached the tables.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    // == Write Path ==
    pub fn insert_product(&self, product: Product) {
        let tenant_id = product.tenant_id.clone();
        self.tables.write().products.push(product);
        self.publish(tenant_id, RecordKind::Product);
    }

    /// Sets a product's stock level.
    pub fn update_inventory(
        &self,
        tenant_id: &TenantId,
        product_id: Uuid,
        inventory: i64,
    ) -> StoreResult<()> {
        {
            let mut tables = self.tables.write();
            let product = tables
                .products
                .iter_mut()
                .find(|p| p.id == product_id && &p.tenant_id == tenant_id)
                .ok_or(StoreError::NotFound(product_id))?;
            product.inventory = inventory;
        }
        self.publish(tenant_id.clone(), RecordKind::Product);
        Ok(())
    }

    pub fn insert_sale(&self, sale: Sale) {
        let tenant_id = sale.tenant_id.clone();
        self.tables.write().sales.push(sale);
        self.publish(tenant_id, RecordKind::Sale);
    }

    fn publish(&self, tenant_id: TenantId, kind: RecordKind) {
        debug!(%tenant_id, ?kind, "Record written");
        let event = WriteEvent { tenant_id, kind };

        let mut pruned = false;
        for observer in self.observers.read().iter() {
            match observer.upgrade() {
                Some(observer) => observer.on_write(&event),
                None => pruned = true,
            }
        }
        if pruned {
            self.observers.write().retain(|o| o.strong_count() > 0);
        }

        // No subscribers is fine; nothing is cached yet.
        let _ = self.events.send(event);
    }

    // == Query Helpers ==
    async fn begin_query(&self) -> StoreResult<()> {
        let delay = self.query_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if !self.is_online() {
            return Err(StoreError::Unavailable("record store offline".to_string()));
        }
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn products(
        &self,
        tenant_id: &TenantId,
        window: &TimeWindow,
    ) -> StoreResult<Vec<Product>> {
        let _conn = self.pool.acquire().await?;
        self.begin_query().await?;

        Ok(self
            .tables
            .read()
            .products
            .iter()
            .filter(|p| &p.tenant_id == tenant_id && window.contains(p.created_at))
            .cloned()
            .collect())
    }

    async fn sales(&self, tenant_id: &TenantId, window: &TimeWindow) -> StoreResult<Vec<Sale>> {
        let _conn = self.pool.acquire().await?;
        self.begin_query().await?;

        Ok(self
            .tables
            .read()
            .sales
            .iter()
            .filter(|s| &s.tenant_id == tenant_id && window.contains(s.sold_at))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Money;
    use chrono::{TimeZone, Utc};

    fn tenant(id: &str) -> TenantId {
        TenantId::parse(id).unwrap()
    }

    fn store() -> MemoryStore {
        MemoryStore::new(ConnectionPool::new(4, Duration::from_millis(100)))
    }

    #[tokio::test]
    async fn test_queries_are_tenant_scoped() {
        let store = store();
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        store.insert_product(Product::new(tenant("t1"), "a", Money::from_cents(100), 5, at));
        store.insert_product(Product::new(tenant("t2"), "b", Money::from_cents(200), 5, at));

        let rows = store.products(&tenant("t1"), &TimeWindow::all()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows.iter().all(|p| p.tenant_id == tenant("t1")));
    }

    #[tokio::test]
    async fn test_window_filtering() {
        let store = store();
        let jan = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();
        let pid = Uuid::new_v4();
        store.insert_sale(Sale::new(tenant("t1"), pid, 1, Money::from_cents(100), jan).unwrap());
        store.insert_sale(Sale::new(tenant("t1"), pid, 1, Money::from_cents(100), feb).unwrap());

        let window = TimeWindow::between(
            chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
        )
        .unwrap();
        let rows = store.sales(&tenant("t1"), &window).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_store_fails_and_releases_connection() {
        let store = store();
        store.set_online(false);

        let result = store.products(&tenant("t1"), &TimeWindow::all()).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.pool().available(), 4);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_writes_publish_events() {
        let store = store();
        let mut events = store.subscribe();

        let product = Product::new(tenant("t1"), "a", Money::from_cents(100), 5, Utc::now());
        let id = product.id;
        store.insert_product(product);
        store.update_inventory(&tenant("t1"), id, 2).unwrap();

        let first = events.recv().await.unwrap();
        assert_eq!(first.kind, RecordKind::Product);
        assert_eq!(first.tenant_id, tenant("t1"));
        assert_eq!(events.recv().await.unwrap().kind, RecordKind::Product);
    }

    #[derive(Default)]
    struct Recorder {
        seen: parking_lot::Mutex<Vec<WriteEvent>>,
    }

    impl WriteObserver for Recorder {
        fn on_write(&self, event: &WriteEvent) {
            self.seen.lock().push(event.clone());
        }
    }

    #[test]
    fn test_observers_see_writes_before_return() {
        let store = store();
        let recorder = Arc::new(Recorder::default());
        store.add_observer(&recorder);

        let sale = Sale::new(tenant("t1"), Uuid::new_v4(), 1, Money::from_cents(100), Utc::now());
        store.insert_sale(sale.unwrap());

        let seen = recorder.seen.lock().clone();
        assert_eq!(
            seen,
            vec![WriteEvent {
                tenant_id: tenant("t1"),
                kind: RecordKind::Sale,
            }]
        );
    }

    #[test]
    fn test_dropped_observer_is_pruned() {
        let store = store();
        let recorder = Arc::new(Recorder::default());
        store.add_observer(&recorder);
        drop(recorder);

        store.insert_product(Product::new(tenant("t1"), "a", Money::from_cents(100), 5, Utc::now()));
        assert_eq!(store.observers.read().len(), 0);
    }

    #[test]
    fn test_update_inventory_respects_tenant() {
        let store = store();
        let product = Product::new(tenant("t1"), "a", Money::from_cents(100), 5, Utc::now());
        let id = product.id;
        store.insert_product(product);

        let result = store.update_inventory(&tenant("t2"), id, 0);
        assert_eq!(result, Err(StoreError::NotFound(id)));
    }
}
