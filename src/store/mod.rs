//! Record Store Module
//!
//! Read access to tenants' transactional records through pooled
//! connections, plus the write notifications that drive cache invalidation.

mod memory;
mod pool;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::aggregation::{Money, TimeWindow};
use crate::tenant::TenantId;

pub use memory::MemoryStore;
pub use pool::{ConnectionPool, PooledConnection};

// == Store Error ==
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store cannot be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No pooled connection became free in time
    #[error("Timed out acquiring a store connection")]
    PoolTimeout,

    #[error("Record not found: {0}")]
    NotFound(Uuid),

    /// A record failed validation and was not written
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Transient failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::PoolTimeout)
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Record Kind ==
/// Table a record lives in; the unit of selective invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Product,
    Sale,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::Product, RecordKind::Sale];
}

// == Records ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub name: String,
    pub price: Money,
    /// Units currently in stock
    pub inventory: i64,
    pub created_at: DateTime<Utc>,
}

impl Product {
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        price: Money,
        inventory: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            price,
            inventory,
            created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sale {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub product_id: Uuid,
    pub quantity: i64,
    pub unit_price: Money,
    /// `unit_price * quantity`, fixed at write time
    pub total: Money,
    pub sold_at: DateTime<Utc>,
}

impl Sale {
    /// Builds a sale, rejecting one whose total does not fit in `Money`.
    pub fn new(
        tenant_id: TenantId,
        product_id: Uuid,
        quantity: i64,
        unit_price: Money,
        sold_at: DateTime<Utc>,
    ) -> StoreResult<Self> {
        let total = unit_price.cents().checked_mul(quantity).ok_or_else(|| {
            StoreError::InvalidRecord(format!(
                "sale total overflows: {} x {}",
                unit_price, quantity
            ))
        })?;

        Ok(Self {
            id: Uuid::new_v4(),
            tenant_id,
            product_id,
            quantity,
            unit_price,
            total: Money::from_cents(total),
            sold_at,
        })
    }
}

// == Write Event ==
/// Published after a record of `kind` is inserted or updated for a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteEvent {
    pub tenant_id: TenantId,
    pub kind: RecordKind,
}

// == Write Observer ==
/// Notified synchronously on the write path, before the write call
/// returns.
pub trait WriteObserver: Send + Sync {
    fn on_write(&self, event: &WriteEvent);
}

// == Record Store ==
/// Tenant-parameterized reads over the source of truth.
///
/// Every query takes exactly one tenant; implementations acquire a pooled
/// connection for the duration of the query only.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Products of `tenant_id` created inside `window`.
    async fn products(&self, tenant_id: &TenantId, window: &TimeWindow)
        -> StoreResult<Vec<Product>>;

    /// Sales of `tenant_id` made inside `window`.
    async fn sales(&self, tenant_id: &TenantId, window: &TimeWindow) -> StoreResult<Vec<Sale>>;
}
