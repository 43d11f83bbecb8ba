//! Metric Definitions
//!
//! The closed set of aggregates the engine can compute, and the values
//! they produce.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ComputeError, Money, TimeWindow};
use crate::store::RecordKind;
use crate::tenant::TenantId;

// == Metric ==
/// A named, tenant-scoped aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ProductCount,
    TotalInventory,
    LowStockCount,
    MinProductPrice,
    MaxProductPrice,
    AverageProductPrice,
    SalesCount,
    UnitsSold,
    TotalRevenue,
    AverageOrderValue,
}

impl Metric {
    /// Every metric, in dashboard order.
    pub const ALL: [Metric; 10] = [
        Metric::ProductCount,
        Metric::TotalInventory,
        Metric::LowStockCount,
        Metric::MinProductPrice,
        Metric::MaxProductPrice,
        Metric::AverageProductPrice,
        Metric::SalesCount,
        Metric::UnitsSold,
        Metric::TotalRevenue,
        Metric::AverageOrderValue,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::ProductCount => "product_count",
            Metric::TotalInventory => "total_inventory",
            Metric::LowStockCount => "low_stock_count",
            Metric::MinProductPrice => "min_product_price",
            Metric::MaxProductPrice => "max_product_price",
            Metric::AverageProductPrice => "average_product_price",
            Metric::SalesCount => "sales_count",
            Metric::UnitsSold => "units_sold",
            Metric::TotalRevenue => "total_revenue",
            Metric::AverageOrderValue => "average_order_value",
        }
    }

    /// The record kind this metric folds over.
    ///
    /// Writes to that kind are what invalidate cached values of the metric.
    pub fn source(self) -> RecordKind {
        match self {
            Metric::ProductCount
            | Metric::TotalInventory
            | Metric::LowStockCount
            | Metric::MinProductPrice
            | Metric::MaxProductPrice
            | Metric::AverageProductPrice => RecordKind::Product,
            Metric::SalesCount
            | Metric::UnitsSold
            | Metric::TotalRevenue
            | Metric::AverageOrderValue => RecordKind::Sale,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| ComputeError::UnknownMetric(s.to_string()))
    }
}

// == Metric Value ==
/// Scalar produced by an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// Number of records
    Count(u64),
    /// Sum of an integer quantity
    Units(i64),
    Money(Money),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{}", n),
            MetricValue::Units(n) => write!(f, "{}", n),
            MetricValue::Money(m) => write!(f, "{}", m),
        }
    }
}

// == Aggregate Result ==
/// A computed metric for one tenant and window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub tenant_id: TenantId,
    pub metric: Metric,
    pub window: TimeWindow,
    pub value: MetricValue,
    /// Number of records folded into `value`
    pub record_count: u64,
    pub computed_at: DateTime<Utc>,
}

impl AggregateResult {
    /// True if both results carry the same figure for the same scope,
    /// regardless of when each was computed.
    pub fn same_figure(&self, other: &AggregateResult) -> bool {
        self.tenant_id == other.tenant_id
            && self.metric == other.metric
            && self.window == other.window
            && self.value == other.value
            && self.record_count == other.record_count
    }
}
