//! Aggregation Engine
//!
//! Computes deterministic, tenant-scoped aggregates over the record store,
//! retrying transient store failures with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, warn};

use super::{AggregateResult, ComputeError, Metric, MetricValue, Money, TimeWindow};
use crate::store::{Product, RecordKind, RecordStore, Sale};
use crate::tenant::{TenantContext, TenantId};

// == Retry Policy ==
/// Bounded exponential backoff for transient store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// No retries.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(25))
    }
}

// == Aggregation Engine ==
pub struct AggregationEngine {
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
    /// Products with inventory strictly below this count as low stock
    low_stock_threshold: i64,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn RecordStore>, retry: RetryPolicy, low_stock_threshold: i64) -> Self {
        Self {
            store,
            retry,
            low_stock_threshold,
        }
    }

    // == Compute ==
    /// Computes `metric` over the context tenant's records inside `window`.
    ///
    /// Zero matching records yield the metric's zero value. Store outages are
    /// retried up to the policy's attempt count before
    /// [`ComputeError::StoreUnavailable`] is returned.
    pub async fn compute(
        &self,
        ctx: &TenantContext,
        metric: Metric,
        window: &TimeWindow,
    ) -> Result<AggregateResult, ComputeError> {
        let mut attempt = 1;
        loop {
            match self.compute_once(ctx.tenant_id(), metric, window).await {
                Err(ComputeError::StoreUnavailable(reason)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        tenant_id = %ctx.tenant_id(),
                        %metric,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "Store unavailable, retrying aggregation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(ComputeError::StoreUnavailable(reason)) => {
                    error!(
                        tenant_id = %ctx.tenant_id(),
                        %metric,
                        attempts = attempt,
                        %reason,
                        "Store unavailable, retries exhausted"
                    );
                    return Err(ComputeError::StoreUnavailable(reason));
                }
                other => return other,
            }
        }
    }

    async fn compute_once(
        &self,
        tenant_id: &TenantId,
        metric: Metric,
        window: &TimeWindow,
    ) -> Result<AggregateResult, ComputeError> {
        let (value, record_count) = match metric.source() {
            RecordKind::Product => {
                let rows = self.store.products(tenant_id, window).await?;
                ensure_tenant(tenant_id, rows.iter().map(|p| &p.tenant_id))?;
                (self.fold_products(metric, &rows)?, rows.len())
            }
            RecordKind::Sale => {
                let rows = self.store.sales(tenant_id, window).await?;
                ensure_tenant(tenant_id, rows.iter().map(|s| &s.tenant_id))?;
                (fold_sales(metric, &rows)?, rows.len())
            }
        };

        debug!(%tenant_id, %metric, %window, %value, record_count, "Aggregate computed");

        Ok(AggregateResult {
            tenant_id: tenant_id.clone(),
            metric,
            window: *window,
            value,
            record_count: record_count as u64,
            computed_at: Utc::now(),
        })
    }

    fn fold_products(&self, metric: Metric, rows: &[Product]) -> Result<MetricValue, ComputeError> {
        let prices = || rows.iter().map(|p| p.price);

        let value = match metric {
            Metric::ProductCount => MetricValue::Count(rows.len() as u64),
            Metric::TotalInventory => MetricValue::Units(
                checked_units(rows.iter().map(|p| p.inventory)).ok_or(ComputeError::Overflow(metric))?,
            ),
            Metric::LowStockCount => MetricValue::Count(
                rows.iter()
                    .filter(|p| p.inventory < self.low_stock_threshold)
                    .count() as u64,
            ),
            Metric::MinProductPrice => MetricValue::Money(prices().min().unwrap_or(Money::ZERO)),
            Metric::MaxProductPrice => MetricValue::Money(prices().max().unwrap_or(Money::ZERO)),
            Metric::AverageProductPrice => MetricValue::Money(
                Money::checked_mean(prices()).ok_or(ComputeError::Overflow(metric))?,
            ),
            other => return Err(ComputeError::UnknownMetric(other.to_string())),
        };
        Ok(value)
    }
}

fn fold_sales(metric: Metric, rows: &[Sale]) -> Result<MetricValue, ComputeError> {
    let totals = || rows.iter().map(|s| s.total);

    let value = match metric {
        Metric::SalesCount => MetricValue::Count(rows.len() as u64),
        Metric::UnitsSold => MetricValue::Units(
            checked_units(rows.iter().map(|s| s.quantity)).ok_or(ComputeError::Overflow(metric))?,
        ),
        Metric::TotalRevenue => MetricValue::Money(
            Money::checked_sum(totals()).ok_or(ComputeError::Overflow(metric))?,
        ),
        Metric::AverageOrderValue => MetricValue::Money(
            Money::checked_mean(totals()).ok_or(ComputeError::Overflow(metric))?,
        ),
        other => return Err(ComputeError::UnknownMetric(other.to_string())),
    };
    Ok(value)
}

fn checked_units<I: Iterator<Item = i64>>(values: I) -> Option<i64> {
    i64::try_from(values.map(i128::from).sum::<i128>()).ok()
}

/// Rejects a result set containing any row from another tenant.
fn ensure_tenant<'a, I>(expected: &TenantId, found: I) -> Result<(), ComputeError>
where
    I: IntoIterator<Item = &'a TenantId>,
{
    if let Some(foreign) = found.into_iter().find(|t| *t != expected) {
        error!(
            target: "security",
            expected_tenant = %expected,
            found_tenant = %foreign,
            "Store returned a row outside the requested tenant"
        );
        return Err(ComputeError::TenantMismatch {
            expected: expected.clone(),
            found: foreign.clone(),
        });
    }
    Ok(())
}
