//! Property-Based Tests for Aggregation
//!
//! Uses proptest to check that aggregates are exact, order independent,
//! and confined to the requesting tenant.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use crate::aggregation::{AggregationEngine, Metric, MetricValue, Money, RetryPolicy, TimeWindow};
use crate::store::{ConnectionPool, MemoryStore, Product, Sale};
use crate::tenant::{TenantContext, TenantId};

// == Strategies ==
/// (tenant index, quantity, unit price in cents, day of January)
fn sale_strategy() -> impl Strategy<Value = (usize, i64, i64, u32)> {
    (0usize..2, 1i64..20, 0i64..100_000, 1u32..=31)
}

fn product_strategy() -> impl Strategy<Value = (usize, i64, i64)> {
    (0usize..2, 0i64..500, 0i64..1_000_000)
}

const TENANTS: [&str; 2] = ["tenant-a", "tenant-b"];

fn build_store(
    products: &[(usize, i64, i64)],
    sales: &[(usize, i64, i64, u32)],
) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new(ConnectionPool::new(
        2,
        Duration::from_secs(1),
    )));
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    for &(t, inventory, price) in products {
        let tenant = TenantId::parse(TENANTS[t]).unwrap();
        store.insert_product(Product::new(
            tenant,
            "p",
            Money::from_cents(price),
            inventory,
            created,
        ));
    }
    for &(t, qty, price, day) in sales {
        let tenant = TenantId::parse(TENANTS[t]).unwrap();
        let sold_at = Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap();
        store.insert_sale(Sale::new(
            tenant,
            uuid::Uuid::nil(),
            qty,
            Money::from_cents(price),
            sold_at,
        )
        .unwrap());
    }
    store
}

fn compute_all(store: Arc<MemoryStore>, tenant: &str) -> Vec<(Metric, MetricValue, u64)> {
    let engine = AggregationEngine::new(store, RetryPolicy::none(), 10);
    let ctx = TenantContext::for_tests(tenant);

    tokio_test::block_on(async {
        let mut out = Vec::new();
        for metric in Metric::ALL {
            let result = engine
                .compute(&ctx, metric, &TimeWindow::all())
                .await
                .unwrap();
            out.push((metric, result.value, result.record_count));
        }
        out
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Revenue is the exact fixed-point sum of the tenant's sale totals.
    #[test]
    fn prop_revenue_is_exact_sum(sales in prop::collection::vec(sale_strategy(), 0..40)) {
        let store = build_store(&[], &sales);
        let expected: i64 = sales
            .iter()
            .filter(|(t, ..)| *t == 0)
            .map(|(_, qty, price, _)| qty * price)
            .sum();

        let results = compute_all(store, TENANTS[0]);
        let revenue = results
            .iter()
            .find(|(m, ..)| *m == Metric::TotalRevenue)
            .map(|(_, v, _)| *v)
            .unwrap();
        prop_assert_eq!(revenue, MetricValue::Money(Money::from_cents(expected)));
    }

    // Insertion order does not change any aggregate.
    #[test]
    fn prop_order_independent(
        products in prop::collection::vec(product_strategy(), 0..20),
        sales in prop::collection::vec(sale_strategy(), 0..20),
    ) {
        let forward = compute_all(build_store(&products, &sales), TENANTS[0]);

        let mut rev_products = products.clone();
        rev_products.reverse();
        let mut rev_sales = sales.clone();
        rev_sales.reverse();
        let backward = compute_all(build_store(&rev_products, &rev_sales), TENANTS[0]);

        prop_assert_eq!(forward, backward);
    }

    // Record counts only ever include the requesting tenant's rows.
    #[test]
    fn prop_counts_are_tenant_scoped(
        products in prop::collection::vec(product_strategy(), 0..20),
        sales in prop::collection::vec(sale_strategy(), 0..20),
    ) {
        let store = build_store(&products, &sales);
        for (idx, tenant) in TENANTS.iter().enumerate() {
            let results = compute_all(store.clone(), tenant);
            let own_products = products.iter().filter(|(t, ..)| *t == idx).count() as u64;
            let own_sales = sales.iter().filter(|(t, ..)| *t == idx).count() as u64;

            for (metric, _, count) in results {
                let expected = match metric.source() {
                    crate::store::RecordKind::Product => own_products,
                    crate::store::RecordKind::Sale => own_sales,
                };
                prop_assert_eq!(count, expected, "{} count mismatch", metric);
            }
        }
    }
}
