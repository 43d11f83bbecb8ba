//! Demo Data
//!
//! Two tenants with one seller each and a small catalog, loaded at
//! start-up when `SEED_DEMO_DATA` is enabled.

use chrono::{Duration, Utc};
use tracing::{info, warn};

use crate::aggregation::Money;
use crate::auth::AuthGateway;
use crate::store::{MemoryStore, Product, Sale};
use crate::tenant::TenantId;

/// Password shared by the demo sellers.
pub const DEMO_PASSWORD: &str = "password123";

struct DemoProduct {
    name: &'static str,
    price_cents: i64,
    inventory: i64,
}

/// (product index, quantity, days ago)
type DemoSale = (usize, i64, i64);

struct DemoTenant {
    id: &'static str,
    email: &'static str,
    products: &'static [DemoProduct],
    sales: &'static [DemoSale],
}

const DEMO_TENANTS: [DemoTenant; 2] = [
    DemoTenant {
        id: "tenant-001",
        email: "seller@tenant-001.com",
        products: &[
            DemoProduct { name: "Widget", price_cents: 1999, inventory: 50 },
            DemoProduct { name: "Gadget", price_cents: 4950, inventory: 5 },
            DemoProduct { name: "Gizmo", price_cents: 500, inventory: 0 },
        ],
        sales: &[(0, 2, 1), (1, 1, 3), (0, 3, 10)],
    },
    DemoTenant {
        id: "tenant-002",
        email: "seller@tenant-002.com",
        products: &[
            DemoProduct { name: "Desk Lamp", price_cents: 12_000, inventory: 8 },
            DemoProduct { name: "Standing Desk", price_cents: 35_000, inventory: 12 },
        ],
        sales: &[(1, 1, 2), (0, 4, 20)],
    },
];

/// Registers the demo sellers and writes their catalogs and sales.
pub fn seed_demo_data(gateway: &AuthGateway, store: &MemoryStore) {
    let now = Utc::now();

    for tenant in &DEMO_TENANTS {
        let Some(tenant_id) = TenantId::parse(tenant.id) else {
            continue;
        };
        gateway.register(tenant.email, DEMO_PASSWORD, tenant_id.clone());

        let mut product_ids = Vec::with_capacity(tenant.products.len());
        for demo in tenant.products {
            let product = Product::new(
                tenant_id.clone(),
                demo.name,
                Money::from_cents(demo.price_cents),
                demo.inventory,
                now - Duration::days(30),
            );
            product_ids.push((product.id, product.price));
            store.insert_product(product);
        }

        for &(index, quantity, days_ago) in tenant.sales {
            let (product_id, price) = product_ids[index];
            let sold_at = now - Duration::days(days_ago);
            match Sale::new(tenant_id.clone(), product_id, quantity, price, sold_at) {
                Ok(sale) => store.insert_sale(sale),
                Err(e) => warn!(%tenant_id, error = %e, "Skipping demo sale"),
            }
        }

        info!(
            %tenant_id,
            products = tenant.products.len(),
            sales = tenant.sales.len(),
            "Demo tenant seeded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::TimeWindow;
    use crate::store::{ConnectionPool, RecordStore};

    #[tokio::test]
    async fn test_seed_populates_both_tenants() {
        let gateway = AuthGateway::new(std::time::Duration::from_secs(60));
        let store = MemoryStore::new(ConnectionPool::new(2, std::time::Duration::from_secs(1)));

        seed_demo_data(&gateway, &store);

        let t1 = TenantId::parse("tenant-001").unwrap();
        let t2 = TenantId::parse("tenant-002").unwrap();
        assert_eq!(store.products(&t1, &TimeWindow::all()).await.unwrap().len(), 3);
        assert_eq!(store.sales(&t1, &TimeWindow::all()).await.unwrap().len(), 3);
        assert_eq!(store.sales(&t2, &TimeWindow::all()).await.unwrap().len(), 2);

        let credential = gateway
            .authenticate("seller@tenant-002.com", DEMO_PASSWORD)
            .unwrap();
        assert_eq!(credential.tenant_id, t2);
    }
}
