//! In-memory stores and product catalog, used by tests and for running the
//! service without PostgreSQL or a product service.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use tokio::sync::RwLock;

use crate::domain::errors::DomainError;
use crate::domain::order::{LineItem, NewLineItem, NewOrder, OrderRecord};
use crate::domain::ports::{LineItemStore, OrderStore, ProductClient, ProductClientError};
use crate::domain::product::Product;

// ── Order / line-item store ──────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    orders: BTreeMap<i64, OrderRecord>,
    line_items: BTreeMap<i64, LineItem>,
    next_order_id: i64,
    next_line_item_id: i64,
}

/// Both tables live behind one lock, so an aggregate insert is all-or-nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    tables: Arc<RwLock<Tables>>,
    fail_on_persist: Arc<AtomicBool>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next aggregate inserts fail with a persistence error.
    pub fn set_fail_on_persist(&self, fail: bool) {
        self.fail_on_persist.store(fail, Ordering::SeqCst);
    }

    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    pub async fn line_item_count(&self) -> usize {
        self.tables.read().await.line_items.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderRepository {
    async fn insert_aggregate(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<(OrderRecord, Vec<LineItem>), DomainError> {
        let mut tables = self.tables.write().await;

        if self.fail_on_persist.load(Ordering::SeqCst) {
            return Err(DomainError::Persistence(
                "simulated failure while inserting line items".to_string(),
            ));
        }

        tables.next_order_id += 1;
        let record = OrderRecord {
            id: tables.next_order_id,
            customer: order.customer,
            created_at: order.created_at,
            total: order.total,
            status: order.status,
        };
        tables.orders.insert(record.id, record.clone());

        let mut saved = Vec::with_capacity(items.len());
        for item in items {
            tables.next_line_item_id += 1;
            let line = LineItem {
                id: tables.next_line_item_id,
                order_id: record.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            };
            tables.line_items.insert(line.id, line.clone());
            saved.push(line);
        }

        Ok((record, saved))
    }

    async fn find_all(&self) -> Result<Vec<OrderRecord>, DomainError> {
        Ok(self.tables.read().await.orders.values().cloned().collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<OrderRecord>, DomainError> {
        Ok(self.tables.read().await.orders.get(&id).cloned())
    }

    async fn update(&self, order: &OrderRecord) -> Result<OrderRecord, DomainError> {
        let mut tables = self.tables.write().await;
        let stored = tables.orders.get_mut(&order.id).ok_or(DomainError::NotFound)?;
        *stored = order.clone();
        Ok(stored.clone())
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError> {
        Ok(self.tables.write().await.orders.remove(&id).is_some())
    }
}

#[async_trait]
impl LineItemStore for InMemoryOrderRepository {
    async fn find_by_order_id(&self, order_id: i64) -> Result<Vec<LineItem>, DomainError> {
        Ok(self
            .tables
            .read()
            .await
            .line_items
            .values()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn delete(&self, id: i64) -> Result<(), DomainError> {
        self.tables.write().await.line_items.remove(&id);
        Ok(())
    }
}

// ── Product catalog ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Catalog {
    products: HashMap<i64, Product>,
    decrements: Vec<(i64, i32)>,
    latency: Option<Duration>,
    fail_fetch: bool,
    fail_decrement: bool,
}

/// A product service double. Stock decrements are applied to the catalog and
/// recorded so tests can assert on them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    catalog: Arc<Mutex<Catalog>>,
    fetch_calls: Arc<AtomicUsize>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn catalog(&self) -> MutexGuard<'_, Catalog> {
        self.catalog.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_product(&self, id: i64, name: &str, price: BigDecimal, stock: i32) {
        self.catalog().products.insert(
            id,
            Product {
                id,
                name: name.to_string(),
                price,
                stock,
                active: true,
            },
        );
    }

    pub fn set_price(&self, id: i64, price: BigDecimal) {
        if let Some(product) = self.catalog().products.get_mut(&id) {
            product.price = price;
        }
    }

    pub fn set_latency(&self, latency: Duration) {
        self.catalog().latency = Some(latency);
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.catalog().fail_fetch = fail;
    }

    pub fn set_fail_decrement(&self, fail: bool) {
        self.catalog().fail_decrement = fail;
    }

    pub fn stock_of(&self, id: i64) -> Option<i32> {
        self.catalog().products.get(&id).map(|p| p.stock)
    }

    /// Successful decrements as `(product_id, quantity)`, in arrival order.
    pub fn decrements(&self) -> Vec<(i64, i32)> {
        self.catalog().decrements.clone()
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        let latency = self.catalog().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ProductClient for InMemoryProductCatalog {
    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, ProductClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        let catalog = self.catalog();
        if catalog.fail_fetch {
            return Err(ProductClientError::Status { status: 503 });
        }
        Ok(catalog.products.get(&id).cloned())
    }

    async fn decrement_stock(&self, id: i64, quantity: i32) -> Result<(), ProductClientError> {
        self.simulate_latency().await;

        let mut catalog = self.catalog();
        if catalog.fail_decrement {
            return Err(ProductClientError::Status { status: 503 });
        }
        let product = catalog
            .products
            .get_mut(&id)
            .ok_or(ProductClientError::Status { status: 404 })?;
        if product.stock < quantity {
            return Err(ProductClientError::Rejected(format!(
                "stock of product {id} is {}, cannot remove {quantity}",
                product.stock
            )));
        }
        product.stock -= quantity;
        catalog.decrements.push((id, quantity));
        Ok(())
    }
}
