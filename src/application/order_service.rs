use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use futures::future::{join_all, try_join_all};

use crate::domain::errors::DomainError;
use crate::domain::order::{LineItem, NewLineItem, NewOrder, Order, OrderRecord, RequestedLineItem};
use crate::domain::ports::{LineItemStore, OrderStore};

use super::product_gate::ProductGate;

/// Orchestrates the order aggregate: validation against the product service,
/// atomic persistence of the order with its line items, the post-commit stock
/// decrement, and every read that has to reattach line items.
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    line_items: Arc<dyn LineItemStore>,
    products: ProductGate,
    stock_decrement_failures: Arc<AtomicU64>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        line_items: Arc<dyn LineItemStore>,
        products: ProductGate,
    ) -> Self {
        Self {
            orders,
            line_items,
            products,
            stock_decrement_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn products(&self) -> &ProductGate {
        &self.products
    }

    /// Stock decrements that failed after their order was committed. Each one
    /// is a unit of drift between this service and the product service.
    pub fn stock_decrement_failures(&self) -> u64 {
        self.stock_decrement_failures.load(Ordering::Relaxed)
    }

    pub async fn create_order(
        &self,
        customer: String,
        requested: Vec<RequestedLineItem>,
    ) -> Result<Order, DomainError> {
        validate_request(&requested)?;

        // 1. Validate every item against the product service, concurrently.
        //    Results keep input order, so the reported error is the first
        //    failing item in the request.
        let validated: Vec<NewLineItem> = join_all(
            requested
                .iter()
                .map(|item| self.validate_line_item(item)),
        )
        .await
        .into_iter()
        .collect::<Result<_, _>>()?;

        // 2. Aggregate
        let new_order = NewOrder::pending(customer, &validated, Utc::now());

        // 3. Persist order and line items in one transaction
        let (record, line_items) = self.orders.insert_aggregate(new_order, validated).await?;
        log::info!(
            "Created order {} for '{}' with {} line items, total {}",
            record.id,
            record.customer,
            line_items.len(),
            record.total
        );

        // 4. Best effort: the order stays committed whatever happens here
        self.decrement_stock(record.id, &line_items).await;

        Ok(record.with_line_items(line_items))
    }

    async fn validate_line_item(
        &self,
        item: &RequestedLineItem,
    ) -> Result<NewLineItem, DomainError> {
        let product = self
            .products
            .fetch_product(item.product_id)
            .await?
            .ok_or(DomainError::ProductNotFound {
                product_id: item.product_id,
            })?;

        if product.stock < item.quantity {
            return Err(DomainError::InsufficientStock {
                product_id: product.id,
                product_name: product.name,
                requested: item.quantity,
                available: product.stock,
            });
        }

        Ok(NewLineItem {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: product.price,
        })
    }

    async fn decrement_stock(&self, order_id: i64, line_items: &[LineItem]) {
        let outcomes = join_all(
            line_items
                .iter()
                .map(|line| self.products.decrement_stock(line.product_id, line.quantity)),
        )
        .await;

        for (line, outcome) in line_items.iter().zip(outcomes) {
            if let Err(e) = outcome {
                self.stock_decrement_failures.fetch_add(1, Ordering::Relaxed);
                log::warn!(
                    "Stock decrement failed after order {} was committed \
                     (product {}, quantity {}): {}",
                    order_id,
                    line.product_id,
                    line.quantity,
                    e
                );
            }
        }
    }

    pub async fn find_all(&self) -> Result<Vec<Order>, DomainError> {
        let records = self.orders.find_all().await?;
        try_join_all(records.into_iter().map(|record| self.attach_line_items(record))).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Order>, DomainError> {
        match self.orders.find_by_id(id).await? {
            Some(record) => Ok(Some(self.attach_line_items(record).await?)),
            None => Ok(None),
        }
    }

    /// The status value is stored as given.
    pub async fn update_status(&self, id: i64, status: String) -> Result<Option<Order>, DomainError> {
        let Some(mut record) = self.orders.find_by_id(id).await? else {
            return Ok(None);
        };

        record.status = status;
        let saved = self.orders.update(&record).await?;
        log::info!("Order {} moved to status {}", saved.id, saved.status);

        Ok(Some(self.attach_line_items(saved).await?))
    }

    /// Line items are removed one by one before their order, since the stores
    /// do not cascade. Returns `false` when the order does not exist.
    pub async fn delete_order(&self, id: i64) -> Result<bool, DomainError> {
        if self.orders.find_by_id(id).await?.is_none() {
            return Ok(false);
        }

        for line in self.line_items.find_by_order_id(id).await? {
            self.line_items.delete(line.id).await?;
        }
        let deleted = self.orders.delete_by_id(id).await?;
        log::info!("Deleted order {}", id);

        Ok(deleted)
    }

    async fn attach_line_items(&self, record: OrderRecord) -> Result<Order, DomainError> {
        let line_items = self.line_items.find_by_order_id(record.id).await?;
        Ok(record.with_line_items(line_items))
    }
}

fn validate_request(requested: &[RequestedLineItem]) -> Result<(), DomainError> {
    if requested.is_empty() {
        return Err(DomainError::InvalidInput(
            "an order needs at least one line item".to_string(),
        ));
    }
    if let Some(item) = requested.iter().find(|item| item.quantity <= 0) {
        return Err(DomainError::InvalidInput(format!(
            "quantity for product {} must be positive, got {}",
            item.product_id, item.quantity
        )));
    }
    Ok(())
}
