use async_trait::async_trait;

use super::errors::DomainError;
use super::order::{LineItem, NewLineItem, NewOrder, OrderRecord};
use super::product::Product;

#[async_trait]
pub trait OrderStore: Send + Sync + 'static {
    /// Inserts the order, then every line item under the generated order id,
    /// as one unit: either all rows are stored or none are.
    async fn insert_aggregate(
        &self,
        order: NewOrder,
        items: Vec<NewLineItem>,
    ) -> Result<(OrderRecord, Vec<LineItem>), DomainError>;
    async fn find_all(&self) -> Result<Vec<OrderRecord>, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<OrderRecord>, DomainError>;
    async fn update(&self, order: &OrderRecord) -> Result<OrderRecord, DomainError>;
    /// Returns `false` when no order had that id.
    async fn delete_by_id(&self, id: i64) -> Result<bool, DomainError>;
}

#[async_trait]
pub trait LineItemStore: Send + Sync + 'static {
    async fn find_by_order_id(&self, order_id: i64) -> Result<Vec<LineItem>, DomainError>;
    async fn delete(&self, id: i64) -> Result<(), DomainError>;
}

#[async_trait]
pub trait ProductClient: Send + Sync + 'static {
    /// `Ok(None)` means the product service has no such product.
    async fn fetch_product(&self, id: i64) -> Result<Option<Product>, ProductClientError>;
    async fn decrement_stock(&self, id: i64, quantity: i32) -> Result<(), ProductClientError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProductClientError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("product service responded with status {status}")]
    Status { status: u16 },
    #[error("could not decode product service response: {0}")]
    Decode(String),
    #[error("call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("{0}")]
    Rejected(String),
}

impl ProductClientError {
    /// The product service answered and refused the request. It is reachable,
    /// so this is not held against its circuit breaker.
    pub fn is_rejection(&self) -> bool {
        match self {
            Self::Rejected(_) => true,
            Self::Status { status } => (400..500).contains(status),
            _ => false,
        }
    }
}
