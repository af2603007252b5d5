use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Product not found: {product_id}")]
    ProductNotFound { product_id: i64 },
    #[error(
        "Insufficient stock for '{product_name}' (product {product_id}): \
         requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: i64,
        product_name: String,
        requested: i32,
        available: i32,
    },
    #[error("Product service unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("Persistence failure: {0}")]
    Persistence(String),
}
