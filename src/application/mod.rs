pub mod order_service;
pub mod product_gate;

pub use order_service::OrderService;
pub use product_gate::ProductGate;
