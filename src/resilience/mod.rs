pub mod circuit_breaker;
pub mod registry;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitBreakerConfig, State};
pub use registry::BreakerRegistry;
