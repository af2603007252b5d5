use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::DomainError;
use crate::domain::ports::{ProductClient, ProductClientError};
use crate::domain::product::Product;
use crate::resilience::{BreakerError, BreakerRegistry};

pub const FETCH_PRODUCT_BREAKER: &str = "products-cb";
pub const DECREMENT_STOCK_BREAKER: &str = "products-stock-cb";

/// Routes every product-service call through its named circuit breaker and a
/// per-call timeout. A timeout counts as a failure for the breaker.
#[derive(Clone)]
pub struct ProductGate {
    client: Arc<dyn ProductClient>,
    breakers: Arc<BreakerRegistry>,
    call_timeout: Duration,
}

impl ProductGate {
    pub fn new(
        client: Arc<dyn ProductClient>,
        breakers: Arc<BreakerRegistry>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            client,
            breakers,
            call_timeout,
        }
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub async fn fetch_product(&self, id: i64) -> Result<Option<Product>, DomainError> {
        let breaker = self.breakers.get(FETCH_PRODUCT_BREAKER).await;
        breaker
            .call(|| self.guarded(self.client.fetch_product(id)))
            .await
            .map_err(unavailable)?
            .map_err(rejected)
    }

    pub async fn decrement_stock(&self, id: i64, quantity: i32) -> Result<(), DomainError> {
        let breaker = self.breakers.get(DECREMENT_STOCK_BREAKER).await;
        breaker
            .call(|| self.guarded(self.client.decrement_stock(id, quantity)))
            .await
            .map_err(unavailable)?
            .map_err(rejected)
    }

    /// Applies the call timeout. Rejections come back in the inner `Result`
    /// so the breaker sees the call as answered.
    async fn guarded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ProductClientError>>,
    ) -> Result<Result<T, ProductClientError>, ProductClientError> {
        let outcome = tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| ProductClientError::Timeout(self.call_timeout))?;
        match outcome {
            Err(e) if e.is_rejection() => Ok(Err(e)),
            other => other.map(Ok),
        }
    }
}

fn unavailable(err: BreakerError<ProductClientError>) -> DomainError {
    DomainError::RemoteUnavailable(err.to_string())
}

fn rejected(err: ProductClientError) -> DomainError {
    DomainError::RemoteUnavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use bigdecimal::BigDecimal;

    use super::*;
    use crate::infrastructure::memory::InMemoryProductCatalog;
    use crate::resilience::{CircuitBreakerConfig, State};

    fn gate(catalog: &InMemoryProductCatalog, config: CircuitBreakerConfig) -> ProductGate {
        ProductGate::new(
            Arc::new(catalog.clone()),
            Arc::new(BreakerRegistry::new(config)),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn passes_through_found_and_missing_products() {
        let catalog = InMemoryProductCatalog::new();
        catalog.add_product(1, "Keyboard", BigDecimal::from_str("100.0").expect("decimal"), 10);
        let gate = gate(&catalog, CircuitBreakerConfig::default());

        let found = gate.fetch_product(1).await.expect("fetch failed");
        let missing = gate.fetch_product(2).await.expect("fetch failed");

        assert_eq!(found.map(|p| p.name), Some("Keyboard".to_string()));
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn timeout_is_remote_unavailable_and_counts_as_failure() {
        let catalog = InMemoryProductCatalog::new();
        catalog.add_product(1, "Keyboard", BigDecimal::from(1), 10);
        catalog.set_latency(Duration::from_millis(500));
        let gate = gate(&catalog, CircuitBreakerConfig::builder().failure_threshold(1).build());

        let result = gate.fetch_product(1).await;

        assert!(matches!(result, Err(DomainError::RemoteUnavailable(msg)) if msg.contains("timed out")));
        let breaker = gate.breakers().get(FETCH_PRODUCT_BREAKER).await;
        assert_eq!(breaker.state(), State::Open);
    }

    #[tokio::test]
    async fn open_breaker_short_circuits_without_calling_client() {
        let catalog = InMemoryProductCatalog::new();
        catalog.set_fail_fetch(true);
        let gate = gate(&catalog, CircuitBreakerConfig::builder().failure_threshold(2).build());

        for _ in 0..2 {
            assert!(gate.fetch_product(1).await.is_err());
        }
        let calls_before = catalog.fetch_calls();
        let result = gate.fetch_product(1).await;

        assert!(matches!(result, Err(DomainError::RemoteUnavailable(msg)) if msg.contains("is open")));
        assert_eq!(catalog.fetch_calls(), calls_before);
    }

    #[tokio::test]
    async fn fetch_and_decrement_use_separate_breakers() {
        let catalog = InMemoryProductCatalog::new();
        catalog.add_product(1, "Keyboard", BigDecimal::from(1), 10);
        catalog.set_fail_decrement(true);
        let gate = gate(&catalog, CircuitBreakerConfig::builder().failure_threshold(1).build());

        assert!(gate.decrement_stock(1, 1).await.is_err());

        assert!(gate.fetch_product(1).await.expect("fetch failed").is_some());
        let snapshot = gate.breakers().snapshot().await;
        assert_eq!(snapshot.get(DECREMENT_STOCK_BREAKER), Some(&State::Open));
        assert_eq!(snapshot.get(FETCH_PRODUCT_BREAKER), Some(&State::Closed));
    }

    #[tokio::test]
    async fn rejected_decrements_do_not_trip_the_breaker() {
        let catalog = InMemoryProductCatalog::new();
        catalog.add_product(1, "Keyboard", BigDecimal::from(1), 2);
        let gate = gate(&catalog, CircuitBreakerConfig::builder().failure_threshold(1).build());

        for _ in 0..3 {
            let result = gate.decrement_stock(1, 5).await;
            assert!(matches!(result, Err(DomainError::RemoteUnavailable(_))));
        }
        assert!(gate.decrement_stock(99, 1).await.is_err());

        let breaker = gate.breakers().get(DECREMENT_STOCK_BREAKER).await;
        assert_eq!(breaker.state(), State::Closed);
        gate.decrement_stock(1, 2).await.expect("decrement within stock");
        assert_eq!(catalog.stock_of(1), Some(0));
    }
}
