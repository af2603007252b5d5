use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, State};

/// Process-wide breakers keyed by name. Every caller asking for the same name
/// shares one instance, so its failure counts cover all concurrent calls.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write().await;
        // Another task may have created it between the two locks.
        let breaker = breakers.entry(name.to_string()).or_insert_with(|| {
            log::debug!("Creating circuit breaker '{}'", name);
            Arc::new(CircuitBreaker::new(name, self.config.clone()))
        });
        Arc::clone(breaker)
    }

    /// Current state of every breaker created so far, sorted by name.
    pub async fn snapshot(&self) -> BTreeMap<String, State> {
        self.breakers
            .read()
            .await
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_name_returns_shared_instance() {
        let registry = BreakerRegistry::default();

        let first = registry.get("products-cb").await;
        let second = registry.get("products-cb").await;

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn different_names_are_independent() {
        let registry =
            BreakerRegistry::new(CircuitBreakerConfig::builder().failure_threshold(1).build());

        let fetch = registry.get("products-cb").await;
        let _ = fetch.call(|| async { Err::<(), _>("down") }).await;

        assert_eq!(fetch.state(), State::Open);
        assert_eq!(registry.get("products-stock-cb").await.state(), State::Closed);
    }

    #[tokio::test]
    async fn concurrent_lookups_create_one_breaker() {
        let registry = Arc::new(BreakerRegistry::default());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.get("products-cb").await })
            })
            .collect();

        let mut breakers = Vec::new();
        for handle in handles {
            breakers.push(handle.await.expect("lookup task panicked"));
        }

        assert!(breakers.iter().all(|b| Arc::ptr_eq(b, &breakers[0])));
        assert_eq!(registry.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_reports_states_by_name() {
        let registry = BreakerRegistry::default();
        registry.get("b").await;
        registry.get("a").await;

        let snapshot = registry.snapshot().await;

        assert_eq!(
            snapshot.into_iter().collect::<Vec<_>>(),
            vec![("a".to_string(), State::Closed), ("b".to_string(), State::Closed)]
        );
    }
}
