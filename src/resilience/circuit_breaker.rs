//! Circuit breaker guarding calls to a remote dependency.
//!
//! - **Closed**: calls pass through, consecutive failures are counted.
//! - **Open**: calls are rejected without running the operation until
//!   `open_duration` has elapsed.
//! - **HalfOpen**: a limited number of probe calls test whether the remote
//!   side recovered. Enough successes close the breaker, one failure re-opens it.
//!   A probe whose caller is cancelled gives its slot back.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in `Closed` before the breaker opens.
    pub failure_threshold: usize,
    /// Time spent in `Open` before a probe is let through.
    pub open_duration: Duration,
    /// Probes allowed in flight at once while `HalfOpen`.
    pub half_open_max_calls: usize,
    /// Successful probes needed to close the breaker again.
    pub success_threshold: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CircuitBreakerConfig {
    pub const fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            half_open_max_calls: 1,
            success_threshold: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfigBuilder {
    failure_threshold: usize,
    open_duration: Duration,
    half_open_max_calls: usize,
    success_threshold: usize,
}

impl CircuitBreakerConfigBuilder {
    pub const fn failure_threshold(mut self, threshold: usize) -> Self {
        self.failure_threshold = threshold;
        self
    }

    pub const fn open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    pub const fn half_open_max_calls(mut self, calls: usize) -> Self {
        self.half_open_max_calls = calls;
        self
    }

    pub const fn success_threshold(mut self, threshold: usize) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Zero thresholds are raised to one so the breaker can always make progress.
    pub fn build(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.max(1),
            open_duration: self.open_duration,
            half_open_max_calls: self.half_open_max_calls.max(1),
            success_threshold: self.success_threshold.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    pub const fn as_str(self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::HalfOpen => "HALF_OPEN",
        }
    }
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker '{0}' is open")]
    Open(String),
    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
struct BreakerState {
    state: State,
    failure_count: usize,
    success_count: usize,
    probes_in_flight: usize,
    opened_at: Option<Instant>,
    /// Bumped on every state transition. Outcomes of calls admitted under an
    /// older generation are ignored.
    generation: u64,
}

impl BreakerState {
    fn transition(&mut self, to: State) {
        self.state = to;
        self.generation += 1;
        self.failure_count = 0;
        self.success_count = 0;
        self.probes_in_flight = 0;
        self.opened_at = (to == State::Open).then(Instant::now);
    }
}

/// Counters since the breaker was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerMetrics {
    pub total_calls: u64,
    pub total_successes: u64,
    pub total_failures: u64,
    pub total_rejections: u64,
}

/// One admitted call. A half-open probe slot is given back when the admission
/// is dropped without being settled, e.g. when the caller's future is cancelled.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    settled: bool,
}

impl Admission<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        if success {
            self.breaker.on_success(self.generation);
        } else {
            self.breaker.on_failure(self.generation);
        }
    }
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(self.generation);
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    name: Arc<str>,
    config: Arc<CircuitBreakerConfig>,
    state: Arc<Mutex<BreakerState>>,
    total_calls: Arc<AtomicU64>,
    total_successes: Arc<AtomicU64>,
    total_failures: Arc<AtomicU64>,
    total_rejections: Arc<AtomicU64>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<Arc<str>>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config: Arc::new(config),
            state: Arc::new(Mutex::new(BreakerState {
                state: State::Closed,
                failure_count: 0,
                success_count: 0,
                probes_in_flight: 0,
                opened_at: None,
                generation: 0,
            })),
            total_calls: Arc::new(AtomicU64::new(0)),
            total_successes: Arc::new(AtomicU64::new(0)),
            total_failures: Arc::new(AtomicU64::new(0)),
            total_rejections: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> State {
        self.lock().state
    }

    // Never held across an await, so a plain mutex is enough and `Drop` can
    // release probe slots synchronously.
    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `operation` unless the breaker rejects the call. An `Err` from the
    /// operation counts as a failure; the error is handed back as `Inner`.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.total_calls.fetch_add(1, Ordering::Relaxed);

        let Some(admission) = self.try_acquire() else {
            self.total_rejections.fetch_add(1, Ordering::Relaxed);
            log::warn!("Circuit breaker '{}' rejected a call", self.name);
            return Err(BreakerError::Open(self.name.to_string()));
        };

        match operation().await {
            Ok(value) => {
                admission.settle(true);
                self.total_successes.fetch_add(1, Ordering::Relaxed);
                Ok(value)
            }
            Err(err) => {
                admission.settle(false);
                self.total_failures.fetch_add(1, Ordering::Relaxed);
                Err(BreakerError::Inner(err))
            }
        }
    }

    fn try_acquire(&self) -> Option<Admission<'_>> {
        let mut state = self.lock();

        let probe = match state.state {
            State::Closed => false,
            State::Open => {
                let cooled_down = state
                    .opened_at
                    .is_some_and(|opened| opened.elapsed() >= self.config.open_duration);
                if !cooled_down {
                    return None;
                }
                log::info!("Circuit breaker '{}' OPEN -> HALF_OPEN", self.name);
                state.transition(State::HalfOpen);
                true
            }
            State::HalfOpen => {
                if state.probes_in_flight >= self.config.half_open_max_calls {
                    return None;
                }
                true
            }
        };

        if probe {
            state.probes_in_flight += 1;
        }
        Some(Admission {
            breaker: self,
            generation: state.generation,
            probe,
            settled: false,
        })
    }

    fn on_success(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }

        match state.state {
            State::Closed => state.failure_count = 0,
            State::HalfOpen => {
                state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    log::info!("Circuit breaker '{}' HALF_OPEN -> CLOSED", self.name);
                    state.transition(State::Closed);
                }
            }
            State::Open => {}
        }
    }

    fn on_failure(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }

        match state.state {
            State::Closed => {
                state.failure_count += 1;
                if state.failure_count >= self.config.failure_threshold {
                    log::warn!(
                        "Circuit breaker '{}' CLOSED -> OPEN after {} consecutive failures",
                        self.name,
                        state.failure_count
                    );
                    state.transition(State::Open);
                }
            }
            State::HalfOpen => {
                log::warn!("Circuit breaker '{}' HALF_OPEN -> OPEN (probe failed)", self.name);
                state.transition(State::Open);
            }
            State::Open => {}
        }
    }

    fn release_probe(&self, generation: u64) {
        let mut state = self.lock();
        if state.generation == generation && state.state == State::HalfOpen {
            state.probes_in_flight = state.probes_in_flight.saturating_sub(1);
            log::debug!("Circuit breaker '{}' released a cancelled probe", self.name);
        }
    }

    pub fn metrics(&self) -> BreakerMetrics {
        BreakerMetrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            total_successes: self.total_successes.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            total_rejections: self.total_rejections.load(Ordering::Relaxed),
        }
    }
}
