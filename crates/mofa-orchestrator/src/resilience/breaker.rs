//! Per-endpoint circuit breaker state machine.
//!
//! Grounded on `mofa-foundation`'s `circuit_breaker::state` module: the
//! same three-state machine (`Closed`/`Open`/`HalfOpen`), atomic counters,
//! and per-breaker async lock, with defaults adjusted to match the spec
//! (open-duration timeout 60s rather than 30s).

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// The three states of a circuit breaker (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Tunables for a [`Breaker`].
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures before transitioning `Closed -> Open`.
    pub failure_threshold: u32,
    /// How long the breaker stays `Open` before probing again.
    pub open_timeout: Duration,
    /// Maximum concurrent probe calls allowed while `HalfOpen`.
    pub half_open_max: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(60),
            half_open_max: 3,
        }
    }
}

/// A single named circuit breaker.
///
/// All transitions happen under `state`'s write lock so they are atomic
/// with respect to each other; the failure/success counters themselves are
/// plain atomics for cheap reads from metrics code.
pub struct Breaker {
    name: String,
    config: BreakerConfig,
    state: RwLock<BreakerState>,
    consecutive_failures: AtomicU32,
    half_open_inflight: AtomicU32,
    opened_at: RwLock<Option<Instant>>,
}

impl Breaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(BreakerState::Closed),
            consecutive_failures: AtomicU32::new(0),
            half_open_inflight: AtomicU32::new(0),
            opened_at: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn state(&self) -> BreakerState {
        self.maybe_transition_to_half_open().await;
        *self.state.read().await
    }

    /// `Open -> HalfOpen` once the configured timeout has elapsed.
    async fn maybe_transition_to_half_open(&self) {
        let should_transition = {
            let state = self.state.read().await;
            if *state != BreakerState::Open {
                false
            } else {
                let opened_at = self.opened_at.read().await;
                match *opened_at {
                    Some(t) => t.elapsed() >= self.config.open_timeout,
                    None => false,
                }
            }
        };
        if should_transition {
            let mut state = self.state.write().await;
            if *state == BreakerState::Open {
                *state = BreakerState::HalfOpen;
                self.half_open_inflight.store(0, Ordering::SeqCst);
                tracing::info!(breaker = %self.name, "circuit half-open");
            }
        }
    }

    /// Returns whether a call may proceed, reserving a half-open probe slot
    /// if applicable.
    pub async fn can_execute(&self) -> bool {
        match self.state().await {
            BreakerState::Closed => true,
            BreakerState::Open => false,
            BreakerState::HalfOpen => {
                let inflight = self.half_open_inflight.fetch_add(1, Ordering::SeqCst);
                if inflight < self.config.half_open_max {
                    true
                } else {
                    self.half_open_inflight.fetch_sub(1, Ordering::SeqCst);
                    false
                }
            }
        }
    }

    pub async fn record_success(&self) {
        let state = *self.state.read().await;
        match state {
            BreakerState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            BreakerState::HalfOpen => {
                let mut state = self.state.write().await;
                *state = BreakerState::Closed;
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.half_open_inflight.store(0, Ordering::SeqCst);
                tracing::info!(breaker = %self.name, "circuit closed");
            }
            BreakerState::Open => {}
        }
    }

    pub async fn record_failure(&self) {
        let state = *self.state.read().await;
        match state {
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.config.failure_threshold {
                    self.transition_to_open().await;
                }
            }
            BreakerState::HalfOpen => {
                self.transition_to_open().await;
            }
            BreakerState::Open => {}
        }
    }

    async fn transition_to_open(&self) {
        let mut state = self.state.write().await;
        *state = BreakerState::Open;
        *self.opened_at.write().await = Some(Instant::now());
        self.half_open_inflight.store(0, Ordering::SeqCst);
        tracing::warn!(breaker = %self.name, "circuit opened");
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = Breaker::new(
            "crm",
            BreakerConfig {
                failure_threshold: 3,
                open_timeout: Duration::from_millis(50),
                half_open_max: 1,
            },
        );
        for _ in 0..3 {
            assert!(breaker.can_execute().await);
            breaker.record_failure().await;
        }
        assert_eq!(breaker.state().await, BreakerState::Open);
        assert!(!breaker.can_execute().await);
    }

    #[tokio::test]
    async fn transitions_to_half_open_then_closed_on_success() {
        let breaker = Breaker::new(
            "crm",
            BreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_millis(20),
                half_open_max: 1,
            },
        );
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(breaker.can_execute().await);
        assert_eq!(breaker.state().await, BreakerState::HalfOpen);

        breaker.record_success().await;
        assert_eq!(breaker.state().await, BreakerState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn half_open_failure_reopens_circuit() {
        let breaker = Breaker::new(
            "crm",
            BreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_millis(10),
                half_open_max: 1,
            },
        );
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(15)).await;
        assert!(breaker.can_execute().await);
        breaker.record_failure().await;
        assert_eq!(breaker.state().await, BreakerState::Open);
    }

    #[tokio::test]
    async fn half_open_limits_concurrent_probes() {
        let breaker = Breaker::new(
            "crm",
            BreakerConfig {
                failure_threshold: 1,
                open_timeout: Duration::from_millis(10),
                half_open_max: 2,
            },
        );
        breaker.record_failure().await;
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert!(breaker.can_execute().await);
        assert!(breaker.can_execute().await);
        assert!(!breaker.can_execute().await);
    }

    #[tokio::test]
    async fn success_in_closed_resets_counter() {
        let breaker = Breaker::new(
            "crm",
            BreakerConfig {
                failure_threshold: 3,
                ..Default::default()
            },
        );
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(breaker.state().await, BreakerState::Closed);
    }
}
