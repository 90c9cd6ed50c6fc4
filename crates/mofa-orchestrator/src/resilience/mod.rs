//! Resilience primitives: circuit breaker, retry with backoff, and their
//! composition into a single `resilient_call`.

mod breaker;
mod retry;

pub use breaker::{Breaker, BreakerConfig, BreakerState};
pub use retry::{Backoff, RetryPolicy, retry_with_policy};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors produced by the resilience layer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ResilienceError {
    /// The breaker is open and rejected the call without invoking it.
    #[error("circuit '{name}' is open")]
    CircuitOpen { name: String },

    /// The call exceeded its enforced deadline.
    #[error("call to '{name}' timed out after {elapsed_ms}ms")]
    Timeout { name: String, elapsed_ms: u64 },

    /// The operation itself failed; not a resilience-layer failure.
    #[error("operation '{name}' failed: {source}")]
    Operation {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Whether a failed operation should be retried.
///
/// Implementations classify the underlying error: transient transport
/// errors and HTTP 5xx are retryable; HTTP 4xx, `CircuitOpen`, and explicit
/// cancellation are not (spec §4.1, §7).
pub trait Classify {
    fn is_retryable(&self) -> bool;
}

/// Runs `op` through the full resilience pipeline: enforced timeout →
/// circuit-breaker gate → retry loop. Each retry attempt re-enters the
/// timeout and breaker check. A call rejected with `CircuitOpen` never
/// retries (spec §4.1 "Composition").
pub async fn resilient_call<T, E, F, Fut>(
    name: &str,
    breaker: &Arc<Breaker>,
    policy: &RetryPolicy,
    timeout: Duration,
    mut op: F,
) -> Result<T, ResilienceError>
where
    E: Classify + std::error::Error + Send + Sync + 'static,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        if !breaker.can_execute().await {
            return Err(ResilienceError::CircuitOpen {
                name: name.to_string(),
            });
        }

        let started = std::time::Instant::now();
        let call = tokio::time::timeout(timeout, op());
        let outcome = match call.await {
            Ok(Ok(value)) => {
                breaker.record_success().await;
                return Ok(value);
            }
            Ok(Err(err)) => {
                let retryable = err.is_retryable();
                breaker.record_failure().await;
                Err((
                    ResilienceError::Operation {
                        name: name.to_string(),
                        source: Box::new(err),
                    },
                    retryable,
                ))
            }
            Err(_elapsed) => {
                breaker.record_failure().await;
                Err((
                    ResilienceError::Timeout {
                        name: name.to_string(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                    true,
                ))
            }
        };

        let (err, retryable) = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        attempt += 1;
        if !retryable || attempt >= policy.max_attempts {
            return Err(err);
        }

        let delay = policy.delay_for(attempt - 1);
        tracing::debug!(name, attempt, delay_ms = delay.as_millis() as u64, "retrying after delay");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct BoomError(bool);

    impl Classify for BoomError {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry() {
        let breaker = Arc::new(Breaker::new("test", BreakerConfig::default()));
        let policy = RetryPolicy::default();
        let result: Result<u32, ResilienceError> = resilient_call(
            "op",
            &breaker,
            &policy,
            Duration::from_secs(1),
            || async { Ok::<u32, BoomError>(42) },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_retryable_errors_up_to_max_attempts() {
        let breaker = Arc::new(Breaker::new("test", BreakerConfig::default()));
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, ResilienceError> = resilient_call(
            "op",
            &breaker,
            &policy,
            Duration::from_secs(1),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, BoomError>(BoomError(true)) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_after_first_attempt() {
        let breaker = Arc::new(Breaker::new("test", BreakerConfig::default()));
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let _: Result<u32, ResilienceError> = resilient_call(
            "op",
            &breaker,
            &policy,
            Duration::from_secs(1),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, BoomError>(BoomError(false)) }
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_invoking_op() {
        let breaker = Arc::new(Breaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ));
        let policy = RetryPolicy {
            max_attempts: 1,
            ..Default::default()
        };
        let calls = AtomicU32::new(0);
        let _: Result<u32, ResilienceError> = resilient_call(
            "op",
            &breaker,
            &policy,
            Duration::from_secs(1),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, BoomError>(BoomError(true)) }
            },
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls2 = AtomicU32::new(0);
        let result: Result<u32, ResilienceError> = resilient_call(
            "op",
            &breaker,
            &policy,
            Duration::from_secs(1),
            || {
                calls2.fetch_add(1, Ordering::SeqCst);
                async { Ok::<u32, BoomError>(1) }
            },
        )
        .await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
        assert_eq!(calls2.load(Ordering::SeqCst), 0);
    }
}
