//! Retry strategy: bounded attempts with jittered exponential backoff.
//!
//! Grounded on `mofa-kernel`'s `agent::types::recovery` module (`Backoff`
//! enum, generic `retry()` shape) extended with the jitter formula the spec
//! requires: `min(base·baseᶦ, max) · (0.5 + rand[0,1))`.

use rand::Rng;
use std::time::Duration;

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy)]
pub enum Backoff {
    Fixed { delay: Duration },
    Exponential { base: f64, initial: Duration, max: Duration },
}

impl Backoff {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential { base, initial, max } => {
                let scaled = initial.as_secs_f64() * base.powi(attempt as i32);
                let capped = scaled.min(max.as_secs_f64());
                Duration::from_secs_f64(capped.max(0.0))
            }
        }
    }
}

/// Full retry configuration (spec §4.1 "Retry strategy").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the (0-based) `attempt`-th retry, including jitter when
    /// enabled: `min(base·baseᶦ, max) · (0.5 + rand[0,1))`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let backoff = Backoff::Exponential {
            base: self.exponential_base,
            initial: self.base_delay,
            max: self.max_delay,
        };
        let base = backoff.delay_for(attempt);
        if !self.jitter {
            return base;
        }
        let factor = 0.5 + rand::thread_rng().gen_range(0.0..1.0);
        Duration::from_secs_f64(base.as_secs_f64() * factor)
    }
}

/// Runs `op` up to `policy.max_attempts` times, sleeping between attempts
/// per [`RetryPolicy::delay_for`]. `should_retry` classifies whether a given
/// error is retryable; non-retryable errors return immediately.
pub async fn retry_with_policy<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
    should_retry: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= policy.max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                tokio::time::sleep(policy.delay_for(attempt - 1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_caps_at_max() {
        let backoff = Backoff::Exponential {
            base: 2.0,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
        };
        assert_eq!(backoff.delay_for(0), Duration::from_secs(1));
        assert_eq!(backoff.delay_for(1), Duration::from_secs(2));
        assert_eq!(backoff.delay_for(2), Duration::from_secs(4));
        assert_eq!(backoff.delay_for(10), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_half_to_one_and_half_factor() {
        let policy = RetryPolicy {
            jitter: true,
            ..Default::default()
        };
        for attempt in 0..5 {
            let base = Backoff::Exponential {
                base: policy.exponential_base,
                initial: policy.base_delay,
                max: policy.max_delay,
            }
            .delay_for(attempt);
            let delay = policy.delay_for(attempt);
            assert!(delay.as_secs_f64() >= base.as_secs_f64() * 0.5);
            assert!(delay.as_secs_f64() <= base.as_secs_f64() * 1.5 + 1e-9);
        }
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts_then_fails() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
            ..Default::default()
        };
        let mut calls = 0;
        let result: Result<(), &str> = retry_with_policy(
            &policy,
            || {
                calls += 1;
                async { Err("transient") }
            },
            |_| true,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 4);
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let policy = RetryPolicy::default();
        let mut calls = 0;
        let result: Result<(), &str> = retry_with_policy(
            &policy,
            || {
                calls += 1;
                async { Err("client-error") }
            },
            |_| false,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
