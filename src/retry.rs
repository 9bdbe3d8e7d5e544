//! Typed retry for delivery attempts
//!
//! Upload failures carry their own pacing: a rate-limit signal says exactly
//! how long to wait, anything else gets a short fixed delay. [`RetryDelay`]
//! lets the error choose the pause, and [`retry_with_delay`] drives a bounded
//! number of attempts with it.

use crate::config::UploadConfig;
use crate::error::TransportError;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that know how long to pause before the next attempt
pub trait RetryDelay {
    /// The delay to take before retrying after this error
    fn retry_delay(&self, config: &UploadConfig) -> Duration;
}

impl RetryDelay for TransportError {
    fn retry_delay(&self, config: &UploadConfig) -> Duration {
        match self {
            // Honor the signalled wait, padded so we don't re-trip the limit
            TransportError::RateLimited { retry_after } => *retry_after + config.rate_limit_pad,
            TransportError::Failed(_) => config.retry_delay,
        }
    }
}

/// Execute an async operation up to `attempts` times, pausing between
/// attempts according to the error's [`RetryDelay`].
///
/// Returns the first success or the last error once attempts are exhausted.
/// `attempts` of zero still performs one try.
pub async fn retry_with_delay<F, Fut, T, E>(
    config: &UploadConfig,
    attempts: u32,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryDelay + std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if attempt < attempts => {
                let delay = e.retry_delay(config);
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempts = attempt, "operation failed, attempts exhausted");
                return Err(e);
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    fn fast_config() -> UploadConfig {
        UploadConfig {
            retry_delay: Duration::from_millis(20),
            rate_limit_pad: Duration::from_millis(10),
            ..UploadConfig::default()
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt_calls_once() {
        let config = fast_config();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry_with_delay(&config, 2, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TransportError>(7)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_then_success_retries() {
        let config = fast_config();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result = retry_with_delay(&config, 2, || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(TransportError::Failed("first".into()))
                } else {
                    Ok(1)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn attempts_are_bounded() {
        let config = fast_config();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), _> = retry_with_delay(&config, 2, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Failed("always".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2, "exactly the attempt cap");
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let config = fast_config();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let result: Result<(), _> = retry_with_delay(&config, 0, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Failed("once".into()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_waits_signalled_duration_plus_pad() {
        let config = fast_config();
        let start = Instant::now();
        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();

        let _result: Result<(), _> = retry_with_delay(&config, 2, || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::RateLimited {
                    retry_after: Duration::from_millis(80),
                })
            }
        })
        .await;

        // One inter-attempt pause of 80ms + 10ms pad
        assert!(
            start.elapsed() >= Duration::from_millis(90),
            "should honor signalled wait plus pad, took {:?}",
            start.elapsed()
        );
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn plain_failure_uses_fixed_delay() {
        let config = fast_config();
        let err = TransportError::Failed("boom".into());
        assert_eq!(err.retry_delay(&config), Duration::from_millis(20));

        let limited = TransportError::RateLimited {
            retry_after: Duration::from_secs(4),
        };
        assert_eq!(
            limited.retry_delay(&config),
            Duration::from_secs(4) + Duration::from_millis(10)
        );
    }
}
