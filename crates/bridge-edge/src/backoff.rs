//! Retry with fixed backoff.
//!
//! Reconnects and transient-failure retries wait a constant interval
//! between attempts. The sync traffic is one small request per attempt,
//! so an exponential schedule buys nothing except a longer outage after
//! the authority comes back.

use std::time::Duration;
use tokio::time::sleep;

/// Fixed-interval retry configuration.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,

    /// Constant delay between attempts.
    pub delay: Duration,
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl FixedBackoff {
    /// Configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::from_millis(0),
        }
    }

    /// Configuration with a custom constant delay.
    pub fn every(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

/// Execute a function with fixed-interval retries.
///
/// The function is called up to `max_attempts` times, waiting `delay`
/// between attempts. The last error is returned if every attempt fails.
pub async fn with_fixed_retry<F, Fut, T, E>(config: &FixedBackoff, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    with_fixed_retry_if(config, f, |_| true).await
}

/// Execute a function with fixed-interval retries and a predicate for
/// retryable errors.
///
/// Errors the predicate rejects are returned immediately; retryable ones
/// are retried up to `max_attempts` times with a constant delay.
pub async fn with_fixed_retry_if<F, Fut, T, E, P>(
    config: &FixedBackoff,
    mut f: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if !is_retryable(&e) => {
                return Err(e);
            }
            Err(e) if attempt >= config.max_attempts => {
                tracing::error!(attempts = attempt, error = ?e, "All retry attempts exhausted");
                return Err(e);
            }
            Err(e) => {
                tracing::warn!(
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = config.delay.as_millis(),
                    error = ?e,
                    "Attempt failed, retrying"
                );
                sleep(config.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let config = FixedBackoff::no_retry();
        let result: Result<i32, String> = with_fixed_retry(&config, || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let config = FixedBackoff::every(Duration::from_millis(1), 5);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: Result<&str, &str> = with_fixed_retry(&config, move || {
            let calls = calls_clone.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("transient")
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let config = FixedBackoff::every(Duration::from_millis(1), 3);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: Result<(), &str> = with_fixed_retry(&config, move || {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("always")
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_error_returns_immediately() {
        let config = FixedBackoff::every(Duration::from_millis(1), 5);
        let calls = Arc::new(AtomicU32::new(0));

        let calls_clone = calls.clone();
        let result: Result<(), &str> = with_fixed_retry_if(
            &config,
            move || {
                let calls = calls_clone.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err("fatal")
                }
            },
            |e: &&str| *e != "fatal",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_constant() {
        let config = FixedBackoff::every(Duration::from_secs(5), 3);
        let start = tokio::time::Instant::now();

        let _: Result<(), &str> =
            with_fixed_retry(&config, || async { Err("always") }).await;

        // Two waits of exactly five seconds, no growth.
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }
}
