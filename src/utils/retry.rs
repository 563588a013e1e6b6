// src/utils/retry.rs
//! Exponential backoff with jitter for ledger reads.
//!
//! Only errors for which [`CertError::is_retryable`] holds are retried.

use crate::error::CertError;
use log::warn;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries, just the initial attempt)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Cap on the delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Jitter factor (0.0-1.0)
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_secs_f64());

        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        Duration::from_secs_f64((capped * factor).min(self.max_delay.as_secs_f64()))
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget is spent.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RetryConfig,
    name: &str,
    mut operation: F,
) -> Result<T, CertError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CertError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(err) if err.is_retryable() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}; retrying in {:?}",
                    name,
                    attempt + 1,
                    config.max_retries + 1,
                    err,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let config = RetryConfig {
            jitter: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(config.delay_for_attempt(20), config.max_delay);
    }

    #[tokio::test]
    async fn test_retries_timeouts_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&fast(), "read", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CertError::UpstreamTimeout(Duration::from_millis(1)))
            } else {
                Ok(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast(), "read", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CertError::UpstreamTimeout(Duration::from_millis(1)))
        })
        .await;

        assert!(matches!(result, Err(CertError::UpstreamTimeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_does_not_retry_other_errors() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_with_backoff(&fast(), "read", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CertError::Upstream("execution reverted".into()))
        })
        .await;

        assert!(matches!(result, Err(CertError::Upstream(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
