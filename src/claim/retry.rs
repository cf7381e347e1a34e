//! Uniform retry policy for network calls.
//!
//! Max attempts, an exponential backoff schedule and a retryable-error
//! predicate live in one value that every network-facing component shares,
//! instead of ad-hoc retry loops per call site.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{BotError, Result};

/// Retry policy: attempts, backoff schedule and what counts as retryable
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Which errors are worth another attempt
    pub retry_on: fn(&BotError) -> bool,
}

impl Default for RetryPolicy {
    /// The daily-claim schedule: 3 attempts, exponential backoff from 4s
    /// capped at 10s, retrying transport failures only
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            retry_on: BotError::is_retryable,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt, after `attempt` failures (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails terminally, or attempts run out
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !(self.retry_on)(&e) => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    return Err(BotError::RetryExhausted {
                        attempts: attempt,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => {
                    let delay = self.backoff_delay(attempt);
                    warn!(attempt, error = %e, "attempt failed, retrying in {:?}", delay);
                    sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(retry_on: fn(&BotError) -> bool) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            retry_on,
        }
    }

    #[test]
    fn backoff_doubles_until_the_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_delay(2), Duration::from_secs(8));
        assert_eq!(policy.backoff_delay(3), Duration::from_secs(10));
        assert_eq!(policy.backoff_delay(10), Duration::from_secs(10));
    }

    #[test]
    fn success_needs_one_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(
            fast_policy(|_| true).run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            }),
        );
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(
            fast_policy(|_| false).run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BotError::Claim("bad body".into())) }
            }),
        );
        assert!(matches!(result, Err(BotError::Claim(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retryable_errors_exhaust_the_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(
            fast_policy(|_| true).run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(BotError::Internal("transient".into())) }
            }),
        );
        match result {
            Err(BotError::RetryExhausted { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected RetryExhausted, got {:?}", other.err()),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn recovery_mid_budget_succeeds() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = tokio_test::block_on(
            fast_policy(|_| true).run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(BotError::Internal("transient".into()))
                    } else {
                        Ok(42)
                    }
                }
            }),
        );
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
