use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::Result;

const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(50);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

pub mod backoff {
    use std::time::Duration;

    /// Delay before retry number `attempt` (1-based), doubling from `base`
    /// and capped at `max`.
    pub fn exponential(base: Duration, attempt: u32, max: Duration) -> Duration {
        let multiplier = 2_u32.saturating_pow(attempt.saturating_sub(1));
        base.saturating_mul(multiplier).min(max)
    }
}

/// Bounded retry for coordinator calls. Only transient store failures are
/// retried; every other error is returned on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = backoff::exponential(self.base_delay, attempt, self.max_delay);
                    warn!(attempt, ?delay, error = %err, "retrying after transient store failure");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoordinatorError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_doubles_until_capped() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(500);
        assert_eq!(backoff::exponential(base, 1, max), Duration::from_millis(100));
        assert_eq!(backoff::exponential(base, 2, max), Duration::from_millis(200));
        assert_eq!(backoff::exponential(base, 3, max), Duration::from_millis(400));
        assert_eq!(backoff::exponential(base, 4, max), max);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_only_unavailable_stores() {
        let calls = AtomicU32::new(0);
        let outcome = RetryPolicy::default()
            .run(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(CoordinatorError::StoreUnavailable("timeout".into()))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;
        assert_eq!(outcome, Ok(2));

        let calls = AtomicU32::new(0);
        let outcome: Result<()> = RetryPolicy::default()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoordinatorError::NotAtStop(waypost_model::TripId::new())) }
            })
            .await;
        assert!(matches!(outcome, Err(CoordinatorError::NotAtStop(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let outcome: Result<()> = RetryPolicy::default()
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(CoordinatorError::StoreUnavailable("down".into())) }
            })
            .await;
        assert!(outcome.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
    }
}
