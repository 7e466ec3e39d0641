//! Bounded retry with exponential backoff and jitter.
//!
//! Only transient errors retry. Retries never extend past the run
//! deadline: if the next backoff would land beyond it, the last error is
//! returned instead of sleeping.

use std::future::Future;
use std::time::{Duration, Instant};

use mcbrief_core::error::Result;
use rand::Rng;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first (3 means up to 4 calls).
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based): capped exponential
    /// plus uniform jitter up to half the capped delay.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_cap = exp.as_millis() as u64 / 2;
        let jitter = if jitter_cap == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_cap)
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Run `operation` with the policy. `deadline` is the run's overall time
/// budget; `what` labels log lines.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    deadline: Option<Instant>,
    what: &str,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff_delay(attempt);
                if let Some(deadline) = deadline {
                    if Instant::now() + delay >= deadline {
                        tracing::warn!("{what}: giving up, retry would exceed the run budget");
                        return Err(error);
                    }
                }
                attempt += 1;
                tracing::warn!(
                    "⚠️ {what} failed (attempt {attempt}/{}), retrying in {delay:?}: {error}",
                    policy.max_retries + 1
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcbrief_core::error::BriefError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(1),
        };
        // Jitter adds at most half, so bounds are [exp, 1.5*exp].
        let d0 = policy.backoff_delay(0);
        assert!(d0 >= Duration::from_millis(100) && d0 <= Duration::from_millis(150));
        let d10 = policy.backoff_delay(10);
        assert!(d10 <= Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn transient_errors_retry_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), None, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(BriefError::enrichment_transient("rate limited"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(), None, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BriefError::enrichment_permanent("bad payload")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(), None, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BriefError::delivery_transient("503")) }
        })
        .await;
        assert!(result.unwrap_err().is_transient());
        // Initial call plus max_retries.
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn deadline_stops_retrying() {
        let calls = AtomicU32::new(0);
        let deadline = Some(Instant::now());
        let result: Result<()> = with_retry(&fast_policy(), deadline, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BriefError::delivery_transient("503")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
