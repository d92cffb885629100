//! Bounded exponential backoff for connection establishment
//!
//! Engines take a moment to accept connections after startup, so every
//! adapter funnels its connect attempt through [`retry_with_backoff`].

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use polystore_types::{StoreError, StoreResult};

/// Retry schedule: `max_attempts` tries, starting at `initial_delay` and
/// doubling between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// A schedule that never waits, for tests
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
        }
    }
}

/// Run `op` until it succeeds or the schedule is exhausted. The final
/// attempt's error is surfaced as `StoreError::Connection`.
pub async fn retry_with_backoff<T, F, Fut>(
    policy: RetryPolicy,
    op_name: &str,
    mut op: F,
) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut delay = policy.initial_delay;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts.max(1) {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "attempt failed"
                );
                last_error = Some(err);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(StoreError::Connection(format!(
        "{} failed after {} attempts: {}",
        op_name,
        policy.max_attempts,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(RetryPolicy::immediate(5), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, StoreError>(42) }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(RetryPolicy::immediate(5), "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(StoreError::Connection("refused".into()))
                } else {
                    Ok("up")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let result: StoreResult<()> = retry_with_backoff(RetryPolicy::immediate(5), "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Connection("refused".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("after 5 attempts"));
        assert!(err.contains("refused"));
    }

    #[tokio::test]
    async fn test_delay_doubles() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(10),
        };
        let start = tokio::time::Instant::now();
        let _: StoreResult<()> = retry_with_backoff(policy, "op", || async {
            Err(StoreError::Connection("refused".into()))
        })
        .await;

        // 10ms + 20ms between the three attempts
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
