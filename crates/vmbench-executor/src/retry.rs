//! Unbounded-but-cancelable retry
//!
//! Connection establishment against a freshly booted VM can fail for an
//! unknown amount of time, so attempts are not bounded by count. They are
//! bounded by the caller's cancellation token instead: cancellation is
//! checked every iteration and races every backoff sleep, so an operator
//! stop takes effect within one attempt interval rather than the full
//! retry horizon.

use crate::error::ExecutorError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Backoff policy for connection establishment
///
/// All values the retry loop uses are configuration, not constants baked
/// into the loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the second attempt; doubles per failure
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts
    pub max_backoff: Duration,
    /// Timeout applied to each individual dial attempt
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(1),
        }
    }
}

/// Retry `op` until it succeeds or `cancel` fires
///
/// Every error except cancellation is retried after a backoff that doubles
/// up to `policy.max_backoff`. A cancelled token, or
/// [`ExecutorError::Cancelled`] surfacing from the operation itself, ends
/// the loop immediately. The in-flight attempt is raced against the token
/// too, so a stalled attempt cannot defer cancellation; the operation must
/// be safe to drop mid-flight.
pub async fn retry_until_cancelled<T, F, Fut>(
    cancel: &CancellationToken,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, ExecutorError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExecutorError>>,
{
    let mut backoff = policy.initial_backoff;
    loop {
        if cancel.is_cancelled() {
            return Err(ExecutorError::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
            result = op() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::debug!(
                    error = %e,
                    backoff_ms = backoff.as_millis() as u64,
                    "attempt failed, retrying"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ExecutorError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            attempt_timeout: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let cancel = CancellationToken::new();
        let attempts = AtomicUsize::new(0);

        let value = retry_until_cancelled(&cancel, &fast_policy(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(ExecutorError::Connect {
                        addr: "127.0.0.1:22".to_string(),
                        reason: "refused".to_string(),
                    })
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn cancellation_aborts_within_one_interval() {
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stopper.cancel();
        });

        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(10),
            max_backoff: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(1),
        };

        let start = Instant::now();
        let err: Result<(), _> = retry_until_cancelled(&cancel, &policy, || async {
            Err(ExecutorError::Connect {
                addr: "127.0.0.1:22".to_string(),
                reason: "refused".to_string(),
            })
        })
        .await;

        assert!(err.unwrap_err().is_cancelled());
        // Well inside the 10s backoff: the sleep must race the token.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancellation_interrupts_a_stalled_attempt() {
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            stopper.cancel();
        });

        let start = Instant::now();
        let err: Result<(), _> = retry_until_cancelled(&cancel, &fast_policy(), || async {
            // An attempt that never resolves on its own.
            std::future::pending().await
        })
        .await;

        assert!(err.unwrap_err().is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancelled_error_from_op_is_terminal() {
        let cancel = CancellationToken::new();
        let attempts = AtomicUsize::new(0);

        let err: Result<(), _> = retry_until_cancelled(&cancel, &fast_policy(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(ExecutorError::Cancelled) }
        })
        .await;

        assert!(err.unwrap_err().is_cancelled());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
