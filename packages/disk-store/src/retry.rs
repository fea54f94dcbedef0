//! Bounded retry with linear backoff for operations that can fail transiently.

use std::future::Future;
use std::time::Duration;

/// How many times to try an operation and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Attempt `n` (1-based) waits `n * delay_step` before running.
    pub delay_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_step: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay_step: Duration) -> Self {
        Self {
            attempts,
            delay_step,
        }
    }

    /// Delay before retry number `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.delay_step * attempt
    }
}

/// How a single attempt failed.
#[derive(Debug)]
pub enum Attempt<E> {
    /// Worth trying again.
    Retry(E),
    /// Hard failure; stop immediately.
    Fail(E),
}

/// Final failure of a retried operation.
#[derive(Debug)]
pub enum RetryError<E> {
    Exhausted { attempts: u32, last: E },
    Failed(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Failed(e) => e,
        }
    }
}

/// Run `op` until it succeeds, fails hard, or `policy.attempts` is used up.
///
/// `op` receives the zero-based attempt index.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt<E>>>,
    E: std::fmt::Display,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(Attempt::Fail(err)) => return Err(RetryError::Failed(err)),
            Err(Attempt::Retry(err)) => {
                attempt += 1;
                if attempt >= attempts {
                    return Err(RetryError::Exhausted {
                        attempts,
                        last: err,
                    });
                }
                let delay = policy.delay(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    #[test]
    fn default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 5);
        assert_eq!(policy.delay(3), Duration::from_millis(150));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, RetryError<String>> = retry(&quick(5), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Attempt::Retry(format!("busy {n}")))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_when_exhausted() {
        let result: Result<(), RetryError<&str>> =
            retry(&quick(3), |_| async { Err(Attempt::Retry("busy")) }).await;

        match result.unwrap_err() {
            RetryError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last, "busy");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn hard_failures_stop_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<&str>> = retry(&quick(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Attempt::Fail("broken")) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Failed("broken"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
