//! Bounded retry with linear backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Retry policy for transient failures.
///
/// The wait before retrying attempt `n` is `base_delay * n` — a pure
/// function of the attempt counter, so the schedule is fully determined by
/// the two fields.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base backoff unit.
    pub base_delay: Duration,
    /// Whether transient failures of non-idempotent requests (POST/PATCH)
    /// are retried. Defaults to true; disable when duplicate server-side
    /// effects are a concern.
    pub retry_mutations: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            retry_mutations: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            retry_mutations: true,
        }
    }

    pub fn retry_mutations(mut self, retry_mutations: bool) -> Self {
        self.retry_mutations = retry_mutations;
        self
    }

    /// Copy of this policy that gives up after the first attempt.
    pub(crate) fn single_attempt(&self) -> Self {
        Self {
            max_attempts: 1,
            ..self.clone()
        }
    }

    /// Backoff before the retry following `attempt` (1-based).
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Execute an async operation, retrying transient failures until the
    /// attempt budget is spent. Permanent failures propagate immediately.
    ///
    /// Expired-token failures are never consumed here: they are not
    /// transient, so they short-circuit out for the refresh path to handle,
    /// and the replay re-enters with a fresh budget.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_transient() || attempt >= self.max_attempts {
                        return Err(err);
                    }
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> ApiError {
        ApiError::Server {
            status: 500,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_consume_the_full_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);
        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(server_error()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_retrying_once_an_attempt_succeeds() {
        let policy = RetryPolicy::new(5, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);
        let result = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(server_error())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failures_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);
        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(ApiError::Client {
                        status: 404,
                        code: None,
                        message: "missing".to_string(),
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_token_short_circuits_without_retry() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10));
        let attempts = AtomicU32::new(0);
        let result: Result<()> = policy
            .execute(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err(ApiError::TokenExpired) }
            })
            .await;
        assert!(matches!(result, Err(ApiError::TokenExpired)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
