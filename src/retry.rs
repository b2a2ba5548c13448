use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Bounded retry with equal-jitter exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails with a non-retriable error, or the
    /// attempt budget is spent. The last error is returned in the latter case.
    pub async fn run<T, E, F, Fut>(
        &self,
        is_retriable: impl Fn(&E) -> bool,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retriable(&e) && attempt + 1 < attempts => {
                    let delay = self.backoff(attempt);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Equal jitter backoff: base/2 + rand(0, base/2).
    fn backoff(&self, attempt: u32) -> Duration {
        let initial = self.initial_backoff.as_millis() as u64;
        let base = initial.saturating_mul(2u64.saturating_pow(attempt));
        let half = base / 2;
        Duration::from_millis(half + fastrand::u64(..half.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Cell::new(0);
        let result: Result<u32, &str> = fast()
            .run(
                |_| true,
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move { if n < 3 { Err("busy") } else { Ok(n) } }
                },
            )
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = fast()
            .run(
                |_| true,
                || {
                    calls.set(calls.get() + 1);
                    async { Err("down") }
                },
            )
            .await;

        assert_eq!(result, Err("down"));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = fast()
            .run(
                |e| *e != "forbidden",
                || {
                    calls.set(calls.get() + 1);
                    async { Err("forbidden") }
                },
            )
            .await;

        assert_eq!(result, Err("forbidden"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn backoff_stays_within_jitter_window() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
        };
        for _ in 0..50 {
            let d = policy.backoff(2).as_millis();
            assert!((200..400).contains(&d), "got {d}ms");
        }
    }

    #[tokio::test]
    async fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            max_attempts: 0,
            initial_backoff: Duration::from_millis(1),
        };
        let calls = Cell::new(0);
        let result: Result<(), &str> = policy
            .run(
                |_| true,
                || {
                    calls.set(calls.get() + 1);
                    async { Err("down") }
                },
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
