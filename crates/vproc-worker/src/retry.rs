//! Message acknowledgement retries and receive-failure log throttling.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::WorkerConfig;

/// Longest pause between two delete attempts.
const MAX_DELETE_WAIT: Duration = Duration::from_secs(5);

/// Retry budget for deleting a processed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteRetry {
    /// Attempts after the first one
    pub retries: u32,
    /// Pause before the first retry, doubled for each further one
    pub first_wait: Duration,
}

/// A delete that kept failing.
#[derive(Debug)]
pub struct DeleteExhausted<E> {
    pub last_error: E,
    pub attempts: u32,
}

impl DeleteRetry {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            retries: config.delete_retries,
            first_wait: config.delete_retry_base,
        }
    }

    /// Pause before attempt `attempt` (the first retry is attempt 2).
    fn wait_before(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(2).min(16);
        self.first_wait.saturating_mul(1 << doublings).min(MAX_DELETE_WAIT)
    }

    /// Call `delete` until it succeeds or `1 + retries` attempts were made.
    pub async fn run<F, Fut, E>(&self, delete: F) -> Result<(), DeleteExhausted<E>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let total = self.retries.saturating_add(1);
        let mut attempt = 1;

        loop {
            match delete().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= total => {
                    return Err(DeleteExhausted {
                        last_error: e,
                        attempts: attempt,
                    })
                }
                Err(e) => {
                    attempt += 1;
                    let wait = self.wait_before(attempt);
                    debug!(attempt, wait_ms = wait.as_millis() as u64, "Message delete failed: {}", e);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Counts back-to-back receive failures and decides whether each is logged.
///
/// The first `log_limit` failures of a streak are logged; after that one
/// notice is emitted and the rest stay quiet until a receive succeeds.
#[derive(Debug)]
pub struct FailureStreak {
    length: u32,
    log_limit: u32,
}

impl FailureStreak {
    pub fn new(log_limit: u32) -> Self {
        Self { length: 0, log_limit }
    }

    /// Extend the streak. Returns whether this failure should be logged.
    pub fn fail(&mut self) -> bool {
        self.length += 1;
        if self.length == self.log_limit + 1 {
            warn!("{} receive failures in a row, muting until the queue recovers", self.length);
        }
        self.length <= self.log_limit
    }

    /// End the streak. Returns how long it was.
    pub fn reset(&mut self) -> u32 {
        let ended = std::mem::take(&mut self.length);
        if ended > self.log_limit {
            warn!("Queue receive recovered after {} failures", ended);
        }
        ended
    }

    pub fn length(&self) -> u32 {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(retries: u32) -> DeleteRetry {
        DeleteRetry {
            retries,
            first_wait: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_wait_doubles_per_retry_and_is_capped() {
        let policy = DeleteRetry {
            retries: 3,
            first_wait: Duration::from_millis(200),
        };
        assert_eq!(policy.wait_before(2), Duration::from_millis(200));
        assert_eq!(policy.wait_before(3), Duration::from_millis(400));
        assert_eq!(policy.wait_before(4), Duration::from_millis(800));
        assert_eq!(policy.wait_before(40), MAX_DELETE_WAIT);
    }

    #[test]
    fn test_from_config() {
        let policy = DeleteRetry::from_config(&WorkerConfig::default());
        assert_eq!(policy.retries, 3);
        assert_eq!(policy.first_wait, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_delete_succeeds_on_second_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = quick(3)
            .run(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err("ReceiptHandleIsInvalid")
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(outcome.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delete_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let outcome = quick(2)
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>("throttled") }
            })
            .await;

        let exhausted = outcome.unwrap_err();
        assert_eq!(exhausted.attempts, 3);
        assert_eq!(exhausted.last_error, "throttled");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_failure_streak_mutes_after_limit() {
        let mut streak = FailureStreak::new(2);

        assert!(streak.fail());
        assert!(streak.fail());
        assert!(!streak.fail());
        assert!(!streak.fail());
        assert_eq!(streak.length(), 4);

        assert_eq!(streak.reset(), 4);
        assert_eq!(streak.length(), 0);
        assert!(streak.fail());
    }
}
