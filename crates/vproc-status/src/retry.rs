//! Retries for PostgREST calls.
//!
//! Only transient failures are repeated: network errors, 429 and 5xx (see
//! [`crate::error::StatusError::is_retryable`]). The wait before retry `n` is drawn from
//! the upper half of `base * 2^(n-1)`, capped at `max_delay_ms`. A retry hint
//! from the server replaces the computed wait.

use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::{BuildHasher, Hasher};
use std::time::Duration;

use tracing::warn;

use crate::error::StatusResult;
use crate::metrics::record_retry;

/// Retry budget for status store requests.
#[derive(Debug, Clone)]
pub struct StatusRetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff step, in milliseconds
    pub base_delay_ms: u64,
    /// Upper bound for any single wait, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for StatusRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl StatusRetryConfig {
    /// Read `STATUS_MAX_RETRIES`, `STATUS_RETRY_BASE_MS` and `STATUS_RETRY_MAX_MS`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_retries: env_or("STATUS_MAX_RETRIES", defaults.max_retries),
            base_delay_ms: env_or("STATUS_RETRY_BASE_MS", defaults.base_delay_ms),
            max_delay_ms: env_or("STATUS_RETRY_MAX_MS", defaults.max_delay_ms),
        }
    }

    /// Wait before retry number `retry` (1-based).
    fn backoff(&self, retry: u32, server_hint_ms: Option<u64>) -> Duration {
        if let Some(hint) = server_hint_ms {
            return Duration::from_millis(hint.min(self.max_delay_ms));
        }

        let shift = retry.saturating_sub(1).min(20);
        let step = self.base_delay_ms.saturating_mul(1u64 << shift).min(self.max_delay_ms);
        let floor = step - step / 2;
        Duration::from_millis(floor + random_below(step / 2 + 1))
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

/// Uniform-ish value in `0..bound`, seeded from the std hasher's random keys.
fn random_below(bound: u64) -> u64 {
    if bound <= 1 {
        return 0;
    }
    RandomState::new().build_hasher().finish() % bound
}

/// Run `request` until it succeeds, fails permanently or the budget is spent.
pub async fn with_retry<T, F, Fut>(config: &StatusRetryConfig, operation: &str, request: F) -> StatusResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = StatusResult<T>>,
{
    let mut retry = 0;

    loop {
        let err = match request().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() || retry >= config.max_retries {
            return Err(err);
        }

        retry += 1;
        let wait = config.backoff(retry, err.retry_after_ms());
        warn!(
            operation = %operation,
            retry,
            wait_ms = wait.as_millis() as u64,
            "Transient status store error: {}",
            err
        );
        record_retry(operation);
        tokio::time::sleep(wait).await;
    }
}
