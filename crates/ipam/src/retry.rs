//! Conflict retry with exponential backoff
//!
//! Only version conflicts are retried. Every other error is returned as-is
//! on the first occurrence.

use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base retry delay (milliseconds)
    pub base_delay_ms: u64,
    /// Maximum retry delay (milliseconds)
    pub max_delay_ms: u64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
            jitter: 0.5,
        }
    }
}

impl RetryPolicy {
    /// A policy that never waits; useful in tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter: 0.0,
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    ///
    /// `min(base * 2^attempt, max)` shifted by up to `jitter` of itself in
    /// either direction. A negative result falls back to the base delay.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.min(63) as i32);
        let mut delay = (self.base_delay_ms as f64 * exp).min(self.max_delay_ms as f64);

        if self.jitter > 0.0 && delay > 0.0 {
            let range = delay * self.jitter;
            delay += rand::thread_rng().gen_range(-range..=range);
        }

        if delay < 0.0 {
            delay = self.base_delay_ms as f64;
        }
        Duration::from_millis(delay.round() as u64)
    }
}

/// Run `operation` until it succeeds, fails with a non-conflict error, or
/// runs out of retries.
///
/// The operation receives the zero-based attempt number and must reload
/// whatever state it depends on, since a conflict means it is stale.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !error.is_transient() => return Err(error),
            Err(error) => {
                if attempt >= policy.max_retries {
                    return Err(Error::RetriesExhausted {
                        attempts: attempt + 1,
                        last: Box::new(error),
                    });
                }

                let delay = policy.backoff(attempt);
                warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Write conflict, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
