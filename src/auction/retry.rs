//! Bounded optimistic retry
//!
//! Only `Contention` is retried. Business-rule failures come back on the
//! first attempt because re-running them cannot change the outcome.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::types::{AuctionError, Result};

/// Exponential backoff with jitter over a bounded number of attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts.max(1)
    }

    /// Backoff after the given failed attempt (1-based): the exponential
    /// delay capped at `max_delay_ms`, jittered into its upper half.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let ceiling = self
            .config
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.config.max_delay_ms);
        let floor = ceiling / 2;
        let millis = if ceiling > floor {
            rand::thread_rng().gen_range(floor..=ceiling)
        } else {
            ceiling
        };
        Duration::from_millis(millis)
    }

    /// Run `attempt_fn` until it succeeds, fails with a non-conflict error,
    /// or the attempt budget is spent. The closure receives the attempt
    /// number and must re-read everything it depends on.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt_fn: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match attempt_fn(attempt).await {
                Err(AuctionError::Contention(reason)) if attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Version conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AuctionError::Contention(reason)) => {
                    warn!(operation, attempts = attempt, reason = %reason, "Retries exhausted");
                    return Err(AuctionError::Contention(format!(
                        "{} gave up after {} attempts: {}",
                        operation, attempt, reason
                    )));
                }
                other => return other,
            }
        }
    }
}
