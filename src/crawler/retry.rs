//! Retry policy with exponential backoff and jitter

use crate::config::FetchConfig;
use crate::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently a request is retried
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retry_jitter_ms: u64,
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.backoff_base_ms,
            max_delay_ms: config.backoff_max_ms,
            retry_jitter_ms: config.retry_jitter_ms,
            jitter_min_ms: config.jitter_min_ms,
            jitter_max_ms: config.jitter_max_ms,
        }
    }

    /// Deterministic part of the delay after failed attempt `attempt` (1-based)
    ///
    /// `min(max_delay, base_delay * 2^attempt)`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    /// Full delay before the next attempt: backoff plus random `[0, retry_jitter)`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let jitter = if self.retry_jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..self.retry_jitter_ms)
        };
        self.backoff_delay(attempt) + Duration::from_millis(jitter)
    }

    /// Random pause taken before every attempt
    pub fn pre_request_jitter(&self) -> Duration {
        let (min, max) = (self.jitter_min_ms, self.jitter_max_ms);
        let millis = if max <= min {
            min
        } else {
            rand::thread_rng().gen_range(min..=max)
        };
        Duration::from_millis(millis)
    }

    /// Runs `operation` until it succeeds or `max_attempts` is reached
    ///
    /// Returns the last error together with the number of attempts made.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        mut operation: F,
    ) -> std::result::Result<T, (u32, crate::HarvestError)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tokio::time::sleep(self.pre_request_jitter()).await;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => return Err((attempt, e)),
                Err(e) => {
                    let delay = self.retry_delay(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed: {} (retrying in {:?})",
                        attempt, self.max_attempts, label, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
