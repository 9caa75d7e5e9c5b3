//! Retry utilities for resilient upstream calls
//!
//! Upstream booking sites throttle aggressively, so retries use a flat
//! randomized window rather than exponential backoff: every retry sleeps
//! a uniformly random duration in `[min_delay_ms, max_delay_ms]`. The
//! window is fixed per call site and does not grow between attempts.

use anyhow::Result;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_retries: u32,

    /// Lower bound of the randomized retry delay, in milliseconds
    pub min_delay_ms: u64,

    /// Upper bound of the randomized retry delay, in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            min_delay_ms: 500,
            max_delay_ms: 2000,
        }
    }
}

impl RetryConfig {
    /// Create a retry configuration with a custom delay window
    pub fn with_delays(max_retries: u32, min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            min_delay_ms,
            max_delay_ms,
        }
    }

    /// Draw a delay uniformly from the configured window
    pub fn sample_delay(&self) -> Duration {
        let ms = if self.min_delay_ms >= self.max_delay_ms {
            self.min_delay_ms
        } else {
            rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms)
        };
        Duration::from_millis(ms)
    }
}

/// Execute an operation with flat randomized-backoff retries
///
/// Returns `Ok(T)` on the first success, or the last error once all
/// attempts are spent.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = None;

    for attempt in 1..=config.max_retries.max(1) {
        if attempt > 1 {
            let delay = config.sample_delay();
            debug!(
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Retrying after delay"
            );
            tokio::time::sleep(delay).await;
        }

        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => {
                warn!(
                    attempt = attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "Operation failed"
                );
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Operation failed with no error details")))
}
