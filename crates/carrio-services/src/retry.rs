//! Bounded retry with exponential backoff
//!
//! Re-runs a whole operation while it fails with a retryable error. Only
//! `AppError::TransientConflict` is retryable; every other error, including
//! business rejections, is returned on the first occurrence.

use carrio_core::config::WalletConfig;
use carrio_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, first one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound of a single delay
    pub max_delay: Duration,
    /// Factor to multiply delay by after each attempt
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from(&WalletConfig::default())
    }
}

impl From<&WalletConfig> for RetryConfig {
    fn from(config: &WalletConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_backoff(),
            max_delay: config.max_backoff(),
            backoff_factor: config.backoff_factor,
        }
    }
}

impl RetryConfig {
    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0).powi(attempt.saturating_sub(1) as i32);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

/// Execute an async operation with retries on transient conflicts
///
/// Returns `AppError::RetriesExhausted` when every attempt hit a conflict.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!("Operation succeeded after {} attempts", attempts);
                }
                return Ok(result);
            }
            Err(error) if !error.is_retryable() => return Err(error),
            Err(error) => {
                if attempts >= config.max_attempts {
                    warn!("Operation failed after {} attempts: {}", attempts, error);
                    return Err(AppError::RetriesExhausted {
                        attempts,
                        last_error: error.to_string(),
                    });
                }

                let delay = config.delay_after(attempts);
                warn!(
                    "Attempt {} failed: {}. Retrying in {:?}...",
                    attempts, error, delay
                );
                sleep(delay).await;
            }
        }
    }
}
