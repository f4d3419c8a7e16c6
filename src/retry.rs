//! Bounded retry with exponential backoff and jitter
//!
//! Used for the two network calls on the request path: key-set fetches and
//! policy lookups. Only errors reporting themselves as retryable are retried.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Classifies an error as transient (worth retrying) or permanent
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Configuration for retry behavior on transient errors
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one (default: 3)
    pub max_attempts: usize,
    /// Base delay in milliseconds for exponential backoff (default: 50ms)
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds (default: 1000ms)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 50,
            max_delay_ms: 1_000,
        }
    }
}

/// Calculate backoff delay for a given attempt using exponential backoff with jitter
pub fn backoff_delay(attempt: usize, config: &RetryConfig) -> Duration {
    let shift = (attempt.saturating_sub(1)).min(10) as u32;
    let exp = 1_u64.checked_shl(shift).unwrap_or(u64::MAX);
    let base = config.base_delay_ms.saturating_mul(exp);
    let capped = base.min(config.max_delay_ms);
    Duration::from_millis(jitter_ms(capped))
}

/// Apply ±20% jitter to a base delay
fn jitter_ms(base_ms: u64) -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as i64;
    let jitter_pct = (nanos % 41) - 20;
    let base = base_ms as i64;
    let jittered = base + (base * jitter_pct / 100);
    jittered.max(0) as u64
}

/// Retry an async operation with exponential backoff
///
/// Permanent errors fail immediately; transient errors are retried until
/// `config.max_attempts` is exhausted, after which the last error is returned.
pub async fn retry_with_backoff<F, Fut, T, E>(
    operation: &str,
    config: &RetryConfig,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if attempt >= config.max_attempts || !err.is_retryable() {
                    return Err(err);
                }
                let delay = backoff_delay(attempt, config);
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
