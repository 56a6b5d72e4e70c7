//! Bounded exponential backoff for remote calls.
//!
//! A retried operation yields either its value or a [`RetryFailure`] that
//! carries the last error together with the number of attempts made, so the
//! caller always sees how a call ended instead of an error escaping from
//! inside the loop.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Default maximum number of attempts (first call included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1_000;

/// Errors that know whether retrying them is worthwhile.
pub trait Retryable {
    /// Returns `true` if another attempt may succeed.
    fn is_transient(&self) -> bool;
}

impl Retryable for dune_client::DuneError {
    fn is_transient(&self) -> bool {
        dune_client::DuneError::is_transient(self)
    }
}

/// Retry policy for transient remote failures.
///
/// ```
/// use x402_pipeline::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.max_attempts, 3);
/// assert_eq!(policy.delay_after(0), Duration::from_millis(1000));
/// assert_eq!(policy.delay_after(1), Duration::from_millis(2000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first call included.
    pub max_attempts: u32,
    /// Base delay in milliseconds; doubled after every failed attempt.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay in milliseconds.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Sleep that follows the failure of 0-indexed attempt `attempt`:
    /// `base_delay * 2^attempt`, saturating.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(multiplier))
    }
}

/// A retried operation that did not succeed.
#[derive(Debug, thiserror::Error)]
#[error("failed after {attempts} attempt(s): {error}")]
pub struct RetryFailure<E> {
    /// Attempts actually made (1..=max_attempts).
    pub attempts: u32,
    /// The error returned by the final attempt.
    #[source]
    pub error: E,
}

/// Run `op` until it succeeds, a non-transient error occurs, or
/// `policy.max_attempts` attempts have been made.
///
/// `op` receives the 0-indexed attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryFailure<E>>
where
    E: Retryable + std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let made = attempt + 1;
                if made >= max_attempts || !error.is_transient() {
                    return Err(RetryFailure {
                        attempts: made,
                        error,
                    });
                }
                let delay = policy.delay_after(attempt);
                warn!(
                    attempt = made,
                    retry_in_ms = delay.as_millis() as u64,
                    "attempt failed: {error}"
                );
                tokio::time::sleep(delay).await;
                attempt = made;
            }
        }
    }
}
