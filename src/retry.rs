use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::youtube::FetchError;

/// Errors that know whether another attempt is worthwhile
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for FetchError {
    fn is_transient(&self) -> bool {
        FetchError::is_transient(self)
    }
}

/// Exponential backoff: attempt `n` (from 0) waits `unit * base^n` before
/// the next try
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: u32,
    pub unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base: 2,
            unit: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base: base.max(1),
            unit,
        }
    }

    /// Delay slept after failed attempt `attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.base.saturating_pow(attempt);
        self.unit.saturating_mul(factor)
    }

    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(val) => return Ok(val),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) if attempt + 1 >= max_attempts => {
                    warn!("Giving up after {max_attempts} attempts: {e}");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay(attempt);
                    warn!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
