//! Overload-aware retry with exponential backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ChatError;

/// Retry policy configuration.
///
/// Only errors for which [`ChatError::is_overloaded`] holds are retried;
/// everything else is returned on the first failure. The policy keeps no
/// state between calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Durations slept before each retry, in order.
    pub fn backoff_schedule(&self) -> Vec<Duration> {
        let mut backoff = self.initial_backoff.min(self.max_backoff);
        let mut schedule = Vec::with_capacity(self.max_retries as usize);
        for _ in 0..self.max_retries {
            schedule.push(backoff);
            backoff = self.next_backoff(backoff);
        }
        schedule
    }

    fn next_backoff(&self, current: Duration) -> Duration {
        Duration::from_secs_f64(
            (current.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
        )
    }

    /// Execute an async operation, retrying while the backend is overloaded.
    ///
    /// The backoff sleep races `cancel`; a fired token ends the call with
    /// [`ChatError::Canceled`].
    pub async fn execute<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, ChatError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ChatError>>,
    {
        let mut backoff = self.initial_backoff.min(self.max_backoff);
        let mut retries = 0u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_overloaded() {
                return Err(err);
            }
            if retries >= self.max_retries {
                tracing::warn!(retries, error = %err, "backend still overloaded, giving up");
                return Err(ChatError::Overloaded { retries });
            }

            tracing::warn!(
                attempt = retries + 1,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "backend overloaded, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ChatError::Canceled),
                _ = tokio::time::sleep(backoff) => {}
            }

            backoff = self.next_backoff(backoff);
            retries += 1;
        }
    }
}
