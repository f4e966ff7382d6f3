//! Exponential backoff retry.
//!
//! [`retry`] re-runs a whole operation after any error, waiting a growing,
//! randomized interval between attempts, until it succeeds or the
//! [`ExponentialBackoff`] policy is exhausted. Attempts never overlap.

use crate::Result;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Defines how long to wait between retries and when to stop.
///
/// The interval before retry `n` (1-indexed) is
/// `initial_interval * multiplier^(n - 1)`, capped at `max_interval`, then
/// randomized within `± randomization_factor` of itself.
///
/// # Examples
///
/// ```
/// use typed_fetch::ExponentialBackoff;
/// use std::time::Duration;
///
/// // 100ms, 150ms, 225ms, then give up
/// let backoff = ExponentialBackoff {
///     randomization_factor: 0.0,
///     ..ExponentialBackoff::new(Duration::from_millis(100), 3)
/// };
///
/// assert_eq!(backoff.delay_for_retry(1), Some(Duration::from_millis(100)));
/// assert_eq!(backoff.delay_for_retry(3), Some(Duration::from_millis(225)));
/// assert_eq!(backoff.delay_for_retry(4), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    /// The delay before the first retry.
    pub initial_interval: Duration,
    /// Growth factor applied to the interval after each retry.
    pub multiplier: f64,
    /// Spread of the random jitter, as a fraction of the interval.
    pub randomization_factor: f64,
    /// The maximum delay between retries, before jitter.
    pub max_interval: Duration,
    /// Stop retrying once this much time has passed since the first attempt.
    pub max_elapsed_time: Option<Duration>,
    /// The maximum number of retries. `0` means a single attempt.
    pub max_retries: usize,
}

impl ExponentialBackoff {
    /// Default growth factor.
    pub const DEFAULT_MULTIPLIER: f64 = 1.5;
    /// Default jitter spread.
    pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;
    /// Default cap on a single interval.
    pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
    /// Default cap on the total time spent retrying.
    pub const DEFAULT_MAX_ELAPSED_TIME: Duration = Duration::from_secs(15 * 60);

    /// Creates a policy starting at `initial_interval` and allowing `max_retries` retries.
    pub fn new(initial_interval: Duration, max_retries: usize) -> Self {
        Self {
            initial_interval,
            multiplier: Self::DEFAULT_MULTIPLIER,
            randomization_factor: Self::DEFAULT_RANDOMIZATION_FACTOR,
            max_interval: Self::DEFAULT_MAX_INTERVAL,
            max_elapsed_time: Some(Self::DEFAULT_MAX_ELAPSED_TIME),
            max_retries,
        }
    }

    /// Returns the delay before the given retry, or `None` if retries are exhausted.
    ///
    /// # Arguments
    ///
    /// * `retry` - The retry number (1-indexed, so 1 = first retry)
    pub fn delay_for_retry(&self, retry: usize) -> Option<Duration> {
        if retry == 0 || retry > self.max_retries {
            return None;
        }

        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let growth = self.multiplier.max(1.0).powi(exponent);
        let interval = (self.initial_interval.as_nanos() as f64 * growth)
            .min(self.max_interval.as_nanos() as f64);

        let factor = self.randomization_factor.clamp(0.0, 1.0);
        let delay = if factor > 0.0 {
            let delta = interval * factor;
            rand::thread_rng().gen_range((interval - delta)..=(interval + delta))
        } else {
            interval
        };

        Some(Duration::from_nanos(delay.round() as u64))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), 3)
    }
}

/// Runs `operation` until it succeeds or `backoff` is exhausted.
///
/// Every error is retried. The error of the final attempt is returned as-is.
/// Cancelling `ctx` stops further retries; the last error is returned.
pub async fn retry<T, F, Fut>(
    backoff: &ExponentialBackoff,
    ctx: &CancellationToken,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let started = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Succeeded after retrying");
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        let delay = backoff.delay_for_retry(attempt).filter(|delay| {
            backoff
                .max_elapsed_time
                .map_or(true, |max| started.elapsed() + *delay <= max)
        });

        let Some(delay) = delay else {
            tracing::warn!(error = %error, attempts = attempt, "Giving up after final attempt");
            return Err(error);
        };

        tracing::warn!(
            error = %error,
            attempt = attempt,
            delay_ms = delay.as_millis() as u64,
            "Attempt failed, retrying after delay"
        );

        tokio::select! {
            _ = ctx.cancelled() => {
                tracing::debug!(attempts = attempt, "Retry cancelled");
                return Err(error);
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
