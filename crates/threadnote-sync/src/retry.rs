//! Retry with exponential back-off and jitter for destination writes.
//!
//! Only create/update calls go through here; reads are never retried.

use std::future::Future;
use std::time::Duration;

use threadnote_core::{Clock, SyncError};

const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base × 2^(retry-1)`,
    /// capped at 60 s, then scaled by a factor in `[0.75, 1.25)`.
    #[must_use]
    pub fn delay_for(&self, retry: u32, jitter: f64) -> Duration {
        let base_ms = u64::try_from(self.base_delay.as_millis()).unwrap_or(u64::MAX);
        let computed = base_ms.saturating_mul(1u64 << retry.saturating_sub(1).min(10));
        let capped = computed.min(MAX_DELAY_MS);
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let delay_ms = (capped as f64 * (jitter.clamp(0.0, 1.0) * 0.5 + 0.75)) as u64;
        Duration::from_millis(delay_ms)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` attempts have been made.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error once attempts
/// are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    clock: &dyn Clock,
    policy: RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt, rand::random::<f64>());
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    error = %err,
                    "transient error, retrying after back-off"
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
