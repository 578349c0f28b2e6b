//! Retry with per-attempt timeout, exponential back-off, and jitter.
//!
//! [`perform`] wraps any fallible async operation. Each attempt is bounded
//! by [`RetryPolicy::timeout`]; an attempt that overruns is cancelled and
//! classified as [`FetchError::Timeout`]. Retryable failures sleep for
//! [`backoff_delay`] (or the server's `Retry-After` hint) before the next
//! attempt. Non-retryable failures return immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::FetchError;

const DEFAULT_MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first; `max_retries = 3` means at most
    /// four attempts.
    pub max_retries: u32,
    pub timeout: Duration,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, timeout: Duration, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            timeout,
            base_delay_ms,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

/// Back-off before retry number `attempt` (0-based).
///
/// `base_delay_ms × 2^attempt × jitter`, capped at `max_delay_ms`. `jitter`
/// is expected in `[0.75, 1.25]`; the ±25% band keeps consecutive delays
/// non-decreasing because `1.25 × 2^n < 0.75 × 2^(n+1)`.
#[must_use]
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32, jitter: f64) -> Duration {
    let computed = policy
        .base_delay_ms
        .saturating_mul(1u64 << attempt.min(20));
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let jittered = (computed as f64 * jitter) as u64;
    Duration::from_millis(jittered.min(policy.max_delay_ms))
}

fn random_jitter() -> f64 {
    rand::random::<f64>() * 0.5 + 0.75
}

/// Runs `operation` until it succeeds, fails non-retryably, or exhausts
/// `policy.max_retries` retries. Returns the last classified error.
///
/// # Errors
///
/// Returns the [`FetchError`] produced by the final attempt, or
/// [`FetchError::Timeout`] if that attempt overran `policy.timeout`.
pub async fn perform<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        let outcome = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: u64::try_from(policy.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || attempt >= policy.max_retries {
            return Err(err);
        }

        let delay = match err.retry_after() {
            Some(hint) => hint.min(Duration::from_millis(policy.max_delay_ms)),
            None => backoff_delay(policy, attempt, random_jitter()),
        };
        attempt += 1;
        tracing::warn!(
            label,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "transient failure, retrying after back-off"
        );
        tokio::time::sleep(delay).await;
    }
}
