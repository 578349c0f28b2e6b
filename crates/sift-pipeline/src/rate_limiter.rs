//! Rolling-window request and token limiter for the generation service.
//!
//! Entries are `(issued_at, tokens)` pairs kept for [`WINDOW`]. Admission
//! checks consult only recorded usage; callers record after each issued
//! request.

use std::collections::VecDeque;
use std::time::Duration;

use sift_fetch::FetchError;
use tokio::sync::Mutex;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Longest single sleep while waiting for capacity.
const MAX_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub requests_per_minute: usize,
    pub tokens_per_minute: usize,
    /// Total time [`RateLimiter::await_capacity`] may wait before failing.
    pub max_wait: Duration,
}

impl RateLimitConfig {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        Self {
            requests_per_minute: config.rate_requests_per_minute,
            tokens_per_minute: config.rate_tokens_per_minute,
            max_wait: Duration::from_secs(config.rate_max_wait_secs),
        }
    }
}

/// Usage inside the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSnapshot {
    pub requests: usize,
    pub tokens: usize,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<VecDeque<(Instant, usize)>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Mutex::new(VecDeque::new()),
        }
    }

    fn prune(window: &mut VecDeque<(Instant, usize)>, now: Instant) {
        while window
            .front()
            .is_some_and(|(at, _)| now.duration_since(*at) >= WINDOW)
        {
            window.pop_front();
        }
    }

    fn admits(&self, window: &VecDeque<(Instant, usize)>, estimated_tokens: usize) -> bool {
        let tokens: usize = window.iter().map(|(_, t)| t).sum();
        window.len() < self.config.requests_per_minute
            && tokens.saturating_add(estimated_tokens) <= self.config.tokens_per_minute
    }

    /// True iff one more request of `estimated_tokens` fits in the window.
    pub async fn can_proceed(&self, estimated_tokens: usize) -> bool {
        let mut window = self.window.lock().await;
        Self::prune(&mut window, Instant::now());
        self.admits(&window, estimated_tokens)
    }

    /// Waits until [`can_proceed`](Self::can_proceed) holds, sleeping until
    /// the oldest entry expires (at most [`MAX_POLL`] per check).
    ///
    /// # Errors
    ///
    /// [`FetchError::OverCapacity`] immediately when `estimated_tokens` alone
    /// exceeds the per-minute ceiling; [`FetchError::CapacityTimeout`] once
    /// the configured maximum wait is spent.
    pub async fn await_capacity(&self, estimated_tokens: usize) -> Result<(), FetchError> {
        if estimated_tokens > self.config.tokens_per_minute {
            return Err(FetchError::OverCapacity {
                estimated: estimated_tokens,
                ceiling: self.config.tokens_per_minute,
            });
        }

        let started = Instant::now();
        loop {
            let sleep_for = {
                let mut window = self.window.lock().await;
                let now = Instant::now();
                Self::prune(&mut window, now);
                if self.admits(&window, estimated_tokens) {
                    return Ok(());
                }
                let waited = now.duration_since(started);
                if waited >= self.config.max_wait {
                    return Err(FetchError::CapacityTimeout {
                        waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                    });
                }
                let until_expiry = window
                    .front()
                    .map_or(MAX_POLL, |(at, _)| WINDOW.saturating_sub(now.duration_since(*at)));
                until_expiry
                    .min(MAX_POLL)
                    .min(self.config.max_wait - waited)
                    .max(Duration::from_millis(10))
            };
            tracing::debug!(
                estimated_tokens,
                sleep_ms = u64::try_from(sleep_for.as_millis()).unwrap_or(u64::MAX),
                "waiting for rate limiter capacity"
            );
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Records one issued request. Call exactly once per request, after it
    /// completes; failed requests record zero tokens.
    pub async fn record_request(&self, tokens_used: usize) {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        Self::prune(&mut window, now);
        window.push_back((now, tokens_used));
    }

    pub async fn snapshot(&self) -> RateSnapshot {
        let mut window = self.window.lock().await;
        Self::prune(&mut window, Instant::now());
        RateSnapshot {
            requests: window.len(),
            tokens: window.iter().map(|(_, t)| t).sum(),
        }
    }
}
