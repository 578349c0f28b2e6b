use std::time::Duration;

use sift_core::{ErrorKind, UnavailableReason};
use thiserror::Error;

/// Classified failure of an outbound call.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The per-attempt timeout elapsed before the call completed.
    #[error("request timed out after {after_ms} ms")]
    Timeout { after_ms: u64 },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 or a provider-specific throttling signal.
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 5xx (including provider "overloaded" statuses).
    #[error("upstream server error: HTTP {status}")]
    ServerError { status: u16 },

    #[error("content unavailable: {reason}")]
    ContentUnavailable { reason: UnavailableReason },

    #[error("no transcript or captions are available")]
    NoTranscript,

    /// Any other non-success status the classifier does not retry.
    #[error("unexpected HTTP {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The provider reports the account's spend quota is used up.
    #[error("generation quota exhausted: {0}")]
    QuotaExhausted(String),

    /// The local rate limiter could not admit the request in time.
    #[error("rate limiter capacity not available after {waited_ms} ms")]
    CapacityTimeout { waited_ms: u64 },

    /// A single request larger than the per-minute token ceiling; it could
    /// never be admitted.
    #[error("request of ~{estimated} tokens exceeds the {ceiling} tokens/minute ceiling")]
    OverCapacity { estimated: usize, ceiling: usize },

    /// A successful response whose body could not be decoded.
    #[error("malformed response from {context}: {reason}")]
    Malformed { context: String, reason: String },
}

impl FetchError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Timeout { .. } | FetchError::Http(_) | FetchError::ServerError { .. } => {
                ErrorKind::TransientNetwork
            }
            FetchError::RateLimited { .. }
            | FetchError::CapacityTimeout { .. }
            | FetchError::OverCapacity { .. } => ErrorKind::RateLimited,
            FetchError::ContentUnavailable { .. } => ErrorKind::ContentUnavailable,
            FetchError::NoTranscript => ErrorKind::NoTranscript,
            FetchError::UnexpectedStatus { .. } => ErrorKind::Upstream,
            FetchError::QuotaExhausted(_) => ErrorKind::BudgetExceeded,
            FetchError::Malformed { .. } => ErrorKind::Parse,
        }
    }

    /// Whether another attempt after a back-off delay can succeed.
    ///
    /// [`FetchError::CapacityTimeout`] is not retried: the limiter has
    /// already waited its full allowance.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. }
            | FetchError::RateLimited { .. }
            | FetchError::ServerError { .. } => true,
            FetchError::Http(e) => !e.is_builder() && !e.is_redirect() && !e.is_decode(),
            FetchError::ContentUnavailable { .. }
            | FetchError::NoTranscript
            | FetchError::UnexpectedStatus { .. }
            | FetchError::QuotaExhausted(_)
            | FetchError::CapacityTimeout { .. }
            | FetchError::OverCapacity { .. }
            | FetchError::Malformed { .. } => false,
        }
    }

    /// Server-provided delay hint, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
