//! Cross-crate failure taxonomy.

use serde::{Deserialize, Serialize};

use crate::content::ProcessingStatus;

/// Classification shared by every error the pipeline can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network failure, timeout, or upstream 5xx.
    TransientNetwork,
    /// Upstream 429, provider rate-limit signal, or local capacity wait exhausted.
    RateLimited,
    /// The content itself cannot be obtained (removed, private, restricted).
    ContentUnavailable,
    /// The content exists but has no transcript or captions.
    NoTranscript,
    /// Malformed structured response.
    Parse,
    /// Spend ceiling reached; retrying cannot help until the window rolls over.
    BudgetExceeded,
    /// Any other non-retryable upstream rejection (bad request, auth).
    Upstream,
    /// Persistence failure.
    Storage,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::TransientNetwork => "transient_network",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ContentUnavailable => "content_unavailable",
            ErrorKind::NoTranscript => "no_transcript",
            ErrorKind::Parse => "parse",
            ErrorKind::BudgetExceeded => "budget_exceeded",
            ErrorKind::Upstream => "upstream",
            ErrorKind::Storage => "storage",
        }
    }

    /// The status an item lands in when processing stops with this kind.
    #[must_use]
    pub fn processing_status(self) -> ProcessingStatus {
        match self {
            ErrorKind::ContentUnavailable | ErrorKind::NoTranscript => {
                ProcessingStatus::PermanentlyFailed
            }
            ErrorKind::TransientNetwork
            | ErrorKind::RateLimited
            | ErrorKind::Parse
            | ErrorKind::BudgetExceeded
            | ErrorKind::Upstream
            | ErrorKind::Storage => ProcessingStatus::Failed,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a piece of content cannot be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnavailableReason {
    NotFound,
    Deleted,
    Private,
    RegionRestricted,
    AgeRestricted,
    PaymentRequired,
    MembersOnly,
    CopyrightBlocked,
}

impl UnavailableReason {
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            UnavailableReason::NotFound => "The content could not be found.",
            UnavailableReason::Deleted => "The content has been removed by its publisher.",
            UnavailableReason::Private => "The content is private.",
            UnavailableReason::RegionRestricted => "The content is not available in this region.",
            UnavailableReason::AgeRestricted => "The content is age-restricted.",
            UnavailableReason::PaymentRequired => "The content requires a purchase or rental.",
            UnavailableReason::MembersOnly => "The content is available to members only.",
            UnavailableReason::CopyrightBlocked => "The content was blocked on copyright grounds.",
        }
    }
}

impl std::fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.user_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_kinds_are_permanent() {
        assert_eq!(
            ErrorKind::ContentUnavailable.processing_status(),
            ProcessingStatus::PermanentlyFailed
        );
        assert_eq!(
            ErrorKind::NoTranscript.processing_status(),
            ProcessingStatus::PermanentlyFailed
        );
    }

    #[test]
    fn budget_and_rate_kinds_are_retryable_later() {
        assert_eq!(
            ErrorKind::BudgetExceeded.processing_status(),
            ProcessingStatus::Failed
        );
        assert_eq!(
            ErrorKind::RateLimited.processing_status(),
            ProcessingStatus::Failed
        );
        assert_eq!(
            ErrorKind::TransientNetwork.processing_status(),
            ProcessingStatus::Failed
        );
    }
}
