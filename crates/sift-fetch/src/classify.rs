//! Pluggable response classifiers.
//!
//! A [`Classifier`] turns a completed HTTP exchange into either success
//! (`None`) or a [`FetchError`]. The retry mechanics in [`crate::retry`] are
//! shared; only the classification differs between feed, transcript, and
//! generation calls.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use sift_core::UnavailableReason;

use crate::error::FetchError;

/// A successful transcript body at most this long is treated as a possible
/// error notice and scanned for unavailability markers.
const ERROR_NOTICE_MAX_CHARS: usize = 400;

/// Longest body excerpt carried in [`FetchError::UnexpectedStatus`].
const MESSAGE_EXCERPT_CHARS: usize = 200;

pub trait Classifier: Send + Sync {
    fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Option<FetchError>;
}

/// Parses a delta-seconds `Retry-After` header. HTTP-date values are ignored.
#[must_use]
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn excerpt(body: &str) -> String {
    body.trim().chars().take(MESSAGE_EXCERPT_CHARS).collect()
}

/// Status handling shared by every classifier once call-specific checks
/// have had their say.
fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> Option<FetchError> {
    if status.is_success() {
        return None;
    }
    Some(match status.as_u16() {
        429 => FetchError::RateLimited { retry_after },
        408 => FetchError::ServerError {
            status: status.as_u16(),
        },
        s if status.is_server_error() => FetchError::ServerError { status: s },
        s => FetchError::UnexpectedStatus {
            status: s,
            message: excerpt(body),
        },
    })
}

/// Feed fetches: HTTP status only.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedClassifier;

impl Classifier for FeedClassifier {
    fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Option<FetchError> {
        match status {
            StatusCode::NOT_FOUND => Some(FetchError::ContentUnavailable {
                reason: UnavailableReason::NotFound,
            }),
            StatusCode::GONE => Some(FetchError::ContentUnavailable {
                reason: UnavailableReason::Deleted,
            }),
            _ => classify_status(status, retry_after, body),
        }
    }
}

enum Marker {
    Unavailable(UnavailableReason),
    NoTranscript,
}

static MARKERS: LazyLock<Vec<(Regex, Marker)>> = LazyLock::new(|| {
    let rules: [(&str, Marker); 9] = [
        (
            r"(?i)\b(video|episode|content) is private\b|private video",
            Marker::Unavailable(UnavailableReason::Private),
        ),
        (
            r"(?i)sign in to confirm your age|age[- ]restricted",
            Marker::Unavailable(UnavailableReason::AgeRestricted),
        ),
        (
            r"(?i)(not|n't)\b.{0,30}available in your (country|region)|blocked in your (country|region)",
            Marker::Unavailable(UnavailableReason::RegionRestricted),
        ),
        (
            r"(?i)has been removed|no longer available|account (has been|was) terminated",
            Marker::Unavailable(UnavailableReason::Deleted),
        ),
        (
            r"(?i)copyright (claim|grounds|infringement)",
            Marker::Unavailable(UnavailableReason::CopyrightBlocked),
        ),
        (
            r"(?i)members[- ]only|join this channel to get access",
            Marker::Unavailable(UnavailableReason::MembersOnly),
        ),
        (
            r"(?i)requires payment|rent this video|purchase to watch",
            Marker::Unavailable(UnavailableReason::PaymentRequired),
        ),
        (
            r"(?i)(video|content) (is )?unavailable|could not be found",
            Marker::Unavailable(UnavailableReason::NotFound),
        ),
        (
            r"(?i)transcripts? (are |is )?disabled|no (captions|subtitles|transcript)s? (are )?available",
            Marker::NoTranscript,
        ),
    ];
    rules
        .into_iter()
        .map(|(pattern, marker)| (Regex::new(pattern).expect("valid regex"), marker))
        .collect()
});

fn scan_markers(body: &str) -> Option<FetchError> {
    MARKERS
        .iter()
        .find(|(re, _)| re.is_match(body))
        .map(|(_, marker)| match marker {
            Marker::Unavailable(reason) => FetchError::ContentUnavailable { reason: *reason },
            Marker::NoTranscript => FetchError::NoTranscript,
        })
}

/// Short bodies and JSON `error` envelopes; anything else is transcript text
/// and is never scanned, whatever phrases it happens to contain.
fn looks_like_error_notice(body: &str) -> bool {
    let trimmed = body.trim();
    trimmed.chars().count() <= ERROR_NOTICE_MAX_CHARS
        || (trimmed.starts_with('{') && trimmed.contains("\"error\""))
}

/// Transcript and video fetches: HTTP status plus body scanning for known
/// "private / restricted / removed / no captions" markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TranscriptClassifier;

impl Classifier for TranscriptClassifier {
    fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Option<FetchError> {
        if status.is_success() {
            if body.trim().is_empty() {
                return Some(FetchError::NoTranscript);
            }
            if !looks_like_error_notice(body) {
                return None;
            }
            return scan_markers(body);
        }

        let unavailable = |reason| FetchError::ContentUnavailable { reason };
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Some(scan_markers(body).unwrap_or(unavailable(UnavailableReason::Private)))
            }
            StatusCode::PAYMENT_REQUIRED => Some(unavailable(UnavailableReason::PaymentRequired)),
            StatusCode::NOT_FOUND => Some(scan_markers(body).unwrap_or(FetchError::NoTranscript)),
            StatusCode::GONE => Some(unavailable(UnavailableReason::Deleted)),
            StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS => {
                Some(unavailable(UnavailableReason::RegionRestricted))
            }
            _ => classify_status(status, retry_after, body),
        }
    }
}

static QUOTA_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)insufficient_quota|billing_hard_limit").expect("valid regex")
});

/// Generation calls: HTTP status plus provider quota signalling. A 429
/// that reports an exhausted quota is a budget failure, not a rate limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationClassifier;

impl Classifier for GenerationClassifier {
    fn classify(
        &self,
        status: StatusCode,
        retry_after: Option<Duration>,
        body: &str,
    ) -> Option<FetchError> {
        if status == StatusCode::TOO_MANY_REQUESTS && QUOTA_MARKER.is_match(body) {
            return Some(FetchError::QuotaExhausted(excerpt(body)));
        }
        classify_status(status, retry_after, body)
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn success_is_not_an_error() {
        assert!(FeedClassifier.classify(StatusCode::OK, None, "").is_none());
        assert!(GenerationClassifier
            .classify(StatusCode::OK, None, "{}")
            .is_none());
    }

    #[test]
    fn feed_404_is_unavailable() {
        let err = FeedClassifier
            .classify(StatusCode::NOT_FOUND, None, "")
            .unwrap();
        assert!(matches!(
            err,
            FetchError::ContentUnavailable {
                reason: UnavailableReason::NotFound
            }
        ));
    }

    #[test]
    fn feed_503_is_retryable() {
        let err = FeedClassifier
            .classify(StatusCode::SERVICE_UNAVAILABLE, None, "")
            .unwrap();
        assert!(err.is_retryable());
    }

    #[test]
    fn transcript_body_marker_detects_private_video() {
        let err = TranscriptClassifier
            .classify(StatusCode::OK, None, "Error: This video is private.")
            .unwrap();
        assert!(matches!(
            err,
            FetchError::ContentUnavailable {
                reason: UnavailableReason::Private
            }
        ));
    }

    #[test]
    fn transcript_body_marker_detects_disabled_captions() {
        let err = TranscriptClassifier
            .classify(StatusCode::OK, None, "Transcripts are disabled for this video")
            .unwrap();
        assert!(matches!(err, FetchError::NoTranscript));
    }

    #[test]
    fn transcript_marker_scan_ignores_text_past_the_opening() {
        let body = format!("{} this video is private", "word ".repeat(1_000));
        assert!(TranscriptClassifier
            .classify(StatusCode::OK, None, &body)
            .is_none());
    }

    #[test]
    fn transcript_that_mentions_removal_is_still_a_transcript() {
        let body = format!(
            "Welcome back to the show. Today we talk about how the tariff has been \
             removed, why the old plant is no longer available, and what could not be \
             found in the audit. {}",
            "Then the guests trade stories about the harvest season. ".repeat(20)
        );
        assert!(TranscriptClassifier
            .classify(StatusCode::OK, None, &body)
            .is_none());
    }

    #[test]
    fn transcript_json_error_envelope_is_scanned() {
        let body = format!(
            r#"{{"error": {{"message": "This video has been removed by the uploader"}}, "detail": "{}"}}"#,
            "x".repeat(500)
        );
        let err = TranscriptClassifier
            .classify(StatusCode::OK, None, &body)
            .unwrap();
        assert!(matches!(err, FetchError::ContentUnavailable { .. }));
    }

    #[test]
    fn transcript_region_block_from_forbidden_body() {
        let err = TranscriptClassifier
            .classify(
                StatusCode::FORBIDDEN,
                None,
                "The uploader has not made this video available in your country",
            )
            .unwrap();
        assert!(matches!(
            err,
            FetchError::ContentUnavailable {
                reason: UnavailableReason::RegionRestricted
            }
        ));
    }

    #[test]
    fn empty_transcript_is_no_transcript() {
        let err = TranscriptClassifier
            .classify(StatusCode::OK, None, "   ")
            .unwrap();
        assert!(matches!(err, FetchError::NoTranscript));
    }

    #[test]
    fn generation_429_is_rate_limited_with_hint() {
        let err = GenerationClassifier
            .classify(
                StatusCode::TOO_MANY_REQUESTS,
                Some(Duration::from_secs(3)),
                r#"{"error":{"code":"rate_limit_exceeded"}}"#,
            )
            .unwrap();
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn generation_insufficient_quota_is_budget_failure() {
        let err = GenerationClassifier
            .classify(
                StatusCode::TOO_MANY_REQUESTS,
                None,
                r#"{"error":{"code":"insufficient_quota"}}"#,
            )
            .unwrap();
        assert!(matches!(err, FetchError::QuotaExhausted(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn generation_bad_request_is_not_retryable() {
        let err = GenerationClassifier
            .classify(StatusCode::BAD_REQUEST, None, "bad model")
            .unwrap();
        assert!(matches!(
            err,
            FetchError::UnexpectedStatus { status: 400, .. }
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn retry_after_parses_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(
            retry_after_from_headers(&headers),
            Some(Duration::from_secs(12))
        );
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(retry_after_from_headers(&headers), None);
    }
}
