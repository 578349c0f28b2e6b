//! Network access for the sift pipeline.
//!
//! Every outbound call goes through [`retry::perform`], which applies a
//! per-attempt timeout, classifies failures into [`FetchError`], and retries
//! the retryable ones with jittered exponential back-off. Call sites differ
//! only in the [`Classifier`] they use.

pub mod classify;
pub mod client;
pub mod error;
pub mod feed;
pub mod retry;

pub use classify::{
    retry_after_from_headers, Classifier, FeedClassifier, GenerationClassifier,
    TranscriptClassifier,
};
pub use client::{Fetcher, FetcherConfig, HttpFetcher};
pub use error::FetchError;
pub use feed::{parse_feed, FeedEntry};
pub use retry::{backoff_delay, perform, RetryPolicy};
