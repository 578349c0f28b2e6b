//! HTTP fetcher for feeds, transcripts, and audio.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::classify::{
    retry_after_from_headers, Classifier, FeedClassifier, TranscriptClassifier,
};
use crate::error::FetchError;
use crate::feed::{parse_feed, FeedEntry};
use crate::retry::{perform, RetryPolicy};

/// Network collaborator used by ingestion and processing.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError>;
    async fn fetch_transcript(&self, url: &str) -> Result<String, FetchError>;
    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
}

impl FetcherConfig {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        Self {
            timeout_secs: config.fetch_timeout_secs,
            user_agent: config.fetch_user_agent.clone(),
            max_retries: config.fetch_max_retries,
            backoff_base_ms: config.fetch_backoff_base_ms,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl HttpFetcher {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            policy: RetryPolicy::new(
                config.max_retries,
                Duration::from_secs(config.timeout_secs),
                config.backoff_base_ms,
            ),
        })
    }

    /// Sends one GET and classifies the response. Called once per attempt.
    async fn get_once(
        &self,
        url: &str,
        classifier: &dyn Classifier,
    ) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let retry_after = retry_after_from_headers(response.headers());
        let bytes = response.bytes().await?;
        let body = String::from_utf8_lossy(&bytes);
        match classifier.classify(status, retry_after, &body) {
            Some(err) => Err(err),
            None => Ok(bytes.to_vec()),
        }
    }

    async fn get(
        &self,
        url: &str,
        label: &str,
        classifier: &dyn Classifier,
    ) -> Result<Vec<u8>, FetchError> {
        perform(&self.policy, label, || self.get_once(url, classifier)).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        let bytes = self.get(url, "feed", &FeedClassifier).await?;
        parse_feed(&bytes, url)
    }

    async fn fetch_transcript(&self, url: &str) -> Result<String, FetchError> {
        let bytes = self.get(url, "transcript", &TranscriptClassifier).await?;
        // Stray invalid bytes are replaced rather than discarding the transcript.
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.get(url, "audio", &FeedClassifier).await
    }
}
