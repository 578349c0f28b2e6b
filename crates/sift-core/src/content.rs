//! Content items: the unit the pipeline ingests, classifies, and summarizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Article,
    PodcastEpisode,
    Video,
}

impl ContentType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Article => "article",
            ContentType::PodcastEpisode => "podcast_episode",
            ContentType::Video => "video",
        }
    }

    /// Podcast episodes and videos carry conversational transcripts rather
    /// than edited prose.
    #[must_use]
    pub fn is_transcript(self) -> bool {
        matches!(self, ContentType::PodcastEpisode | ContentType::Video)
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContentType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "article" => Ok(ContentType::Article),
            "podcast_episode" => Ok(ContentType::PodcastEpisode),
            "video" => Ok(ContentType::Video),
            other => Err(CoreError::InvalidContentType(other.to_string())),
        }
    }
}

/// Per-item lifecycle.
///
/// ```text
/// pending ──► processing ──► completed
///                  │───────► skipped
///                  │───────► failed ──► (re-queued while attempts remain)
///                  └───────► permanently_failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
    PermanentlyFailed,
}

impl ProcessingStatus {
    pub const ALL: [ProcessingStatus; 6] = [
        ProcessingStatus::Pending,
        ProcessingStatus::Processing,
        ProcessingStatus::Completed,
        ProcessingStatus::Failed,
        ProcessingStatus::Skipped,
        ProcessingStatus::PermanentlyFailed,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
            ProcessingStatus::PermanentlyFailed => "permanently_failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed
                | ProcessingStatus::Skipped
                | ProcessingStatus::PermanentlyFailed
        )
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProcessingStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidProcessingStatus(s.to_string()))
    }
}

/// A stored content item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    /// Slug of the configured source this item came from.
    pub source: String,
    /// Stable identifier assigned by the upstream source; unique per source.
    pub external_id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub raw_text: Option<String>,
    pub extracted_text: String,
    /// SHA-256 of `extracted_text` only.
    pub content_hash: String,
    pub word_count: i32,
    pub audio_url: Option<String>,
    pub audio_duration_secs: Option<i32>,
    pub transcript_url: Option<String>,
    pub processing_status: ProcessingStatus,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting or refreshing a content item. `content_hash` and
/// `word_count` are always derived from `extracted_text` by the writer.
#[derive(Debug, Clone, Default)]
pub struct NewContentItem {
    pub source: String,
    pub external_id: String,
    pub content_type: Option<ContentType>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub raw_text: Option<String>,
    pub extracted_text: String,
    pub audio_url: Option<String>,
    pub audio_duration_secs: Option<i32>,
    pub transcript_url: Option<String>,
}

impl NewContentItem {
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type.unwrap_or(ContentType::Article)
    }
}

/// Counts whitespace-separated words.
#[must_use]
pub fn count_words(text: &str) -> i32 {
    i32::try_from(text.split_whitespace().count()).unwrap_or(i32::MAX)
}
