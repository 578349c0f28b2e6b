//! Persistence seam for the pipeline.
//!
//! [`ContentStore`] covers everything processing and ingestion need from
//! storage. [`PgStore`] delegates to `sift-db`; [`MemoryStore`] backs tests
//! and dry runs.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sift_core::{ContentItem, NewContentItem, ProcessingStatus, Summary, UsageRecord};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("content item {0} not found")]
    NotFound(Uuid),

    #[error("content item {source_slug}/{external_id} already exists")]
    Duplicate {
        source_slug: String,
        external_id: String,
    },

    #[error(transparent)]
    Db(#[from] sift_db::DbError),
}

/// Filter for [`ContentStore::list_pending`].
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub limit: usize,
    pub source: Option<String>,
    /// `failed` items with fewer recorded attempts than this are returned
    /// alongside `pending` ones.
    pub max_attempts: i32,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_item(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError>;

    async fn find_item(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<ContentItem>, StoreError>;

    /// Inserts a new item in `pending` status.
    async fn insert_item(
        &self,
        item: &NewContentItem,
        content_hash: &str,
        word_count: i32,
    ) -> Result<ContentItem, StoreError>;

    /// Replaces text and metadata of a changed item and resets it to
    /// `pending` with a zero retry count.
    async fn refresh_item(
        &self,
        id: Uuid,
        item: &NewContentItem,
        content_hash: &str,
        word_count: i32,
    ) -> Result<(), StoreError>;

    /// Stores newly acquired text without touching the status.
    async fn update_text(
        &self,
        id: Uuid,
        extracted_text: &str,
        content_hash: &str,
        word_count: i32,
    ) -> Result<(), StoreError>;

    /// Sets the status and last error. Entering `failed` or
    /// `permanently_failed` increments the retry count.
    async fn set_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError>;

    /// Moves the item to `processing` unless it is already there. Returns
    /// `false` when another run holds the claim or the item does not exist.
    async fn claim_for_processing(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Ids awaiting processing, oldest first.
    async fn list_pending(&self, query: &PendingQuery) -> Result<Vec<Uuid>, StoreError>;

    async fn get_summary(
        &self,
        content_id: Uuid,
        summary_type: &str,
    ) -> Result<Option<Summary>, StoreError>;

    /// Inserts or replaces the summary for `(content_id, summary_type)`.
    async fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError>;

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), StoreError>;

    async fn usage_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageRecord>, StoreError>;
}
