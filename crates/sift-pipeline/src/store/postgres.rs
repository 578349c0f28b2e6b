//! [`ContentStore`] backed by Postgres through `sift-db`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sift_core::{ContentItem, NewContentItem, ProcessingStatus, Summary, UsageRecord};
use sift_db::{DbError, PendingFilter};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ContentStore, PendingQuery, StoreError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn not_found_as(id: Uuid) -> impl FnOnce(DbError) -> StoreError {
    move |e| match e {
        DbError::NotFound => StoreError::NotFound(id),
        other => StoreError::Db(other),
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn get_item(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        Ok(sift_db::get_content_item(&self.pool, id).await?)
    }

    async fn find_item(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(sift_db::find_content_item(&self.pool, source, external_id).await?)
    }

    async fn insert_item(
        &self,
        item: &NewContentItem,
        content_hash: &str,
        word_count: i32,
    ) -> Result<ContentItem, StoreError> {
        sift_db::insert_content_item(&self.pool, item, content_hash, word_count)
            .await
            .map_err(|e| match e {
                DbError::Sqlx(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                    StoreError::Duplicate {
                        source_slug: item.source.clone(),
                        external_id: item.external_id.clone(),
                    }
                }
                other => StoreError::Db(other),
            })
    }

    async fn refresh_item(
        &self,
        id: Uuid,
        item: &NewContentItem,
        content_hash: &str,
        word_count: i32,
    ) -> Result<(), StoreError> {
        sift_db::refresh_content_item(&self.pool, id, item, content_hash, word_count)
            .await
            .map_err(not_found_as(id))
    }

    async fn update_text(
        &self,
        id: Uuid,
        extracted_text: &str,
        content_hash: &str,
        word_count: i32,
    ) -> Result<(), StoreError> {
        sift_db::update_extracted_text(&self.pool, id, extracted_text, content_hash, word_count)
            .await
            .map_err(not_found_as(id))
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        sift_db::update_processing_status(&self.pool, id, status, error)
            .await
            .map_err(not_found_as(id))
    }

    async fn claim_for_processing(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(sift_db::claim_content_item(&self.pool, id).await?)
    }

    async fn list_pending(&self, query: &PendingQuery) -> Result<Vec<Uuid>, StoreError> {
        let filter = PendingFilter {
            limit: i64::try_from(query.limit).unwrap_or(i64::MAX),
            source: query.source.as_deref(),
            max_attempts: query.max_attempts,
        };
        Ok(sift_db::list_pending_content(&self.pool, &filter).await?)
    }

    async fn get_summary(
        &self,
        content_id: Uuid,
        summary_type: &str,
    ) -> Result<Option<Summary>, StoreError> {
        Ok(sift_db::get_summary(&self.pool, content_id, summary_type).await?)
    }

    async fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError> {
        Ok(sift_db::upsert_summary(&self.pool, summary).await?)
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), StoreError> {
        Ok(sift_db::insert_usage_record(&self.pool, record).await?)
    }

    async fn usage_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(sift_db::list_usage_since(&self.pool, since).await?)
    }
}
