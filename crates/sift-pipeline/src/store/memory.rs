//! In-memory [`ContentStore`] for tests and dry runs.
//!
//! State lives behind `std::sync::RwLock`; no lock is held across an await.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sift_core::{ContentItem, NewContentItem, ProcessingStatus, Summary, UsageRecord};
use uuid::Uuid;

use super::{ContentStore, PendingQuery, StoreError};

#[derive(Default)]
struct State {
    items: HashMap<Uuid, ContentItem>,
    summaries: HashMap<(Uuid, String), Summary>,
    usage: Vec<UsageRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored summaries across all items.
    #[must_use]
    pub fn summary_count(&self) -> usize {
        self.read().summaries.len()
    }

    /// Every usage record written so far, oldest first.
    #[must_use]
    pub fn usage_records(&self) -> Vec<UsageRecord> {
        self.read().usage.clone()
    }
}

fn apply_new(target: &mut ContentItem, item: &NewContentItem) {
    target.title.clone_from(&item.title);
    target.url.clone_from(&item.url);
    target.author.clone_from(&item.author);
    target.published_at = item.published_at;
    target.image_url.clone_from(&item.image_url);
    target.raw_text.clone_from(&item.raw_text);
    target.extracted_text.clone_from(&item.extracted_text);
    if item.audio_url.is_some() {
        target.audio_url.clone_from(&item.audio_url);
    }
    if item.audio_duration_secs.is_some() {
        target.audio_duration_secs = item.audio_duration_secs;
    }
    if item.transcript_url.is_some() {
        target.transcript_url.clone_from(&item.transcript_url);
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get_item(&self, id: Uuid) -> Result<Option<ContentItem>, StoreError> {
        Ok(self.read().items.get(&id).cloned())
    }

    async fn find_item(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<ContentItem>, StoreError> {
        Ok(self
            .read()
            .items
            .values()
            .find(|i| i.source == source && i.external_id == external_id)
            .cloned())
    }

    async fn insert_item(
        &self,
        item: &NewContentItem,
        content_hash: &str,
        word_count: i32,
    ) -> Result<ContentItem, StoreError> {
        let mut state = self.write();
        if state
            .items
            .values()
            .any(|i| i.source == item.source && i.external_id == item.external_id)
        {
            return Err(StoreError::Duplicate {
                source_slug: item.source.clone(),
                external_id: item.external_id.clone(),
            });
        }
        let now = Utc::now();
        let mut stored = ContentItem {
            id: Uuid::new_v4(),
            source: item.source.clone(),
            external_id: item.external_id.clone(),
            content_type: item.content_type(),
            title: None,
            url: None,
            author: None,
            published_at: None,
            image_url: None,
            raw_text: None,
            extracted_text: String::new(),
            content_hash: content_hash.to_string(),
            word_count,
            audio_url: None,
            audio_duration_secs: None,
            transcript_url: None,
            processing_status: ProcessingStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        apply_new(&mut stored, item);
        state.items.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn refresh_item(
        &self,
        id: Uuid,
        item: &NewContentItem,
        content_hash: &str,
        word_count: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        let stored = state.items.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply_new(stored, item);
        stored.content_hash = content_hash.to_string();
        stored.word_count = word_count;
        stored.processing_status = ProcessingStatus::Pending;
        stored.retry_count = 0;
        stored.last_error = None;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn update_text(
        &self,
        id: Uuid,
        extracted_text: &str,
        content_hash: &str,
        word_count: i32,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        let stored = state.items.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        stored.extracted_text = extracted_text.to_string();
        stored.content_hash = content_hash.to_string();
        stored.word_count = word_count;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.write();
        let stored = state.items.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if matches!(
            status,
            ProcessingStatus::Failed | ProcessingStatus::PermanentlyFailed
        ) {
            stored.retry_count += 1;
        }
        stored.processing_status = status;
        stored.last_error = error.map(str::to_string);
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn claim_for_processing(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.write();
        match state.items.get_mut(&id) {
            Some(stored) if stored.processing_status != ProcessingStatus::Processing => {
                stored.processing_status = ProcessingStatus::Processing;
                stored.last_error = None;
                stored.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_pending(&self, query: &PendingQuery) -> Result<Vec<Uuid>, StoreError> {
        let state = self.read();
        let mut eligible: Vec<&ContentItem> = state
            .items
            .values()
            .filter(|i| match i.processing_status {
                ProcessingStatus::Pending => true,
                ProcessingStatus::Failed => i.retry_count < query.max_attempts,
                _ => false,
            })
            .filter(|i| query.source.as_deref().map_or(true, |s| i.source == s))
            .collect();
        eligible.sort_by_key(|i| (i.created_at, i.id));
        Ok(eligible
            .into_iter()
            .take(query.limit)
            .map(|i| i.id)
            .collect())
    }

    async fn get_summary(
        &self,
        content_id: Uuid,
        summary_type: &str,
    ) -> Result<Option<Summary>, StoreError> {
        Ok(self
            .read()
            .summaries
            .get(&(content_id, summary_type.to_string()))
            .cloned())
    }

    async fn upsert_summary(&self, summary: &Summary) -> Result<(), StoreError> {
        self.write().summaries.insert(
            (summary.content_id, summary.summary_type.clone()),
            summary.clone(),
        );
        Ok(())
    }

    async fn record_usage(&self, record: &UsageRecord) -> Result<(), StoreError> {
        self.write().usage.push(record.clone());
        Ok(())
    }

    async fn usage_since(&self, since: DateTime<Utc>) -> Result<Vec<UsageRecord>, StoreError> {
        Ok(self
            .read()
            .usage
            .iter()
            .filter(|r| r.recorded_at >= since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use sift_core::ContentType;

    use super::*;

    fn new_item(external_id: &str) -> NewContentItem {
        NewContentItem {
            source: "blog".to_string(),
            external_id: external_id.to_string(),
            content_type: Some(ContentType::Article),
            extracted_text: "text".to_string(),
            ..NewContentItem::default()
        }
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = MemoryStore::new();
        store.insert_item(&new_item("a"), "h", 1).await.unwrap();
        let err = store.insert_item(&new_item("a"), "h", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn failed_items_drop_out_after_max_attempts() {
        let store = MemoryStore::new();
        let item = store.insert_item(&new_item("a"), "h", 1).await.unwrap();
        let query = PendingQuery {
            limit: 10,
            source: None,
            max_attempts: 2,
        };
        store
            .set_status(item.id, ProcessingStatus::Failed, Some("x"))
            .await
            .unwrap();
        assert_eq!(store.list_pending(&query).await.unwrap(), vec![item.id]);
        store
            .set_status(item.id, ProcessingStatus::Failed, Some("x"))
            .await
            .unwrap();
        assert!(store.list_pending(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn processing_claim_is_exclusive() {
        let store = MemoryStore::new();
        let item = store.insert_item(&new_item("a"), "h", 1).await.unwrap();

        assert!(store.claim_for_processing(item.id).await.unwrap());
        assert!(!store.claim_for_processing(item.id).await.unwrap());
        assert!(!store.claim_for_processing(Uuid::new_v4()).await.unwrap());

        store
            .set_status(item.id, ProcessingStatus::Completed, None)
            .await
            .unwrap();
        assert!(store.claim_for_processing(item.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_pending_filters_by_source() {
        let store = MemoryStore::new();
        store.insert_item(&new_item("a"), "h", 1).await.unwrap();
        let query = PendingQuery {
            limit: 10,
            source: Some("other".to_string()),
            max_attempts: 3,
        };
        assert!(store.list_pending(&query).await.unwrap().is_empty());
    }
}
