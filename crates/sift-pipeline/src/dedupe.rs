//! Ingestion dedupe: insert new items, refresh changed ones, and leave
//! unchanged ones alone.

use sha2::{Digest, Sha256};
use sift_core::{count_words, NewContentItem};
use uuid::Uuid;

use crate::store::{ContentStore, StoreError};

/// Hex SHA-256 of the extracted text. Metadata is deliberately excluded so
/// that title or timestamp churn upstream does not trigger resummarization.
#[must_use]
pub fn content_hash(extracted_text: &str) -> String {
    format!("{:x}", Sha256::digest(extracted_text.as_bytes()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// First sighting; stored as `pending`.
    Created(Uuid),
    /// Text changed; refreshed and reset to `pending`.
    Updated(Uuid),
    /// Same text as stored; status untouched.
    Unchanged(Uuid),
}

impl IngestOutcome {
    #[must_use]
    pub fn id(self) -> Uuid {
        match self {
            IngestOutcome::Created(id)
            | IngestOutcome::Updated(id)
            | IngestOutcome::Unchanged(id) => id,
        }
    }
}

/// Writes `item` through the dedupe rules. The hash and word count are
/// always recomputed here from `extracted_text`.
///
/// # Errors
///
/// Returns [`StoreError`] if a lookup or write fails.
pub async fn ingest_item(
    store: &dyn ContentStore,
    item: &NewContentItem,
) -> Result<IngestOutcome, StoreError> {
    let hash = content_hash(&item.extracted_text);
    let word_count = count_words(&item.extracted_text);

    if let Some(existing) = store.find_item(&item.source, &item.external_id).await? {
        return refresh_if_changed(
            store,
            existing.id,
            &existing.content_hash,
            item,
            &hash,
            word_count,
        )
        .await;
    }

    match store.insert_item(item, &hash, word_count).await {
        Ok(created) => {
            tracing::debug!(
                content_id = %created.id,
                source = %item.source,
                external_id = %item.external_id,
                word_count,
                "content item created"
            );
            Ok(IngestOutcome::Created(created.id))
        }
        // Another writer inserted it between our lookup and insert.
        Err(StoreError::Duplicate { .. }) => {
            let existing = store
                .find_item(&item.source, &item.external_id)
                .await?
                .ok_or_else(|| StoreError::Duplicate {
                    source_slug: item.source.clone(),
                    external_id: item.external_id.clone(),
                })?;
            refresh_if_changed(store, existing.id, &existing.content_hash, item, &hash, word_count)
                .await
        }
        Err(e) => Err(e),
    }
}

async fn refresh_if_changed(
    store: &dyn ContentStore,
    id: Uuid,
    stored_hash: &str,
    item: &NewContentItem,
    hash: &str,
    word_count: i32,
) -> Result<IngestOutcome, StoreError> {
    if stored_hash == hash {
        return Ok(IngestOutcome::Unchanged(id));
    }
    store.refresh_item(id, item, hash, word_count).await?;
    tracing::info!(content_id = %id, source = %item.source, "content changed; re-queued");
    Ok(IngestOutcome::Updated(id))
}
