//! Database operations for `content_items`.

use chrono::{DateTime, Utc};
use sift_core::{ContentItem, ContentType, NewContentItem, ProcessingStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const SELECT_COLUMNS: &str = "id, source, external_id, content_type, title, url, author, \
     published_at, image_url, raw_text, extracted_text, content_hash, word_count, \
     audio_url, audio_duration_secs, transcript_url, processing_status, retry_count, \
     last_error, created_at, updated_at";

/// A row from the `content_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub content_type: String,
    pub title: Option<String>,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub raw_text: Option<String>,
    pub extracted_text: String,
    pub content_hash: String,
    pub word_count: i32,
    pub audio_url: Option<String>,
    pub audio_duration_secs: Option<i32>,
    pub transcript_url: Option<String>,
    pub processing_status: String,
    pub retry_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ContentItemRow> for ContentItem {
    type Error = DbError;

    fn try_from(row: ContentItemRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| DbError::InvalidRow {
            table: "content_items",
            reason,
        };
        Ok(ContentItem {
            id: row.id,
            source: row.source,
            external_id: row.external_id,
            content_type: row
                .content_type
                .parse::<ContentType>()
                .map_err(|e| invalid(e.to_string()))?,
            title: row.title,
            url: row.url,
            author: row.author,
            published_at: row.published_at,
            image_url: row.image_url,
            raw_text: row.raw_text,
            extracted_text: row.extracted_text,
            content_hash: row.content_hash,
            word_count: row.word_count,
            audio_url: row.audio_url,
            audio_duration_secs: row.audio_duration_secs,
            transcript_url: row.transcript_url,
            processing_status: row
                .processing_status
                .parse::<ProcessingStatus>()
                .map_err(|e| invalid(e.to_string()))?,
            retry_count: row.retry_count,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Filter for [`list_pending_content`].
#[derive(Debug, Clone, Default)]
pub struct PendingFilter<'a> {
    pub limit: i64,
    pub source: Option<&'a str>,
    /// Failed items with fewer attempts than this are eligible again.
    pub max_attempts: i32,
}

/// Fetches a single content item by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or [`DbError::InvalidRow`]
/// if a stored enum value is unrecognised.
pub async fn get_content_item(pool: &PgPool, id: Uuid) -> Result<Option<ContentItem>, DbError> {
    let row = sqlx::query_as::<_, ContentItemRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM content_items WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    row.map(ContentItem::try_from).transpose()
}

/// Looks up an item by its upstream identity `(source, external_id)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_content_item(
    pool: &PgPool,
    source: &str,
    external_id: &str,
) -> Result<Option<ContentItem>, DbError> {
    let row = sqlx::query_as::<_, ContentItemRow>(&format!(
        "SELECT {SELECT_COLUMNS} FROM content_items WHERE source = $1 AND external_id = $2"
    ))
    .bind(source)
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    row.map(ContentItem::try_from).transpose()
}

/// Inserts a new item in `pending` status and returns the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a unique
/// violation on `(source, external_id)`).
pub async fn insert_content_item(
    pool: &PgPool,
    item: &NewContentItem,
    content_hash: &str,
    word_count: i32,
) -> Result<ContentItem, DbError> {
    let row = sqlx::query_as::<_, ContentItemRow>(&format!(
        "INSERT INTO content_items \
             (id, source, external_id, content_type, title, url, author, published_at, \
              image_url, raw_text, extracted_text, content_hash, word_count, audio_url, \
              audio_duration_secs, transcript_url, processing_status) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 'pending') \
         RETURNING {SELECT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&item.source)
    .bind(&item.external_id)
    .bind(item.content_type().as_str())
    .bind(&item.title)
    .bind(&item.url)
    .bind(&item.author)
    .bind(item.published_at)
    .bind(&item.image_url)
    .bind(&item.raw_text)
    .bind(&item.extracted_text)
    .bind(content_hash)
    .bind(word_count)
    .bind(&item.audio_url)
    .bind(item.audio_duration_secs)
    .bind(&item.transcript_url)
    .fetch_one(pool)
    .await?;

    ContentItem::try_from(row)
}

/// Replaces the text and metadata of an existing item whose content changed,
/// resetting it to `pending` with a clean retry count.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn refresh_content_item(
    pool: &PgPool,
    id: Uuid,
    item: &NewContentItem,
    content_hash: &str,
    word_count: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE content_items SET \
             title = $1, url = $2, author = $3, published_at = $4, image_url = $5, \
             raw_text = $6, extracted_text = $7, content_hash = $8, word_count = $9, \
             audio_url = COALESCE($10, audio_url), \
             audio_duration_secs = COALESCE($11, audio_duration_secs), \
             transcript_url = COALESCE($12, transcript_url), \
             processing_status = 'pending', retry_count = 0, last_error = NULL, \
             updated_at = NOW() \
         WHERE id = $13",
    )
    .bind(&item.title)
    .bind(&item.url)
    .bind(&item.author)
    .bind(item.published_at)
    .bind(&item.image_url)
    .bind(&item.raw_text)
    .bind(&item.extracted_text)
    .bind(content_hash)
    .bind(word_count)
    .bind(&item.audio_url)
    .bind(item.audio_duration_secs)
    .bind(&item.transcript_url)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Stores newly acquired text (e.g. a fetched transcript) without touching
/// the processing status.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_extracted_text(
    pool: &PgPool,
    id: Uuid,
    extracted_text: &str,
    content_hash: &str,
    word_count: i32,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE content_items \
         SET extracted_text = $1, content_hash = $2, word_count = $3, updated_at = NOW() \
         WHERE id = $4",
    )
    .bind(extracted_text)
    .bind(content_hash)
    .bind(word_count)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Sets `processing_status` and `last_error`. Transitions into `failed` or
/// `permanently_failed` increment `retry_count`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_processing_status(
    pool: &PgPool,
    id: Uuid,
    status: ProcessingStatus,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE content_items SET \
             processing_status = $1, \
             last_error = $2, \
             retry_count = retry_count + \
                 CASE WHEN $1 IN ('failed', 'permanently_failed') THEN 1 ELSE 0 END, \
             updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Moves an item into `processing` unless it is already there, clearing
/// `last_error`. Returns `false` when another run holds the claim or no row
/// has the given `id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn claim_content_item(pool: &PgPool, id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE content_items SET \
             processing_status = 'processing', \
             last_error = NULL, \
             updated_at = NOW() \
         WHERE id = $1 AND processing_status <> 'processing'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Returns ids of items awaiting processing, oldest first: every `pending`
/// item plus `failed` items that still have attempts left.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_pending_content(
    pool: &PgPool,
    filter: &PendingFilter<'_>,
) -> Result<Vec<Uuid>, DbError> {
    let ids = sqlx::query_scalar::<_, Uuid>(
        "SELECT id FROM content_items \
         WHERE (processing_status = 'pending' \
                OR (processing_status = 'failed' AND retry_count < $1)) \
           AND ($2::TEXT IS NULL OR source = $2) \
         ORDER BY created_at ASC, id ASC \
         LIMIT $3",
    )
    .bind(filter.max_attempts)
    .bind(filter.source)
    .bind(filter.limit)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}
