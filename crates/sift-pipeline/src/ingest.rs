//! Feed ingestion: fetch a configured source and run every entry through
//! extraction and dedupe.

use serde::Serialize;
use sift_core::{NewContentItem, SourceConfig};
use sift_fetch::{FeedEntry, Fetcher};

use crate::dedupe::{ingest_item, IngestOutcome};
use crate::error::PipelineError;
use crate::extractor::Extractor;
use crate::store::ContentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// Maps a feed entry to a content item, preferring feed metadata over what
/// the extractor found in the body.
#[must_use]
pub fn entry_to_item(
    source: &SourceConfig,
    entry: FeedEntry,
    extractor: &dyn Extractor,
) -> NewContentItem {
    let extracted = entry
        .content
        .as_deref()
        .map(|raw| extractor.extract(raw))
        .unwrap_or_default();
    NewContentItem {
        source: source.slug.clone(),
        external_id: entry.external_id,
        content_type: Some(source.kind.content_type()),
        title: entry.title.or(extracted.title),
        url: entry.link,
        author: entry.author.or(extracted.author),
        published_at: entry.published_at.or(extracted.published_at),
        image_url: entry.image_url.or(extracted.image_url),
        raw_text: entry.content,
        extracted_text: extracted.text,
        audio_url: entry.audio_url,
        audio_duration_secs: entry.audio_duration_secs,
        transcript_url: None,
    }
}

/// Fetches `source` and ingests each entry. A failed entry is logged and
/// counted; it does not abort the rest.
///
/// # Errors
///
/// Returns [`PipelineError::Fetch`] if the feed itself cannot be fetched
/// or parsed.
pub async fn ingest_source(
    fetcher: &dyn Fetcher,
    store: &dyn ContentStore,
    extractor: &dyn Extractor,
    source: &SourceConfig,
) -> Result<IngestReport, PipelineError> {
    let entries = fetcher.fetch_feed(&source.url).await?;
    let mut report = IngestReport {
        fetched: entries.len(),
        ..IngestReport::default()
    };

    for entry in entries {
        let external_id = entry.external_id.clone();
        let item = entry_to_item(source, entry, extractor);
        match ingest_item(store, &item).await {
            Ok(IngestOutcome::Created(_)) => report.created += 1,
            Ok(IngestOutcome::Updated(_)) => report.updated += 1,
            Ok(IngestOutcome::Unchanged(_)) => report.unchanged += 1,
            Err(e) => {
                tracing::warn!(
                    source = %source.slug,
                    external_id = %external_id,
                    error = %e,
                    "failed to ingest entry"
                );
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        source = %source.slug,
        fetched = report.fetched,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        "source ingested"
    );
    Ok(report)
}
