//! `ingest` and `submit` command handlers.

use std::path::PathBuf;

use anyhow::Context;
use sift_core::{AppConfig, ContentType, NewContentItem};
use sift_fetch::{FetcherConfig, HttpFetcher};
use sift_pipeline::{
    ingest_item, ingest_source, BasicExtractor, ContentStore, Extractor, IngestOutcome,
    IngestReport,
};

/// Fetch every enabled source (or just `only`) and print per-source counts.
///
/// A failing source is reported and skipped; the command fails only if
/// every selected source failed.
///
/// # Errors
///
/// Returns an error if the sources file cannot be loaded, `only` names an
/// unknown source, or all sources fail.
pub(crate) async fn run_ingest(
    config: &AppConfig,
    store: &dyn ContentStore,
    only: Option<&str>,
) -> anyhow::Result<()> {
    let sources_file = sift_core::load_sources(&config.sources_path)?;
    let sources: Vec<_> = match only {
        Some(slug) => vec![sources_file
            .find(slug)
            .ok_or_else(|| anyhow::anyhow!("source '{slug}' not found"))?],
        None => sources_file.enabled().collect(),
    };
    if sources.is_empty() {
        println!("no enabled sources in {}", config.sources_path.display());
        return Ok(());
    }

    let fetcher = HttpFetcher::new(&FetcherConfig::from_app_config(config))?;
    let extractor = BasicExtractor;
    let mut total = IngestReport::default();
    let mut failed_sources = 0;

    println!(
        "{:<24}{:>8}{:>8}{:>8}{:>10}{:>8}",
        "SOURCE", "FETCHED", "NEW", "UPDATED", "UNCHANGED", "FAILED"
    );
    for source in &sources {
        match ingest_source(&fetcher, store, &extractor, source).await {
            Ok(report) => {
                println!(
                    "{:<24}{:>8}{:>8}{:>8}{:>10}{:>8}",
                    source.slug,
                    report.fetched,
                    report.created,
                    report.updated,
                    report.unchanged,
                    report.failed
                );
                total.fetched += report.fetched;
                total.created += report.created;
                total.updated += report.updated;
                total.unchanged += report.unchanged;
                total.failed += report.failed;
            }
            Err(e) => {
                failed_sources += 1;
                tracing::error!(source = %source.slug, error = %e, "source ingestion failed");
                println!("{:<24}error: {e}", source.slug);
            }
        }
    }
    println!(
        "total: {} new, {} updated, {} unchanged, {} failed entries",
        total.created, total.updated, total.unchanged, total.failed
    );

    if failed_sources == sources.len() {
        anyhow::bail!("all {failed_sources} source(s) failed");
    }
    Ok(())
}

#[derive(Debug)]
pub(crate) struct Submission {
    pub source: String,
    pub external_id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub url: Option<String>,
    pub file: Option<PathBuf>,
    pub transcript_url: Option<String>,
}

/// Record one item through the same dedupe path as feed ingestion.
///
/// # Errors
///
/// Returns an error if neither a file nor a transcript URL is given, the
/// file cannot be read, or the store write fails.
pub(crate) async fn run_submit(
    store: &dyn ContentStore,
    submission: Submission,
) -> anyhow::Result<()> {
    if submission.file.is_none() && submission.transcript_url.is_none() {
        anyhow::bail!("either --file or --transcript-url is required");
    }

    let raw = match &submission.file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let extracted = raw
        .as_deref()
        .map(|r| BasicExtractor.extract(r))
        .unwrap_or_default();

    let item = NewContentItem {
        source: submission.source,
        external_id: submission.external_id,
        content_type: Some(submission.content_type),
        title: submission.title.or(extracted.title),
        url: submission.url,
        author: extracted.author,
        published_at: extracted.published_at,
        image_url: extracted.image_url,
        raw_text: raw,
        extracted_text: extracted.text,
        transcript_url: submission.transcript_url,
        ..NewContentItem::default()
    };

    match ingest_item(store, &item).await? {
        IngestOutcome::Created(id) => println!("created {id}"),
        IngestOutcome::Updated(id) => println!("updated {id} (content changed, re-queued)"),
        IngestOutcome::Unchanged(id) => println!("unchanged {id}"),
    }
    Ok(())
}
