//! `process` and `process-pending` command handlers.

use std::sync::Arc;

use sift_core::AppConfig;
use sift_pipeline::{build_pipeline, ContentStore, ProcessOptions, ProcessingResult};
use uuid::Uuid;

fn print_result(result: &ProcessingResult) {
    let status = result.status.map_or("untouched", |s| s.as_str());
    match &result.error {
        None => println!(
            "{}  {:<20} transcribed={} summarized={}",
            result.content_id, status, result.transcribed, result.summarized
        ),
        Some(e) => println!(
            "{}  {:<20} {}: {}",
            result.content_id, status, e.kind, e.message
        ),
    }
}

/// Process a single item and print its result as JSON.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built or the item did not
/// reach a successful status.
pub(crate) async fn run_process(
    config: &AppConfig,
    store: Arc<dyn ContentStore>,
    id: Uuid,
    options: ProcessOptions,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config, store).await?;
    let result = pipeline.processor.process_item(id, options).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(e) = &result.error {
        anyhow::bail!("processing {id} failed ({}): {}", e.kind, e.message);
    }
    Ok(())
}

/// Process up to `limit` pending items and print one line per item.
///
/// # Errors
///
/// Returns an error if the pipeline cannot be built or the pending list
/// cannot be read.
pub(crate) async fn run_process_pending(
    config: &AppConfig,
    store: Arc<dyn ContentStore>,
    limit: usize,
    source: Option<&str>,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(config, store).await?;
    let results = pipeline
        .processor
        .process_pending(limit, source, ProcessOptions::default())
        .await?;
    if results.is_empty() {
        println!("nothing pending");
        return Ok(());
    }
    for result in &results {
        print_result(result);
    }
    let succeeded = results.iter().filter(|r| r.success).count();
    println!("{succeeded}/{} succeeded", results.len());
    Ok(())
}
