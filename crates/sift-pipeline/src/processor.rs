//! Per-item processing state machine.
//!
//! ```text
//! pending ──► processing ──► completed
//!                  │───────► skipped             (below the word floor)
//!                  │───────► failed              (retryable later)
//!                  └───────► permanently_failed  (content unavailable)
//! ```
//!
//! `processing` is claimed atomically before any external call. A second run
//! on the same item finds the claim taken and leaves the item alone, and an
//! interrupted run is visible as a stuck item rather than silently reverting
//! to `pending`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sift_core::{
    count_words, ContentItem, ErrorKind, ProcessingStatus, Summary, DEFAULT_SUMMARY_TYPE,
};
use sift_fetch::Fetcher;
use uuid::Uuid;

use crate::dedupe::content_hash;
use crate::error::PipelineError;
use crate::store::{ContentStore, PendingQuery};
use crate::summarize::{Summarizer, SummaryInput};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Regenerate the summary even if one already exists.
    pub force_resummarize: bool,
    /// Re-fetch the transcript even if text is already stored.
    pub force_retranscribe: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingResult {
    pub content_id: Uuid,
    pub success: bool,
    pub transcribed: bool,
    pub summarized: bool,
    /// Status the item was left in; `None` when it was never touched.
    pub status: Option<ProcessingStatus>,
    pub error: Option<ProcessingFailure>,
}

impl ProcessingResult {
    fn untouched(content_id: Uuid, kind: ErrorKind, message: String) -> Self {
        Self {
            content_id,
            success: false,
            transcribed: false,
            summarized: false,
            status: None,
            error: Some(ProcessingFailure { kind, message }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub min_words_article: usize,
    /// Conversational transcripts are less dense, so their floor is higher.
    pub min_words_transcript: usize,
    pub max_attempts: i32,
    /// Pause between items in a batch.
    pub batch_delay: Duration,
}

impl ProcessorConfig {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        Self {
            min_words_article: config.min_words_article,
            min_words_transcript: config.min_words_transcript,
            max_attempts: config.max_item_attempts,
            batch_delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

#[derive(Debug, Default)]
struct Progress {
    transcribed: bool,
    summarized: bool,
}

pub struct Processor {
    store: Arc<dyn ContentStore>,
    fetcher: Arc<dyn Fetcher>,
    summarizer: Arc<Summarizer>,
    config: ProcessorConfig,
}

impl Processor {
    #[must_use]
    pub fn new(
        store: Arc<dyn ContentStore>,
        fetcher: Arc<dyn Fetcher>,
        summarizer: Arc<Summarizer>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            summarizer,
            config,
        }
    }

    #[must_use]
    pub fn summarizer(&self) -> &Summarizer {
        &self.summarizer
    }

    /// Drives one item to a terminal or retryable status. Never returns an
    /// error: every failure is recorded on the item and in the result.
    pub async fn process_item(
        &self,
        content_id: Uuid,
        options: ProcessOptions,
    ) -> ProcessingResult {
        let mut progress = Progress::default();
        match self.run(content_id, options, &mut progress).await {
            Ok(status) => ProcessingResult {
                content_id,
                success: true,
                transcribed: progress.transcribed,
                summarized: progress.summarized,
                status: Some(status),
                error: None,
            },
            Err(err @ PipelineError::ItemNotFound(_)) => {
                tracing::warn!(%content_id, "cannot process unknown content item");
                ProcessingResult::untouched(content_id, err.kind(), err.to_string())
            }
            Err(err @ PipelineError::AlreadyProcessing(_)) => {
                tracing::info!(%content_id, "item claimed by another run; leaving it alone");
                ProcessingResult::untouched(content_id, err.kind(), err.to_string())
            }
            Err(err) => {
                let kind = err.kind();
                let status = kind.processing_status();
                let message = err.to_string();
                if let Err(store_err) = self
                    .store
                    .set_status(content_id, status, Some(&message))
                    .await
                {
                    tracing::error!(
                        %content_id,
                        error = %store_err,
                        "failed to record processing failure"
                    );
                }
                tracing::warn!(
                    %content_id,
                    kind = %kind,
                    status = %status,
                    error = %message,
                    "processing failed"
                );
                ProcessingResult {
                    content_id,
                    success: false,
                    transcribed: progress.transcribed,
                    summarized: progress.summarized,
                    status: Some(status),
                    error: Some(ProcessingFailure { kind, message }),
                }
            }
        }
    }

    async fn run(
        &self,
        content_id: Uuid,
        options: ProcessOptions,
        progress: &mut Progress,
    ) -> Result<ProcessingStatus, PipelineError> {
        let item = self
            .store
            .get_item(content_id)
            .await?
            .ok_or(PipelineError::ItemNotFound(content_id))?;

        let has_summary = self
            .store
            .get_summary(content_id, DEFAULT_SUMMARY_TYPE)
            .await?
            .is_some();
        let forced = options.force_resummarize || options.force_retranscribe;
        if has_summary && !forced && item.processing_status == ProcessingStatus::Completed {
            tracing::debug!(%content_id, "summary already exists; nothing to do");
            return Ok(ProcessingStatus::Completed);
        }

        if !self.store.claim_for_processing(content_id).await? {
            return Err(PipelineError::AlreadyProcessing(content_id));
        }
        tracing::info!(
            %content_id,
            content_type = %item.content_type,
            "processing started"
        );

        let (text, text_changed) = self.acquire_text(&item, options, progress).await?;

        let words = usize::try_from(count_words(&text)).unwrap_or(0);
        let minimum = if item.content_type.is_transcript() {
            self.config.min_words_transcript
        } else {
            self.config.min_words_article
        };
        if words < minimum {
            let reason = format!("insufficient content: {words} words, minimum {minimum}");
            self.store
                .set_status(content_id, ProcessingStatus::Skipped, Some(&reason))
                .await?;
            tracing::info!(%content_id, words, minimum, "item skipped");
            return Ok(ProcessingStatus::Skipped);
        }

        // A re-fetched transcript identical to the stored text does not by
        // itself warrant a new summary.
        if has_summary
            && !options.force_resummarize
            && options.force_retranscribe
            && !text_changed
        {
            self.store
                .set_status(content_id, ProcessingStatus::Completed, None)
                .await?;
            return Ok(ProcessingStatus::Completed);
        }

        let outcome = self
            .summarizer
            .summarize(&SummaryInput {
                title: item.title.as_deref(),
                content_type: item.content_type,
                text: &text,
            })
            .await?;

        let summary = Summary {
            id: Uuid::new_v4(),
            content_id,
            summary_type: DEFAULT_SUMMARY_TYPE.to_string(),
            content: outcome.content,
            model: outcome.model,
            strategy: outcome.strategy.as_str().to_string(),
            input_tokens: outcome.input_tokens,
            output_tokens: outcome.output_tokens,
            cost_usd: outcome.cost_usd,
            latency_ms: outcome.latency_ms,
            degraded: outcome.degraded,
            created_at: Utc::now(),
        };
        self.store.upsert_summary(&summary).await?;
        progress.summarized = true;

        self.store
            .set_status(content_id, ProcessingStatus::Completed, None)
            .await?;
        tracing::info!(
            %content_id,
            strategy = %outcome.strategy,
            degraded = outcome.degraded,
            quality = summary.quality_score(),
            "item completed"
        );
        Ok(ProcessingStatus::Completed)
    }

    /// Returns the text to judge and summarize, fetching a transcript first
    /// when the item needs one. The flag reports whether stored text changed.
    async fn acquire_text(
        &self,
        item: &ContentItem,
        options: ProcessOptions,
        progress: &mut Progress,
    ) -> Result<(String, bool), PipelineError> {
        let needs_transcript = item.content_type.is_transcript()
            && (item.extracted_text.trim().is_empty() || options.force_retranscribe);
        let Some(url) = item.transcript_url.as_deref().filter(|_| needs_transcript) else {
            return Ok((item.extracted_text.clone(), false));
        };

        let transcript = self.fetcher.fetch_transcript(url).await?;
        let hash = content_hash(&transcript);
        let changed = hash != item.content_hash;
        if changed {
            self.store
                .update_text(item.id, &transcript, &hash, count_words(&transcript))
                .await?;
        }
        progress.transcribed = true;
        tracing::info!(
            content_id = %item.id,
            words = count_words(&transcript),
            changed,
            "transcript fetched"
        );
        Ok((transcript, changed))
    }

    /// Processes items one after another with a pause between them. Once
    /// the budget is exhausted the remaining items are left untouched.
    pub async fn process_batch(
        &self,
        content_ids: &[Uuid],
        options: ProcessOptions,
    ) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(content_ids.len());
        let mut budget_exhausted = false;
        for (i, &content_id) in content_ids.iter().enumerate() {
            if budget_exhausted {
                results.push(ProcessingResult::untouched(
                    content_id,
                    ErrorKind::BudgetExceeded,
                    "not attempted: budget exhausted earlier in this batch".to_string(),
                ));
                continue;
            }
            if i > 0 && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
            let result = self.process_item(content_id, options).await;
            budget_exhausted = result
                .error
                .as_ref()
                .is_some_and(|e| e.kind == ErrorKind::BudgetExceeded);
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(
            total = results.len(),
            succeeded,
            failed = results.len() - succeeded,
            "batch processed"
        );
        results
    }

    /// Ids of `pending` items plus `failed` items with attempts left,
    /// oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if the query fails.
    pub async fn list_pending(
        &self,
        limit: usize,
        source: Option<&str>,
    ) -> Result<Vec<Uuid>, PipelineError> {
        Ok(self
            .store
            .list_pending(&PendingQuery {
                limit,
                source: source.map(str::to_string),
                max_attempts: self.config.max_attempts,
            })
            .await?)
    }

    /// Lists pending items and processes them as one batch.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] if listing fails; per-item failures
    /// are reported in the results.
    pub async fn process_pending(
        &self,
        limit: usize,
        source: Option<&str>,
        options: ProcessOptions,
    ) -> Result<Vec<ProcessingResult>, PipelineError> {
        let ids = self.list_pending(limit, source).await?;
        Ok(self.process_batch(&ids, options).await)
    }
}
