//! Summarization orchestrator: strategy selection, the budget/rate/retry
//! gate around every generation call, and map-then-reduce for long text.

mod parse;
mod prompts;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt, TryStreamExt};
use rust_decimal::Decimal;
use sift_core::{estimate_tokens, estimate_tokens_by_words, ContentType, Speaker, SummaryContent};
use sift_fetch::{perform, RetryPolicy};
use sift_llm::{Completion, CompletionRequest, Generator, Message};

use crate::budget::{estimate_cost, BudgetGuard};
use crate::chunker::{chunk, ChunkOptions};
use crate::error::PipelineError;
use crate::rate_limiter::RateLimiter;
use crate::store::ContentStore;

use parse::ChunkNotes;

/// Articles up to this estimate are summarized in one call.
pub const SINGLE_PASS_MAX_TOKENS: usize = 8_000;
/// Above this estimate every content type goes through long-form chunking.
pub const LONG_FORM_THRESHOLD_TOKENS: usize = 30_000;

const MIN_TAKEAWAYS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SinglePass,
    /// Single pass with the conversational prompt and speaker extraction.
    PodcastSinglePass,
    ChunkAndCombine,
    LongForm,
}

impl Strategy {
    #[must_use]
    pub fn select(content_type: ContentType, estimated_tokens: usize) -> Self {
        if estimated_tokens > LONG_FORM_THRESHOLD_TOKENS {
            Strategy::LongForm
        } else if content_type.is_transcript() {
            Strategy::PodcastSinglePass
        } else if estimated_tokens > SINGLE_PASS_MAX_TOKENS {
            Strategy::ChunkAndCombine
        } else {
            Strategy::SinglePass
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::SinglePass => "single_pass",
            Strategy::PodcastSinglePass => "podcast_single_pass",
            Strategy::ChunkAndCombine => "chunk_and_combine",
            Strategy::LongForm => "long_form",
        }
    }

    /// Chunking parameters, or `None` for single-call strategies.
    #[must_use]
    pub fn chunk_options(self) -> Option<ChunkOptions> {
        match self {
            Strategy::SinglePass | Strategy::PodcastSinglePass => None,
            Strategy::ChunkAndCombine => Some(ChunkOptions {
                max_tokens: 6_000,
                overlap_tokens: 200,
                preserve_paragraphs: true,
            }),
            Strategy::LongForm => Some(ChunkOptions {
                max_tokens: 12_000,
                overlap_tokens: 300,
                preserve_paragraphs: true,
            }),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    pub model: String,
    pub temperature: f32,
    pub summary_max_tokens: u32,
    pub chunk_notes_max_tokens: u32,
    /// Chunk-notes calls in flight at once for a single item.
    pub chunk_concurrency: usize,
    /// Attempt timeout covers the capacity wait plus the request itself.
    pub retry: RetryPolicy,
}

impl SummarizerConfig {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        let attempt_timeout = Duration::from_secs(config.llm_timeout_secs)
            + Duration::from_secs(config.rate_max_wait_secs);
        Self {
            model: config.llm_model.clone(),
            temperature: 0.3,
            summary_max_tokens: 2_000,
            chunk_notes_max_tokens: 800,
            chunk_concurrency: 3,
            retry: RetryPolicy::new(
                config.llm_max_retries,
                attempt_timeout,
                config.fetch_backoff_base_ms,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SummaryInput<'a> {
    pub title: Option<&'a str>,
    pub content_type: ContentType,
    pub text: &'a str,
}

#[derive(Debug, Clone)]
pub struct SummaryOutcome {
    pub content: SummaryContent,
    pub degraded: bool,
    pub strategy: Strategy,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: Decimal,
    pub latency_ms: i64,
    pub chunk_count: usize,
    pub generation_calls: usize,
}

#[derive(Debug, Default)]
struct Tally {
    calls: usize,
    input_tokens: i64,
    output_tokens: i64,
    cost_usd: Decimal,
}

impl Tally {
    fn add(&mut self, generated: &Generated) {
        self.calls += 1;
        self.input_tokens += generated.completion.input_tokens;
        self.output_tokens += generated.completion.output_tokens;
        self.cost_usd += generated.cost_usd;
    }
}

struct Generated {
    completion: Completion,
    cost_usd: Decimal,
}

pub struct Summarizer {
    generator: Arc<dyn Generator>,
    limiter: Arc<RateLimiter>,
    budget: Arc<BudgetGuard>,
    store: Arc<dyn ContentStore>,
    config: SummarizerConfig,
}

impl Summarizer {
    #[must_use]
    pub fn new(
        generator: Arc<dyn Generator>,
        limiter: Arc<RateLimiter>,
        budget: Arc<BudgetGuard>,
        store: Arc<dyn ContentStore>,
        config: SummarizerConfig,
    ) -> Self {
        Self {
            generator,
            limiter,
            budget,
            store,
            config,
        }
    }

    #[must_use]
    pub fn budget(&self) -> &BudgetGuard {
        &self.budget
    }

    /// Summarizes `input` with the strategy its size and type call for.
    /// Malformed responses yield a degraded outcome rather than an error.
    ///
    /// # Errors
    ///
    /// [`PipelineError::BudgetExceeded`] when a call would overspend, or
    /// [`PipelineError::Fetch`] when a call fails after its retries.
    pub async fn summarize(
        &self,
        input: &SummaryInput<'_>,
    ) -> Result<SummaryOutcome, PipelineError> {
        let started = Instant::now();
        let strategy = Strategy::select(input.content_type, estimate_tokens(input.text));
        let include_speakers = input.content_type.is_transcript();
        let mut tally = Tally::default();

        let (content, degraded, chunk_count) = match strategy.chunk_options() {
            None => {
                let messages = if strategy == Strategy::PodcastSinglePass {
                    prompts::podcast_single_pass(input.title, input.content_type, input.text)
                } else {
                    prompts::single_pass(input.title, input.content_type, input.text)
                };
                let generated = self
                    .generate("summarize", messages, self.config.summary_max_tokens)
                    .await?;
                tally.add(&generated);
                let parsed = parse::parse_summary(&generated.completion.text, include_speakers);
                (parsed.content, parsed.degraded, 1)
            }
            Some(options) => {
                self.chunk_and_combine(input, &options, include_speakers, &mut tally)
                    .await?
            }
        };

        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        tracing::info!(
            strategy = %strategy,
            chunks = chunk_count,
            calls = tally.calls,
            cost = %tally.cost_usd,
            degraded,
            latency_ms,
            "summary generated"
        );
        Ok(SummaryOutcome {
            content,
            degraded,
            strategy,
            model: self.config.model.clone(),
            input_tokens: tally.input_tokens,
            output_tokens: tally.output_tokens,
            cost_usd: tally.cost_usd,
            latency_ms,
            chunk_count,
            generation_calls: tally.calls,
        })
    }

    async fn chunk_and_combine(
        &self,
        input: &SummaryInput<'_>,
        options: &ChunkOptions,
        include_speakers: bool,
        tally: &mut Tally,
    ) -> Result<(SummaryContent, bool, usize), PipelineError> {
        let chunks = chunk(input.text, options);
        let total = chunks.len();
        tracing::debug!(chunks = total, max_tokens = options.max_tokens, "text chunked");

        // Order is preserved; the combine call waits for every section.
        let noted: Vec<(ChunkNotes, Generated)> = stream::iter(chunks.into_iter().map(|c| async move {
            let messages = prompts::chunk_notes(input.title, input.content_type, &c, total);
            let generated = self
                .generate("chunk_notes", messages, self.config.chunk_notes_max_tokens)
                .await?;
            let notes = parse::parse_chunk_notes(&generated.completion.text, c.index);
            Ok::<_, PipelineError>((notes, generated))
        }))
        .buffered(self.config.chunk_concurrency.max(1))
        .try_collect()
        .await?;

        let mut notes = Vec::with_capacity(noted.len());
        for (n, generated) in noted {
            tally.add(&generated);
            notes.push(n);
        }

        let messages = prompts::combine(input.title, input.content_type, &notes);
        let generated = self
            .generate("combine", messages, self.config.summary_max_tokens)
            .await?;
        tally.add(&generated);

        let mut parsed = parse::parse_summary(&generated.completion.text, include_speakers);
        if !parsed.degraded {
            backfill_takeaways(&mut parsed.content, &notes);
            if include_speakers {
                merge_speakers(&mut parsed.content, &notes);
            }
        }
        Ok((parsed.content, parsed.degraded, total))
    }

    /// One generation call behind the budget check, the rate limiter, and
    /// the shared retry loop. Usage is recorded only for completed calls.
    async fn generate(
        &self,
        operation: &'static str,
        messages: Vec<Message>,
        max_tokens: u32,
    ) -> Result<Generated, PipelineError> {
        let request = CompletionRequest {
            messages,
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_tokens,
            json_mode: true,
        };
        let prompt_tokens: usize = request
            .messages
            .iter()
            .map(|m| estimate_tokens_by_words(&m.content))
            .sum();
        let reserve = prompt_tokens + max_tokens as usize;
        let estimated_cost = estimate_cost(
            &request.model,
            i64::try_from(prompt_tokens).unwrap_or(i64::MAX),
            i64::from(max_tokens),
        );
        self.budget.check(estimated_cost).await?;

        let limiter = &self.limiter;
        let generator = &self.generator;
        let request_ref = &request;
        let completion = perform(&self.config.retry, operation, || async move {
            limiter.await_capacity(reserve).await?;
            let result = generator.complete(request_ref).await;
            let used = result.as_ref().map_or(0, |c| {
                usize::try_from(c.input_tokens + c.output_tokens).unwrap_or(0)
            });
            limiter.record_request(used).await;
            result
        })
        .await?;

        let record = self
            .budget
            .record_usage(
                &request.model,
                completion.input_tokens,
                completion.output_tokens,
                operation,
            )
            .await;
        if let Err(e) = self.store.record_usage(&record).await {
            tracing::warn!(error = %e, operation, "failed to persist usage record");
        }
        Ok(Generated {
            completion,
            cost_usd: record.cost_usd,
        })
    }
}

/// Tops takeaways up to [`MIN_TAKEAWAYS`] from the section notes, taking
/// one per section per round so later sections are represented.
fn backfill_takeaways(content: &mut SummaryContent, notes: &[ChunkNotes]) {
    let mut round = 0;
    while content.takeaways.len() < MIN_TAKEAWAYS {
        let mut any = false;
        for n in notes {
            let Some(candidate) = n.takeaways.get(round) else {
                continue;
            };
            any = true;
            if content.takeaways.len() >= MIN_TAKEAWAYS {
                break;
            }
            if !content
                .takeaways
                .iter()
                .any(|t| t.takeaway.eq_ignore_ascii_case(&candidate.takeaway))
            {
                content.takeaways.push(candidate.clone());
            }
        }
        if !any {
            break;
        }
        round += 1;
    }
}

fn merge_speakers(content: &mut SummaryContent, notes: &[ChunkNotes]) {
    let speakers: &mut Vec<Speaker> = content.speakers.get_or_insert_with(Vec::new);
    for s in notes.iter().flat_map(|n| &n.speakers) {
        if !speakers.iter().any(|e| e.name.eq_ignore_ascii_case(&s.name)) {
            speakers.push(s.clone());
        }
    }
}
