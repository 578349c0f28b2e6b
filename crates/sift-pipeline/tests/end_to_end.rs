//! Full processing runs against the in-memory store, a scripted generator,
//! and a canned fetcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sift_core::{
    ContentType, ErrorKind, NewContentItem, ProcessingStatus, SourceConfig, SourceKind,
    DEFAULT_SUMMARY_TYPE, DEGRADED_HEADLINE,
};
use sift_fetch::{FeedEntry, FetchError, Fetcher, RetryPolicy};
use sift_llm::{Completion, CompletionRequest, Generator};
use sift_pipeline::{
    ingest_item, ingest_source, BasicExtractor, BudgetGuard, BudgetLimits, ContentStore,
    MemoryStore, ProcessOptions, Processor, ProcessorConfig, RateLimitConfig, RateLimiter,
    Summarizer, SummarizerConfig,
};
use uuid::Uuid;

const VALID_SUMMARY: &str = r#"{
    "headline": "A clear headline for the piece",
    "tldr": "A two sentence synopsis of what the piece says and why it matters.",
    "full_summary": "The full narrative summary of the piece.",
    "key_points": ["first point", "second point"],
    "takeaways": [{"takeaway": "combined insight", "context": "from the whole", "confidence": 0.8}],
    "related_ideas": [{"idea": "an extension", "kind": "extension"}],
    "trivia": ["a fact"]
}"#;

type Script = dyn Fn(&CompletionRequest) -> Result<String, FetchError> + Send + Sync;

struct ScriptedGenerator {
    calls: AtomicUsize,
    operations: Mutex<Vec<&'static str>>,
    latency: Duration,
    script: Box<Script>,
}

impl ScriptedGenerator {
    fn new(
        script: impl Fn(&CompletionRequest) -> Result<String, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            operations: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            script: Box::new(script),
        }
    }

    /// Each call sleeps this long before answering.
    fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn answering(text: &'static str) -> Self {
        Self::new(move |_| Ok(text.to_string()))
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn operations(&self) -> Vec<&'static str> {
        self.operations.lock().unwrap().clone()
    }
}

fn operation_of(request: &CompletionRequest) -> &'static str {
    let system = &request.messages[0].content;
    if system.contains("note-taker") {
        "chunk_notes"
    } else if system.contains("merges section notes") {
        "combine"
    } else {
        "summarize"
    }
}

/// Reads "This is section N of M" from a chunk-notes prompt.
fn section_of(request: &CompletionRequest) -> usize {
    let prompt = &request.messages[1].content;
    let marker = "This is section ";
    let start = prompt.find(marker).unwrap() + marker.len();
    prompt[start..]
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap()
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.operations.lock().unwrap().push(operation_of(request));
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let text = (self.script)(request)?;
        Ok(Completion {
            text,
            input_tokens: 1_000,
            output_tokens: 200,
            finish_reason: Some("stop".to_string()),
        })
    }
}

#[derive(Default)]
struct CannedFetcher {
    feeds: HashMap<String, Vec<FeedEntry>>,
    transcripts: HashMap<String, String>,
}

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedEntry>, FetchError> {
        self.feeds
            .get(url)
            .cloned()
            .ok_or(FetchError::ServerError { status: 503 })
    }

    async fn fetch_transcript(&self, url: &str) -> Result<String, FetchError> {
        self.transcripts
            .get(url)
            .cloned()
            .ok_or(FetchError::NoTranscript)
    }

    async fn fetch_audio(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::NoTranscript)
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    generator: Arc<ScriptedGenerator>,
    limiter: Arc<RateLimiter>,
    processor: Processor,
}

fn roomy_limits() -> RateLimitConfig {
    RateLimitConfig {
        requests_per_minute: 1_000,
        tokens_per_minute: 10_000_000,
        max_wait: Duration::from_secs(1),
    }
}

fn harness_with(
    generator: ScriptedGenerator,
    fetcher: CannedFetcher,
    daily_budget_usd: i64,
) -> Harness {
    harness_limited(generator, fetcher, daily_budget_usd, roomy_limits())
}

fn harness_limited(
    generator: ScriptedGenerator,
    fetcher: CannedFetcher,
    daily_budget_usd: i64,
    limits: RateLimitConfig,
) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let generator = Arc::new(generator);
    let limiter = Arc::new(RateLimiter::new(limits));
    let budget = Arc::new(BudgetGuard::new(BudgetLimits {
        daily_usd: Decimal::from(daily_budget_usd),
        monthly_usd: Decimal::from(10_000),
    }));
    let summarizer = Arc::new(Summarizer::new(
        generator.clone(),
        limiter.clone(),
        budget,
        store.clone(),
        SummarizerConfig {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            summary_max_tokens: 2_000,
            chunk_notes_max_tokens: 800,
            chunk_concurrency: 3,
            retry: RetryPolicy::new(2, Duration::from_secs(5), 0),
        },
    ));
    let processor = Processor::new(
        store.clone(),
        Arc::new(fetcher),
        summarizer,
        ProcessorConfig {
            min_words_article: 100,
            min_words_transcript: 300,
            max_attempts: 3,
            batch_delay: Duration::ZERO,
        },
    );
    Harness {
        store,
        generator,
        limiter,
        processor,
    }
}

fn harness(generator: ScriptedGenerator) -> Harness {
    harness_with(generator, CannedFetcher::default(), 1_000)
}

fn words(count: usize) -> String {
    (0..count)
        .map(|i| format!("word{}", i % 97))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Paragraphs of eight-character words, roughly `tokens` tokens in total.
fn long_text(tokens: usize) -> String {
    let paragraphs = tokens / 100;
    (0..paragraphs)
        .map(|p| {
            (0..50)
                .map(|w| format!("p{:03}w{:02}", p % 1000, w))
                .collect::<Vec<_>>()
                .join(" ")
                + "."
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn add_item(store: &MemoryStore, content_type: ContentType, text: &str) -> Uuid {
    ingest_item(
        store,
        &NewContentItem {
            source: "test".to_string(),
            external_id: Uuid::new_v4().to_string(),
            content_type: Some(content_type),
            title: Some("A title".to_string()),
            extracted_text: text.to_string(),
            ..NewContentItem::default()
        },
    )
    .await
    .unwrap()
    .id()
}

#[tokio::test]
async fn short_article_is_skipped_without_summary() {
    let h = harness(ScriptedGenerator::answering(VALID_SUMMARY));
    let id = add_item(&h.store, ContentType::Article, &words(50)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success);
    assert!(!result.summarized);
    assert_eq!(result.status, Some(ProcessingStatus::Skipped));
    assert_eq!(h.store.summary_count(), 0);
    assert_eq!(h.generator.calls(), 0);
    let item = h.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Skipped);
}

#[tokio::test]
async fn medium_article_is_summarized_in_one_call() {
    let h = harness(ScriptedGenerator::answering(VALID_SUMMARY));
    let id = add_item(&h.store, ContentType::Article, &words(3_000)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.summarized);
    assert_eq!(result.status, Some(ProcessingStatus::Completed));
    assert_eq!(h.generator.calls(), 1);
    assert_eq!(h.store.summary_count(), 1);
    let summary = h
        .store
        .get_summary(id, DEFAULT_SUMMARY_TYPE)
        .await
        .unwrap()
        .unwrap();
    assert!(!summary.content.headline.is_empty());
    assert!(!summary.content.tldr.is_empty());
    assert!(!summary.content.full_summary.is_empty());
    assert!(!summary.content.key_points.is_empty());
    assert_eq!(summary.strategy, "single_pass");
    assert!(!summary.degraded);
    assert!(summary.cost_usd > Decimal::ZERO);
    assert_eq!(h.store.usage_records().len(), 1);
}

#[tokio::test]
async fn long_transcript_is_chunked_then_combined_once() {
    let generator = ScriptedGenerator::new(|request| match operation_of(request) {
        "chunk_notes" => {
            let n = section_of(request);
            Ok(format!(
                r#"{{"summary": "notes for section {n}",
                    "key_points": ["point {n}"],
                    "takeaways": [{{"takeaway": "insight from section {n}", "context": "c", "confidence": 0.7}}]}}"#
            ))
        }
        _ => Ok(VALID_SUMMARY.to_string()),
    });
    let h = harness(generator);
    let id = add_item(&h.store, ContentType::PodcastEpisode, &long_text(40_000)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success, "{:?}", result.error);
    let ops = h.generator.operations();
    let chunk_calls = ops.iter().filter(|o| **o == "chunk_notes").count();
    assert!(chunk_calls > 1, "expected several chunks, got {chunk_calls}");
    assert_eq!(ops.iter().filter(|o| **o == "combine").count(), 1);
    assert_eq!(ops.last(), Some(&"combine"));

    let summary = h
        .store
        .get_summary(id, DEFAULT_SUMMARY_TYPE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.strategy, "long_form");
    let from_sections: Vec<&str> = summary
        .content
        .takeaways
        .iter()
        .map(|t| t.takeaway.as_str())
        .filter(|t| t.starts_with("insight from section"))
        .collect();
    assert!(from_sections.len() >= 2, "{from_sections:?}");
    assert_ne!(from_sections[0], from_sections[1]);
    assert_eq!(h.store.usage_records().len(), chunk_calls + 1);
}

#[tokio::test]
async fn malformed_response_yields_degraded_summary() {
    let h = harness(ScriptedGenerator::answering("Sorry, here is prose instead of JSON."));
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success);
    assert_eq!(result.status, Some(ProcessingStatus::Completed));
    let summary = h
        .store
        .get_summary(id, DEFAULT_SUMMARY_TYPE)
        .await
        .unwrap()
        .unwrap();
    assert!(summary.degraded);
    assert_eq!(summary.content.headline, DEGRADED_HEADLINE);
    assert!(summary.content.full_summary.contains("prose instead of JSON"));
}

#[tokio::test]
async fn exhausted_budget_fails_without_calling_generator() {
    let h = harness_with(
        ScriptedGenerator::answering(VALID_SUMMARY),
        CannedFetcher::default(),
        0,
    );
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::BudgetExceeded);
    assert_eq!(result.status, Some(ProcessingStatus::Failed));
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(h.store.summary_count(), 0);
    let item = h.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Failed);
    assert!(item.last_error.unwrap().contains("budget"));
}

#[tokio::test]
async fn budget_exhaustion_stops_the_rest_of_a_batch() {
    let h = harness_with(
        ScriptedGenerator::answering(VALID_SUMMARY),
        CannedFetcher::default(),
        0,
    );
    let first = add_item(&h.store, ContentType::Article, &words(500)).await;
    let second = add_item(&h.store, ContentType::Article, &words(500)).await;

    let results = h
        .processor
        .process_batch(&[first, second], ProcessOptions::default())
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[1].status, None);
    let untouched = h.store.get_item(second).await.unwrap().unwrap();
    assert_eq!(untouched.processing_status, ProcessingStatus::Pending);
}

#[tokio::test]
async fn completed_item_is_not_resummarized_unless_forced() {
    let h = harness(ScriptedGenerator::answering(VALID_SUMMARY));
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    h.processor.process_item(id, ProcessOptions::default()).await;
    let again = h.processor.process_item(id, ProcessOptions::default()).await;
    assert!(again.success);
    assert!(!again.summarized);
    assert_eq!(h.generator.calls(), 1);

    let forced = h
        .processor
        .process_item(
            id,
            ProcessOptions {
                force_resummarize: true,
                ..ProcessOptions::default()
            },
        )
        .await;
    assert!(forced.summarized);
    assert_eq!(h.generator.calls(), 2);
    assert_eq!(h.store.summary_count(), 1);
}

#[tokio::test]
async fn transient_generator_failure_is_retried() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let generator = ScriptedGenerator::new(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(FetchError::ServerError { status: 503 })
        } else {
            Ok(VALID_SUMMARY.to_string())
        }
    });
    let h = harness(generator);
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(h.generator.calls(), 2);
    assert_eq!(h.store.usage_records().len(), 1);
}

#[tokio::test]
async fn every_issued_attempt_is_recorded_by_the_limiter() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let generator = ScriptedGenerator::new(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(FetchError::ServerError { status: 503 })
        } else {
            Ok(VALID_SUMMARY.to_string())
        }
    });
    let h = harness(generator);
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success, "{:?}", result.error);
    let window = h.limiter.snapshot().await;
    assert_eq!(window.requests, 2);
    // The failed attempt is recorded with zero tokens.
    assert_eq!(window.tokens, 1_200);
}

#[tokio::test]
async fn request_larger_than_token_ceiling_fails_rate_limited() {
    let h = harness_limited(
        ScriptedGenerator::answering(VALID_SUMMARY),
        CannedFetcher::default(),
        1_000,
        RateLimitConfig {
            requests_per_minute: 1_000,
            tokens_per_minute: 1_000,
            max_wait: Duration::from_secs(1),
        },
    );
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::RateLimited);
    assert_eq!(result.status, Some(ProcessingStatus::Failed));
    assert_eq!(h.generator.calls(), 0);
    assert_eq!(h.limiter.snapshot().await.requests, 0);
    let item = h.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Failed);
    assert_eq!(item.retry_count, 1);
}

#[tokio::test]
async fn full_request_window_times_out_rate_limited() {
    let h = harness_limited(
        ScriptedGenerator::answering(VALID_SUMMARY),
        CannedFetcher::default(),
        1_000,
        RateLimitConfig {
            requests_per_minute: 1,
            tokens_per_minute: 10_000_000,
            max_wait: Duration::from_millis(50),
        },
    );
    let first = add_item(&h.store, ContentType::Article, &words(500)).await;
    let second = add_item(&h.store, ContentType::Article, &words(500)).await;

    let done = h.processor.process_item(first, ProcessOptions::default()).await;
    let starved = h.processor.process_item(second, ProcessOptions::default()).await;

    assert!(done.success, "{:?}", done.error);
    assert!(!starved.success);
    assert_eq!(starved.error.unwrap().kind, ErrorKind::RateLimited);
    assert_eq!(starved.status, Some(ProcessingStatus::Failed));
    assert_eq!(h.generator.calls(), 1);
    let item = h.store.get_item(second).await.unwrap().unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Failed);
}

#[tokio::test]
async fn concurrent_runs_on_one_item_generate_once() {
    let h = harness(
        ScriptedGenerator::answering(VALID_SUMMARY).with_latency(Duration::from_millis(50)),
    );
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let (a, b) = tokio::join!(
        h.processor.process_item(id, ProcessOptions::default()),
        h.processor.process_item(id, ProcessOptions::default()),
    );

    assert_eq!(h.generator.calls(), 1);
    assert_eq!(h.store.usage_records().len(), 1);
    assert_eq!(h.store.summary_count(), 1);
    let (winner, loser) = if a.summarized { (a, b) } else { (b, a) };
    assert!(winner.success, "{:?}", winner.error);
    assert_eq!(winner.status, Some(ProcessingStatus::Completed));
    assert!(!loser.success);
    assert!(!loser.summarized);
    assert_eq!(loser.status, None);
    assert!(loser.error.unwrap().message.contains("already being processed"));
    let item = h.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Completed);
    assert_eq!(item.retry_count, 0);
}

#[tokio::test]
async fn exhausted_retries_leave_item_failed_and_requeued() {
    let h = harness(ScriptedGenerator::new(|_| {
        Err(FetchError::ServerError { status: 502 })
    }));
    let id = add_item(&h.store, ContentType::Article, &words(500)).await;

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::TransientNetwork);
    assert_eq!(h.generator.calls(), 3);
    let item = h.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.processing_status, ProcessingStatus::Failed);
    assert_eq!(item.retry_count, 1);
    assert_eq!(h.processor.list_pending(10, None).await.unwrap(), vec![id]);
}

#[tokio::test]
async fn transcript_is_fetched_before_summarizing() {
    let mut fetcher = CannedFetcher::default();
    fetcher
        .transcripts
        .insert("https://t.example/1".to_string(), words(800));
    let h = harness_with(ScriptedGenerator::answering(VALID_SUMMARY), fetcher, 1_000);
    let id = ingest_item(
        h.store.as_ref(),
        &NewContentItem {
            source: "pod".to_string(),
            external_id: "ep-1".to_string(),
            content_type: Some(ContentType::Video),
            transcript_url: Some("https://t.example/1".to_string()),
            ..NewContentItem::default()
        },
    )
    .await
    .unwrap()
    .id();

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(result.success, "{:?}", result.error);
    assert!(result.transcribed);
    assert!(result.summarized);
    let item = h.store.get_item(id).await.unwrap().unwrap();
    assert_eq!(item.word_count, 800);
    let summary = h
        .store
        .get_summary(id, DEFAULT_SUMMARY_TYPE)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.strategy, "podcast_single_pass");
}

#[tokio::test]
async fn missing_transcript_fails_permanently() {
    let h = harness(ScriptedGenerator::answering(VALID_SUMMARY));
    let id = ingest_item(
        h.store.as_ref(),
        &NewContentItem {
            source: "pod".to_string(),
            external_id: "ep-2".to_string(),
            content_type: Some(ContentType::PodcastEpisode),
            transcript_url: Some("https://t.example/missing".to_string()),
            ..NewContentItem::default()
        },
    )
    .await
    .unwrap()
    .id();

    let result = h.processor.process_item(id, ProcessOptions::default()).await;

    assert!(!result.success);
    assert_eq!(result.error.unwrap().kind, ErrorKind::NoTranscript);
    assert_eq!(result.status, Some(ProcessingStatus::PermanentlyFailed));
    assert!(h.processor.list_pending(10, None).await.unwrap().is_empty());
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn unknown_item_reports_failure_without_panicking() {
    let h = harness(ScriptedGenerator::answering(VALID_SUMMARY));
    let result = h
        .processor
        .process_item(Uuid::new_v4(), ProcessOptions::default())
        .await;
    assert!(!result.success);
    assert_eq!(result.status, None);
    assert_eq!(result.error.unwrap().kind, ErrorKind::Storage);
}

#[tokio::test]
async fn ingest_then_process_pending() {
    let source = SourceConfig {
        slug: "example-blog".to_string(),
        name: "Example Blog".to_string(),
        kind: SourceKind::Feed,
        url: "https://example.com/feed.xml".to_string(),
        enabled: true,
    };
    let entry = |id: &str, text: String| FeedEntry {
        external_id: id.to_string(),
        title: Some(format!("Post {id}")),
        link: Some(format!("https://example.com/{id}")),
        content: Some(format!("<p>{text}</p>")),
        author: None,
        published_at: None,
        image_url: None,
        audio_url: None,
        audio_duration_secs: None,
    };
    let mut fetcher = CannedFetcher::default();
    fetcher.feeds.insert(
        source.url.clone(),
        vec![entry("a", words(400)), entry("b", words(20))],
    );
    let store = MemoryStore::new();

    let report = ingest_source(&fetcher, &store, &BasicExtractor, &source)
        .await
        .unwrap();
    assert_eq!(report.created, 2);

    let again = ingest_source(&fetcher, &store, &BasicExtractor, &source)
        .await
        .unwrap();
    assert_eq!(again.unchanged, 2);
    assert_eq!(again.created, 0);

    let h = harness(ScriptedGenerator::answering(VALID_SUMMARY));
    let report = ingest_source(&fetcher, h.store.as_ref(), &BasicExtractor, &source)
        .await
        .unwrap();
    assert_eq!(report.fetched, 2);
    let results = h
        .processor
        .process_pending(10, Some("example-blog"), ProcessOptions::default())
        .await
        .unwrap();
    let statuses: Vec<_> = results.iter().filter_map(|r| r.status).collect();
    assert!(statuses.contains(&ProcessingStatus::Completed));
    assert!(statuses.contains(&ProcessingStatus::Skipped));
    assert!(h.processor.list_pending(10, None).await.unwrap().is_empty());
}
