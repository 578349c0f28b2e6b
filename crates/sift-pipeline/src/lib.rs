//! The sift content processing pipeline.
//!
//! Items enter through [`ingest_source`] / [`ingest_item`], which dedupe on
//! a hash of the extracted text. [`Processor`] then drives each item through
//! transcript acquisition, the word-count floor, and summarization, where
//! every generation call passes the shared [`BudgetGuard`] and
//! [`RateLimiter`] and the common retry loop.

pub mod budget;
pub mod chunker;
pub mod dedupe;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod processor;
pub mod rate_limiter;
pub mod runtime;
pub mod store;
pub mod summarize;

pub use budget::{
    current_month_start, estimate_cost, model_price, BudgetGuard, BudgetLimits, BudgetUsage,
    ModelPrice,
};
pub use chunker::{chunk, Chunk, ChunkOptions};
pub use dedupe::{content_hash, ingest_item, IngestOutcome};
pub use error::{BudgetWindow, PipelineError};
pub use extractor::{BasicExtractor, Extracted, Extractor};
pub use ingest::{entry_to_item, ingest_source, IngestReport};
pub use processor::{
    ProcessOptions, ProcessingFailure, ProcessingResult, Processor, ProcessorConfig,
};
pub use rate_limiter::{RateLimitConfig, RateLimiter, RateSnapshot};
pub use runtime::{build_pipeline, load_budget, Pipeline, SetupError};
pub use store::{ContentStore, MemoryStore, PendingQuery, PgStore, StoreError};
pub use summarize::{
    Strategy, Summarizer, SummarizerConfig, SummaryInput, SummaryOutcome,
    LONG_FORM_THRESHOLD_TOKENS, SINGLE_PASS_MAX_TOKENS,
};
