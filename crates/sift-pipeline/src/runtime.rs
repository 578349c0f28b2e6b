//! Wiring of the production collaborators from [`AppConfig`].
//!
//! The rate limiter and budget guard are built once here and shared by
//! every summarization; nothing is a process-wide global.

use std::sync::Arc;

use sift_core::AppConfig;
use sift_fetch::{FetchError, Fetcher, FetcherConfig, HttpFetcher};
use sift_llm::{GenerationClient, GenerationConfig};
use thiserror::Error;

use crate::budget::{current_month_start, BudgetGuard, BudgetLimits};
use crate::extractor::{BasicExtractor, Extractor};
use crate::processor::{Processor, ProcessorConfig};
use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use crate::store::{ContentStore, StoreError};
use crate::summarize::{Summarizer, SummarizerConfig};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("SIFT_LLM_API_KEY is not set; it is required for processing")]
    MissingApiKey,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] FetchError),

    #[error("failed to load usage history: {0}")]
    Store(#[from] StoreError),
}

/// Everything a scheduler or command needs to ingest and process.
pub struct Pipeline {
    pub store: Arc<dyn ContentStore>,
    pub fetcher: Arc<dyn Fetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub processor: Arc<Processor>,
}

/// Budget guard seeded with this month's persisted usage.
///
/// # Errors
///
/// Returns [`StoreError`] if the usage history cannot be read.
pub async fn load_budget(
    config: &AppConfig,
    store: &dyn ContentStore,
) -> Result<BudgetGuard, StoreError> {
    let history = store.usage_since(current_month_start()).await?;
    tracing::debug!(records = history.len(), "budget ledger warmed from usage history");
    Ok(BudgetGuard::with_history(
        BudgetLimits::from_app_config(config),
        &history,
    ))
}

/// Builds the HTTP collaborators, shared limiter and budget, and the
/// processor over `store`.
///
/// # Errors
///
/// [`SetupError::MissingApiKey`] without a generation API key, or
/// [`SetupError::Http`] / [`SetupError::Store`] if a client or the budget
/// history cannot be set up.
pub async fn build_pipeline(
    config: &AppConfig,
    store: Arc<dyn ContentStore>,
) -> Result<Pipeline, SetupError> {
    let generation = GenerationConfig::from_app_config(config).ok_or(SetupError::MissingApiKey)?;
    let generator = Arc::new(GenerationClient::new(&generation)?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&FetcherConfig::from_app_config(
        config,
    ))?);

    let budget = Arc::new(load_budget(config, store.as_ref()).await?);
    let limiter = Arc::new(RateLimiter::new(RateLimitConfig::from_app_config(config)));
    let summarizer = Arc::new(Summarizer::new(
        generator,
        limiter,
        budget,
        Arc::clone(&store),
        SummarizerConfig::from_app_config(config),
    ));
    let processor = Arc::new(Processor::new(
        Arc::clone(&store),
        Arc::clone(&fetcher),
        summarizer,
        ProcessorConfig::from_app_config(config),
    ));

    Ok(Pipeline {
        store,
        fetcher,
        extractor: Arc::new(BasicExtractor),
        processor,
    })
}
