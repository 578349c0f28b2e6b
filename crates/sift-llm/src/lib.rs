//! Text-generation service client.
//!
//! [`Generator`] is the seam the pipeline depends on; [`GenerationClient`]
//! implements it against an OpenAI-compatible chat completions endpoint.
//! One call is one attempt: retries, rate limiting, and budget checks are
//! applied by the caller.

mod client;
mod types;

pub use client::{GenerationClient, GenerationConfig};
pub use types::{Completion, CompletionRequest, Message, Role};

use async_trait::async_trait;
use sift_fetch::FetchError;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Issues exactly one request.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] classified by
    /// [`sift_fetch::GenerationClassifier`].
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, FetchError>;
}
