use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sift_core::estimate_tokens_by_words;
use sift_fetch::{retry_after_from_headers, Classifier, FetchError, GenerationClassifier};

use crate::types::{ChatRequest, ChatResponse, Completion, CompletionRequest, ResponseFormat};
use crate::Generator;

#[derive(Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl std::fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"[redacted]")
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl GenerationConfig {
    /// `None` when no API key is configured.
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Option<Self> {
        config.llm_api_key.as_ref().map(|api_key| Self {
            base_url: config.llm_base_url.clone(),
            api_key: api_key.clone(),
            timeout_secs: config.llm_timeout_secs,
            user_agent: config.fetch_user_agent.clone(),
        })
    }
}

/// OpenAI-compatible chat completions client.
pub struct GenerationClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GenerationClient {
    /// # Errors
    ///
    /// Returns [`FetchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(config: &GenerationConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
        })
    }
}

fn prompt_text(request: &CompletionRequest) -> String {
    request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[allow(clippy::cast_possible_wrap)]
fn estimated(text: &str) -> i64 {
    estimate_tokens_by_words(text) as i64
}

#[async_trait]
impl Generator for GenerationClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, FetchError> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            response_format: request
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let retry_after = retry_after_from_headers(response.headers());
        let text = response.text().await?;
        if let Some(err) = GenerationClassifier.classify(status, retry_after, &text) {
            return Err(err);
        }

        let envelope = serde_json::from_str::<ChatResponse>(&text)
            .ok()
            .and_then(|parsed| {
                let usage = parsed.usage;
                parsed.choices.into_iter().next().map(|choice| (choice, usage))
            });
        let Some((choice, usage)) = envelope else {
            // An unreadable envelope still carries text the summary parser can
            // degrade from; spend is estimated since usage is unknown.
            tracing::warn!(
                model = %request.model,
                endpoint = %self.endpoint,
                "completion envelope unreadable, passing raw body through"
            );
            return Ok(Completion {
                input_tokens: estimated(&prompt_text(request)),
                output_tokens: estimated(&text),
                text,
                finish_reason: None,
            });
        };
        let content = choice.message.content.unwrap_or_default();

        // Some compatible servers omit usage; fall back to the conservative
        // word-based estimate so spend is never under-recorded as zero.
        let (input_tokens, output_tokens) = match usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => {
                tracing::debug!(model = %request.model, "completion without usage, estimating");
                (estimated(&prompt_text(request)), estimated(&content))
            }
        };

        Ok(Completion {
            text: content,
            input_tokens,
            output_tokens,
            finish_reason: choice.finish_reason,
        })
    }
}
