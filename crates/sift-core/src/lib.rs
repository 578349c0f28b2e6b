//! Shared domain types and configuration for the sift content pipeline.

pub mod app_config;
pub mod config;
pub mod content;
pub mod error_kind;
pub mod sources;
pub mod summary;
pub mod tokens;
pub mod usage;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use content::{count_words, ContentItem, ContentType, NewContentItem, ProcessingStatus};
pub use error_kind::{ErrorKind, UnavailableReason};
pub use sources::{load_sources, parse_sources, SourceConfig, SourceKind, SourcesFile};
pub use summary::{
    RelatedIdea, RelatedIdeaKind, Speaker, Summary, SummaryContent, Takeaway, TriviaFact,
    DEFAULT_SUMMARY_TYPE, DEGRADED_HEADLINE,
};
pub use tokens::{estimate_tokens, estimate_tokens_by_words, tokens_for_chars};
pub use usage::UsageRecord;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sources file {path}: {source}")]
    SourcesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sources file: {0}")]
    SourcesFileParse(#[from] serde_yaml::Error),

    #[error("sources validation failed: {0}")]
    Validation(String),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    #[error("invalid processing status: {0}")]
    InvalidProcessingStatus(String),
}
