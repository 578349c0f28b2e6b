use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::content::ContentType;
use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Feed,
    Podcast,
}

impl SourceKind {
    /// Content type assigned to items ingested from this kind of source.
    #[must_use]
    pub fn content_type(self) -> ContentType {
        match self {
            SourceKind::Feed => ContentType::Article,
            SourceKind::Podcast => ContentType::PodcastEpisode,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::Podcast => write!(f, "podcast"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub slug: String,
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SourcesFile {
    pub sources: Vec<SourceConfig>,
}

impl SourcesFile {
    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }

    #[must_use]
    pub fn find(&self, slug: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.slug == slug)
    }
}

/// Load and validate the sources configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sources(path: &Path) -> Result<SourcesFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SourcesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    parse_sources(&content)
}

/// Parse and validate sources YAML.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML is malformed or fails validation.
pub fn parse_sources(content: &str) -> Result<SourcesFile, ConfigError> {
    let sources_file: SourcesFile = serde_yaml::from_str(content)?;
    validate_sources(&sources_file)?;
    Ok(sources_file)
}

fn validate_sources(sources_file: &SourcesFile) -> Result<(), ConfigError> {
    let mut seen_slugs = HashSet::new();

    for source in &sources_file.sources {
        if source.slug.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source slug must be non-empty".to_string(),
            ));
        }

        if !source
            .slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ConfigError::Validation(format!(
                "source slug '{}' must contain only lowercase letters, digits, and dashes",
                source.slug
            )));
        }

        if !(source.url.starts_with("https://") || source.url.starts_with("http://")) {
            return Err(ConfigError::Validation(format!(
                "source '{}' has non-http url '{}'",
                source.slug, source.url
            )));
        }

        if !seen_slugs.insert(source.slug.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source slug: '{}'",
                source.slug
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "sources_test.rs"]
mod tests;
