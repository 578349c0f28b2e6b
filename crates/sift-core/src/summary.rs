//! Structured summary output and its deterministic quality score.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary type written by the pipeline. One summary per (content, type).
pub const DEFAULT_SUMMARY_TYPE: &str = "full";

/// Headline used when the generation service's output could not be parsed.
pub const DEGRADED_HEADLINE: &str = "Summary unavailable: the generated response could not be parsed";

const DEGRADED_TLDR_CHARS: usize = 280;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Takeaway {
    pub takeaway: String,
    pub context: String,
    pub action: Option<String>,
    /// Always within `[0.0, 1.0]`.
    pub confidence: f32,
    pub source_quote: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedIdeaKind {
    Extension,
    Counterpoint,
    Application,
    Question,
}

impl RelatedIdeaKind {
    /// Case-insensitive parse; `None` for anything outside the fixed set.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "extension" => Some(RelatedIdeaKind::Extension),
            "counterpoint" => Some(RelatedIdeaKind::Counterpoint),
            "application" => Some(RelatedIdeaKind::Application),
            "question" => Some(RelatedIdeaKind::Question),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedIdea {
    pub idea: String,
    pub kind: RelatedIdeaKind,
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriviaFact {
    pub fact: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub role: Option<String>,
}

/// The schema-valid body of a summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryContent {
    pub headline: String,
    pub tldr: String,
    pub full_summary: String,
    pub key_points: Vec<String>,
    pub takeaways: Vec<Takeaway>,
    pub related_ideas: Vec<RelatedIdea>,
    pub trivia: Vec<TriviaFact>,
    /// Only populated for podcast and video content.
    pub speakers: Option<Vec<Speaker>>,
}

impl SummaryContent {
    /// Minimal but schema-valid content built from an unparseable response.
    #[must_use]
    pub fn degraded(raw: &str) -> Self {
        let raw = raw.trim();
        let tldr: String = if raw.is_empty() {
            "The generation service returned an empty response.".to_string()
        } else {
            raw.chars().take(DEGRADED_TLDR_CHARS).collect()
        };
        Self {
            headline: DEGRADED_HEADLINE.to_string(),
            tldr,
            full_summary: if raw.is_empty() {
                "No summary text was produced.".to_string()
            } else {
                raw.to_string()
            },
            ..Self::default()
        }
    }

    /// Weighted score in `[0.0, 1.0]` derived only from the fields above.
    ///
    /// | Signal                         | Weight |
    /// |--------------------------------|--------|
    /// | headline present (≥ 10 chars)  | 0.10   |
    /// | tldr present (≥ 40 chars)      | 0.15   |
    /// | full summary length / 1500     | 0.20   |
    /// | key points / 5                 | 0.15   |
    /// | takeaways / 3                  | 0.10   |
    /// | mean takeaway confidence       | 0.10   |
    /// | related ideas / 3              | 0.10   |
    /// | trivia / 2                     | 0.10   |
    #[must_use]
    pub fn quality_score(&self) -> f32 {
        fn ratio(count: usize, target: usize) -> f64 {
            #[allow(clippy::cast_precision_loss)]
            let r = count as f64 / target as f64;
            r.min(1.0)
        }

        let mut score = 0.0_f64;
        if self.headline.trim().chars().count() >= 10 {
            score += 0.10;
        }
        if self.tldr.trim().chars().count() >= 40 {
            score += 0.15;
        }
        score += 0.20 * ratio(self.full_summary.trim().chars().count(), 1_500);
        score += 0.15 * ratio(self.key_points.len(), 5);
        score += 0.10 * ratio(self.takeaways.len(), 3);
        if !self.takeaways.is_empty() {
            let sum: f64 = self
                .takeaways
                .iter()
                .map(|t| f64::from(t.confidence.clamp(0.0, 1.0)))
                .sum();
            #[allow(clippy::cast_precision_loss)]
            let mean = sum / self.takeaways.len() as f64;
            score += 0.10 * mean;
        }
        score += 0.10 * ratio(self.related_ideas.len(), 3);
        score += 0.10 * ratio(self.trivia.len(), 2);

        #[allow(clippy::cast_possible_truncation)]
        let rounded = ((score.clamp(0.0, 1.0) * 1_000.0).round() / 1_000.0) as f32;
        rounded
    }
}

/// A persisted summary row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: Uuid,
    pub content_id: Uuid,
    pub summary_type: String,
    #[serde(flatten)]
    pub content: SummaryContent,
    pub model: String,
    /// Strategy label, e.g. `single_pass` or `chunk_and_combine`.
    pub strategy: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: Decimal,
    pub latency_ms: i64,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    #[must_use]
    pub fn quality_score(&self) -> f32 {
        self.content.quality_score()
    }
}
