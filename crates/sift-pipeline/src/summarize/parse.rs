//! Parsing and repair of generation-service responses.
//!
//! Responses are decoded into loosely typed intermediates, then validated
//! entry by entry: malformed list entries are dropped, confidences clamped,
//! and related-idea kinds checked against the fixed set. A response missing
//! any required text field becomes [`SummaryContent::degraded`].

use serde::Deserialize;
use serde_json::{Map, Value};
use sift_core::{RelatedIdea, RelatedIdeaKind, Speaker, SummaryContent, Takeaway, TriviaFact};

const DEFAULT_CONFIDENCE: f32 = 0.5;

#[derive(Debug)]
pub(crate) struct ParsedSummary {
    pub content: SummaryContent,
    pub degraded: bool,
}

/// Per-section notes from the map phase of chunk-and-combine.
#[derive(Debug, Clone, Default)]
pub(crate) struct ChunkNotes {
    pub index: usize,
    pub summary: String,
    pub key_points: Vec<String>,
    pub takeaways: Vec<Takeaway>,
    pub facts: Vec<String>,
    pub speakers: Vec<Speaker>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSummary {
    headline: Option<String>,
    #[serde(alias = "summary_short", alias = "synopsis")]
    tldr: Option<String>,
    #[serde(alias = "fullSummary")]
    full_summary: Option<String>,
    #[serde(alias = "keyPoints")]
    key_points: Value,
    #[serde(alias = "key_takeaways", alias = "keyTakeaways")]
    takeaways: Value,
    #[serde(alias = "relatedIdeas")]
    related_ideas: Value,
    #[serde(alias = "trivia_facts")]
    trivia: Value,
    speakers: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawChunkNotes {
    summary: Option<String>,
    #[serde(alias = "keyPoints")]
    key_points: Value,
    #[serde(alias = "key_takeaways", alias = "keyTakeaways")]
    takeaways: Value,
    #[serde(alias = "notable_facts", alias = "trivia")]
    facts: Value,
    speakers: Value,
}

/// Strips Markdown code fences and any prose around the outermost JSON
/// object.
fn json_object(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// First non-empty string among `keys`.
fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| object.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn owned_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    field(object, keys).map(str::to_string)
}

#[allow(clippy::cast_possible_truncation)]
fn confidence(value: Option<&Value>) -> f32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(c) if c.is_finite() => (c as f32).clamp(0.0, 1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

/// Array elements of `value`; `null` or any non-array yields nothing.
fn list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

fn text_entries(values: Value, keys: &[&str]) -> Vec<String> {
    list(values)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(o) => owned_field(&o, keys),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .collect()
}

fn takeaways(values: Value) -> Vec<Takeaway> {
    list(values)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(Takeaway {
                takeaway: s.trim().to_string(),
                context: String::new(),
                action: None,
                confidence: DEFAULT_CONFIDENCE,
                source_quote: None,
            }),
            Value::Object(o) => {
                let Some(takeaway) = owned_field(&o, &["takeaway", "text", "title"]) else {
                    tracing::warn!("dropping takeaway without text");
                    return None;
                };
                Some(Takeaway {
                    takeaway,
                    context: owned_field(&o, &["context", "explanation"]).unwrap_or_default(),
                    action: owned_field(&o, &["action"]),
                    confidence: confidence(o.get("confidence")),
                    source_quote: owned_field(&o, &["source_quote", "sourceQuote", "quote"]),
                })
            }
            _ => None,
        })
        .collect()
}

fn related_ideas(values: Value) -> Vec<RelatedIdea> {
    list(values)
        .into_iter()
        .filter_map(|v| {
            let Value::Object(o) = v else { return None };
            let idea = owned_field(&o, &["idea", "text", "title"])?;
            let raw_kind = field(&o, &["kind", "type", "category"]).unwrap_or_default();
            let Some(kind) = RelatedIdeaKind::parse(raw_kind) else {
                tracing::warn!(kind = raw_kind, "dropping related idea with unknown kind");
                return None;
            };
            Some(RelatedIdea {
                idea,
                kind,
                explanation: owned_field(&o, &["explanation", "context"]),
            })
        })
        .collect()
}

fn trivia(values: Value) -> Vec<TriviaFact> {
    list(values)
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(TriviaFact {
                fact: s.trim().to_string(),
                context: None,
            }),
            Value::Object(o) => Some(TriviaFact {
                fact: owned_field(&o, &["fact", "text"])?,
                context: owned_field(&o, &["context"]),
            }),
            _ => None,
        })
        .collect()
}

fn speakers(values: Value) -> Vec<Speaker> {
    let mut out: Vec<Speaker> = Vec::new();
    for v in list(values) {
        let speaker = match v {
            Value::String(s) if !s.trim().is_empty() => Speaker {
                name: s.trim().to_string(),
                role: None,
            },
            Value::Object(o) => match owned_field(&o, &["name"]) {
                Some(name) => Speaker {
                    name,
                    role: owned_field(&o, &["role"]),
                },
                None => continue,
            },
            _ => continue,
        };
        if !out.iter().any(|s| s.name.eq_ignore_ascii_case(&speaker.name)) {
            out.push(speaker);
        }
    }
    out
}

/// Parses a summary response. Never fails: anything that does not yield
/// a headline, tldr and full summary comes back degraded.
pub(crate) fn parse_summary(raw: &str, include_speakers: bool) -> ParsedSummary {
    let decoded = json_object(raw).map(serde_json::from_str::<RawSummary>);
    let parsed = match decoded {
        Some(Ok(parsed)) => parsed,
        Some(Err(e)) => {
            tracing::warn!(error = %e, "summary response is not valid JSON; degrading");
            return degraded(raw);
        }
        None => {
            tracing::warn!("summary response has no JSON object; degrading");
            return degraded(raw);
        }
    };

    let (Some(headline), Some(tldr), Some(full_summary)) = (
        non_empty(parsed.headline),
        non_empty(parsed.tldr),
        non_empty(parsed.full_summary),
    ) else {
        tracing::warn!("summary response is missing required fields; degrading");
        return degraded(raw);
    };

    let speakers = if include_speakers {
        Some(speakers(parsed.speakers))
    } else {
        None
    };
    ParsedSummary {
        content: SummaryContent {
            headline,
            tldr,
            full_summary,
            key_points: text_entries(parsed.key_points, &["point", "text"]),
            takeaways: takeaways(parsed.takeaways),
            related_ideas: related_ideas(parsed.related_ideas),
            trivia: trivia(parsed.trivia),
            speakers,
        },
        degraded: false,
    }
}

fn degraded(raw: &str) -> ParsedSummary {
    ParsedSummary {
        content: SummaryContent::degraded(raw),
        degraded: true,
    }
}

/// Parses one section's notes, falling back to the raw text as the
/// section summary.
pub(crate) fn parse_chunk_notes(raw: &str, index: usize) -> ChunkNotes {
    match json_object(raw).map(serde_json::from_str::<RawChunkNotes>) {
        Some(Ok(parsed)) => ChunkNotes {
            index,
            summary: non_empty(parsed.summary).unwrap_or_default(),
            key_points: text_entries(parsed.key_points, &["point", "text"]),
            takeaways: takeaways(parsed.takeaways),
            facts: text_entries(parsed.facts, &["fact", "text"]),
            speakers: speakers(parsed.speakers),
        },
        _ => {
            tracing::warn!(chunk = index, "chunk notes are not valid JSON; using raw text");
            ChunkNotes {
                index,
                summary: raw.trim().to_string(),
                ..ChunkNotes::default()
            }
        }
    }
}
