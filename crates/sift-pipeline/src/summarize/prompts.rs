//! Prompt construction for every generation call the orchestrator makes.

use sift_core::ContentType;
use sift_llm::Message;

use crate::chunker::Chunk;

use super::parse::ChunkNotes;

const SUMMARY_SCHEMA: &str = r#"{
  "headline": "one line, at most 15 words",
  "tldr": "two or three sentences",
  "full_summary": "several paragraphs of narrative summary",
  "key_points": ["ordered list of the most important points"],
  "takeaways": [
    {
      "takeaway": "an insight the reader should keep",
      "context": "why it matters, grounded in the source",
      "action": "optional concrete next step, or null",
      "confidence": 0.0,
      "source_quote": "optional short verbatim quote, or null"
    }
  ],
  "related_ideas": [
    {
      "idea": "a related idea",
      "kind": "extension | counterpoint | application | question",
      "explanation": "optional"
    }
  ],
  "trivia": [{ "fact": "a notable detail", "context": "optional" }]
}"#;

const SPEAKERS_SCHEMA: &str =
    r#"Also include "speakers": [{ "name": "speaker name", "role": "host | guest | other" }]."#;

const CHUNK_NOTES_SCHEMA: &str = r#"{
  "summary": "what this section covers, in a short paragraph",
  "key_points": ["points made in this section"],
  "takeaways": [{ "takeaway": "...", "context": "...", "confidence": 0.0 }],
  "facts": ["notable details worth keeping"],
  "speakers": [{ "name": "...", "role": "..." }]
}"#;

fn system(role: &str) -> Message {
    Message::system(format!(
        "You are {role}. Respond with a single JSON object and nothing else. \
         Confidence values are numbers between 0 and 1."
    ))
}

fn describe(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Article => "article",
        ContentType::PodcastEpisode => "podcast episode transcript",
        ContentType::Video => "video transcript",
    }
}

fn title_line(title: Option<&str>) -> String {
    match title {
        Some(t) if !t.trim().is_empty() => format!("Title: {}\n\n", t.trim()),
        _ => String::new(),
    }
}

pub(crate) fn single_pass(
    title: Option<&str>,
    content_type: ContentType,
    text: &str,
) -> Vec<Message> {
    vec![
        system("an editor who writes faithful, structured summaries"),
        Message::user(format!(
            "Summarize the following {kind}. Use this JSON shape:\n{SUMMARY_SCHEMA}\n\n\
             {title}Content:\n{text}",
            kind = describe(content_type),
            title = title_line(title),
        )),
    ]
}

/// Single-pass prompt for conversational transcripts, with speaker
/// attribution.
pub(crate) fn podcast_single_pass(
    title: Option<&str>,
    content_type: ContentType,
    text: &str,
) -> Vec<Message> {
    vec![
        system("an editor who summarizes spoken conversations"),
        Message::user(format!(
            "Summarize the following {kind}. It is conversational: ignore filler, \
             ads, and small talk, and attribute claims to speakers where the \
             transcript makes that clear. Use this JSON shape:\n{SUMMARY_SCHEMA}\n\
             {SPEAKERS_SCHEMA}\n\n{title}Transcript:\n{text}",
            kind = describe(content_type),
            title = title_line(title),
        )),
    ]
}

pub(crate) fn chunk_notes(
    title: Option<&str>,
    content_type: ContentType,
    chunk: &Chunk,
    total: usize,
) -> Vec<Message> {
    let mut position = format!("This is section {} of {total}.", chunk.index + 1);
    if chunk.is_first {
        position.push_str(" It is the beginning of the document.");
    }
    if chunk.is_last {
        position.push_str(" It is the end of the document.");
    }
    if chunk.overlap_len > 0 {
        position.push_str(
            " The opening lines repeat the end of the previous section for context; \
             do not take notes on them twice.",
        );
    }
    vec![
        system("a careful note-taker preparing material for a later summary"),
        Message::user(format!(
            "Take notes on one section of a {kind}. {position}\n\
             Use this JSON shape:\n{CHUNK_NOTES_SCHEMA}\n\n{title}Section:\n{text}",
            kind = describe(content_type),
            title = title_line(title),
            text = chunk.text,
        )),
    ]
}

/// Final reduce step over every section's notes, in document order.
pub(crate) fn combine(
    title: Option<&str>,
    content_type: ContentType,
    notes: &[ChunkNotes],
) -> Vec<Message> {
    let mut body = String::new();
    for n in notes {
        body.push_str(&format!("## Section {}\n{}\n", n.index + 1, n.summary));
        for point in &n.key_points {
            body.push_str(&format!("- {point}\n"));
        }
        for t in &n.takeaways {
            body.push_str(&format!("* takeaway: {} ({})\n", t.takeaway, t.context));
        }
        for fact in &n.facts {
            body.push_str(&format!("* fact: {fact}\n"));
        }
        body.push('\n');
    }
    let speakers = if content_type.is_transcript() {
        format!("\n{SPEAKERS_SCHEMA}")
    } else {
        String::new()
    };
    vec![
        system("an editor who merges section notes into one coherent summary"),
        Message::user(format!(
            "The notes below cover every section of a {kind}, in order. Write one \
             summary of the whole work. Draw takeaways from across all sections, \
             not only the first. Use this JSON shape:\n{SUMMARY_SCHEMA}{speakers}\n\n\
             {title}Section notes:\n{body}",
            kind = describe(content_type),
            title = title_line(title),
        )),
    ]
}
