//! Token-bounded, paragraph- and sentence-aware text splitting.
//!
//! Units are byte ranges of the input, so concatenating every chunk's
//! [`Chunk::core`] reproduces the input exactly. Sizing uses a running
//! character count converted with [`tokens_for_chars`], the same ratio the
//! overlap tail is measured with.

use std::sync::LazyLock;

use regex::Regex;
use sift_core::{estimate_tokens, tokens_for_chars};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("valid regex"));
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?…]+["'”’)\]]*\s+|\n+"#).expect("valid regex")
});
static WORD_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\S+").expect("valid regex"));

#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub max_tokens: usize,
    /// Size of the tail carried into the next chunk after a paragraph-level
    /// break. Clamped to half of `max_tokens`.
    pub overlap_tokens: usize,
    /// Accumulate whole paragraphs first; when false, sentences are the
    /// top-level unit.
    pub preserve_paragraphs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Overlap prefix followed by the chunk's own text.
    pub text: String,
    /// Byte length of the overlap prefix in `text`.
    pub overlap_len: usize,
    pub estimated_tokens: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl Chunk {
    /// The text this chunk contributes, without the overlap prefix.
    #[must_use]
    pub fn core(&self) -> &str {
        &self.text[self.overlap_len..]
    }

    #[must_use]
    pub fn overlap(&self) -> &str {
        &self.text[..self.overlap_len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Paragraph,
    Sentence,
    Word,
}

impl Level {
    fn finer(self) -> Option<Level> {
        match self {
            Level::Paragraph => Some(Level::Sentence),
            Level::Sentence => Some(Level::Word),
            Level::Word => None,
        }
    }

    /// Separator that ends a unit of this level.
    fn separator(self) -> &'static Regex {
        match self {
            Level::Paragraph => &PARAGRAPH_BREAK,
            Level::Sentence => &SENTENCE_END,
            Level::Word => &WORD_GAP,
        }
    }
}

/// Splits `text[start..end]` into contiguous units, each ending after a
/// separator match (the last one may have none).
fn split_after(separator: &Regex, text: &str, start: usize, end: usize) -> Vec<(usize, usize)> {
    let slice = &text[start..end];
    let mut units = Vec::new();
    let mut last = 0;
    for m in separator.find_iter(slice) {
        if m.end() > last {
            units.push((start + last, start + m.end()));
            last = m.end();
        }
    }
    if last < slice.len() {
        units.push((start + last, end));
    }
    units
}

/// The last `overlap_tokens` worth of whole words of `core`.
fn overlap_tail(core: &str, overlap_tokens: usize) -> String {
    if overlap_tokens == 0 {
        return String::new();
    }
    let starts: Vec<usize> = WORD.find_iter(core).map(|m| m.start()).collect();
    let mut from = core.len();
    for &start in starts.iter().rev() {
        if tokens_for_chars(core[start..].chars().count()) > overlap_tokens {
            break;
        }
        from = start;
    }
    core[from..].to_string()
}

struct Builder<'a> {
    text: &'a str,
    max_tokens: usize,
    overlap_tokens: usize,
    top: Level,
    drafts: Vec<(String, usize, usize)>,
    overlap: String,
    overlap_chars: usize,
    core: Option<(usize, usize)>,
    core_chars: usize,
}

impl Builder<'_> {
    fn fits(&self, chars: usize) -> bool {
        tokens_for_chars(self.overlap_chars + self.core_chars + chars) <= self.max_tokens
    }

    fn extend(&mut self, start: usize, end: usize, chars: usize) {
        self.core = Some(match self.core {
            Some((core_start, _)) => (core_start, end),
            None => (start, end),
        });
        self.core_chars += chars;
    }

    fn clear_overlap(&mut self) {
        self.overlap.clear();
        self.overlap_chars = 0;
    }

    fn flush(&mut self, carry_overlap: bool) {
        let Some((start, end)) = self.core.take() else {
            return;
        };
        self.drafts
            .push((std::mem::take(&mut self.overlap), start, end));
        self.core_chars = 0;
        self.overlap_chars = 0;
        if carry_overlap {
            self.overlap = overlap_tail(&self.text[start..end], self.overlap_tokens);
            self.overlap_chars = self.overlap.chars().count();
        }
    }

    fn push(&mut self, start: usize, end: usize, level: Level) {
        let chars = self.text[start..end].chars().count();
        if self.fits(chars) {
            self.extend(start, end, chars);
            return;
        }
        if self.core.is_some() {
            self.flush(level == self.top);
            if self.fits(chars) {
                self.extend(start, end, chars);
                return;
            }
        }
        if !self.overlap.is_empty() && tokens_for_chars(chars) <= self.max_tokens {
            self.clear_overlap();
            self.extend(start, end, chars);
            return;
        }
        match level.finer() {
            Some(finer) => {
                for (s, e) in split_after(finer.separator(), self.text, start, end) {
                    self.push(s, e, finer);
                }
            }
            None => {
                // A single word larger than the ceiling.
                self.clear_overlap();
                self.extend(start, end, chars);
                self.flush(false);
            }
        }
    }
}

/// Splits `text` into ordered chunks of at most `max_tokens` estimated
/// tokens each. A lone word larger than the ceiling becomes an oversized
/// singleton chunk.
#[must_use]
pub fn chunk(text: &str, options: &ChunkOptions) -> Vec<Chunk> {
    let max_tokens = options.max_tokens.max(1);
    if estimate_tokens(text) <= max_tokens {
        return vec![Chunk {
            index: 0,
            text: text.to_string(),
            overlap_len: 0,
            estimated_tokens: estimate_tokens(text),
            is_first: true,
            is_last: true,
        }];
    }

    let top = if options.preserve_paragraphs {
        Level::Paragraph
    } else {
        Level::Sentence
    };
    let mut builder = Builder {
        text,
        max_tokens,
        overlap_tokens: options.overlap_tokens.min(max_tokens / 2),
        top,
        drafts: Vec::new(),
        overlap: String::new(),
        overlap_chars: 0,
        core: None,
        core_chars: 0,
    };
    for (start, end) in split_after(top.separator(), text, 0, text.len()) {
        builder.push(start, end, top);
    }
    builder.flush(false);

    let count = builder.drafts.len();
    builder
        .drafts
        .into_iter()
        .enumerate()
        .map(|(index, (overlap, start, end))| {
            let overlap_len = overlap.len();
            let mut chunk_text = overlap;
            chunk_text.push_str(&text[start..end]);
            Chunk {
                index,
                estimated_tokens: estimate_tokens(&chunk_text),
                text: chunk_text,
                overlap_len,
                is_first: index == 0,
                is_last: index + 1 == count,
            }
        })
        .collect()
}
