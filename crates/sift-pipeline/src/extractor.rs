//! Plain-text extraction from fetched markup.
//!
//! The pipeline depends only on [`Extractor`]; [`BasicExtractor`] is a
//! small tag stripper that keeps paragraph breaks and reads a few `<meta>`
//! fields.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

static HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<head\b.*?</head\s*>").expect("valid regex"));
static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)\s*>")
        .expect("valid regex")
});
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br\s*/?|/\s*(p|div|li|h[1-6]|blockquote|section|article|tr))\s*>")
        .expect("valid regex")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("valid regex"));
static META: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<meta\s+[^>]*?(?:name|property)\s*=\s*["']([^"']+)["'][^>]*?content\s*=\s*["']([^"']*)["']"#,
    )
    .expect("valid regex")
});
static NUMERIC_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&#([xX]?)([0-9a-fA-F]+);").expect("valid regex"));
static PARAGRAPH_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    pub text: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

pub trait Extractor: Send + Sync {
    /// Returns cleaned plain text with paragraphs separated by blank lines.
    fn extract(&self, raw: &str) -> Extracted;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicExtractor;

impl Extractor for BasicExtractor {
    fn extract(&self, raw: &str) -> Extracted {
        let mut out = Extracted {
            title: TITLE
                .captures(raw)
                .map(|c| clean_inline(&c[1]))
                .filter(|t| !t.is_empty()),
            ..Extracted::default()
        };
        for caps in META.captures_iter(raw) {
            let value = clean_inline(&caps[2]);
            if value.is_empty() {
                continue;
            }
            match caps[1].to_ascii_lowercase().as_str() {
                "author" | "article:author" if out.author.is_none() => out.author = Some(value),
                "og:image" | "twitter:image" if out.image_url.is_none() => {
                    out.image_url = Some(value);
                }
                "article:published_time" | "date" if out.published_at.is_none() => {
                    out.published_at = DateTime::parse_from_rfc3339(&value)
                        .ok()
                        .map(|d| d.with_timezone(&Utc));
                }
                "og:title" if out.title.is_none() => out.title = Some(value),
                _ => {}
            }
        }

        let body = HEAD.replace_all(raw, "");
        let body = SCRIPT_OR_STYLE.replace_all(&body, "");
        let body = BLOCK_BREAK.replace_all(&body, "\n\n");
        let stripped = decode_entities(&strip_tags(&body));
        out.text = PARAGRAPH_GAP
            .split(&stripped)
            .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        out
    }
}

fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn clean_inline(fragment: &str) -> String {
    decode_entities(&strip_tags(fragment))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    let named = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&rsquo;", "\u{2019}")
        .replace("&lsquo;", "\u{2018}")
        .replace("&rdquo;", "\u{201d}")
        .replace("&ldquo;", "\u{201c}")
        .replace("&mdash;", "\u{2014}")
        .replace("&ndash;", "\u{2013}")
        .replace("&hellip;", "\u{2026}");
    let numeric = NUMERIC_ENTITY.replace_all(&named, |caps: &regex::Captures<'_>| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), |c| c.to_string())
    });
    // Last, so "&amp;lt;" decodes to "&lt;" rather than "<".
    numeric.replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>Hello &amp; welcome</title>
        <meta name="author" content="Jane Doe">
        <meta property="og:image" content="https://example.com/a.png">
        <meta property="article:published_time" content="2026-03-01T10:00:00Z">
        <style>p { color: red }</style>
        </head><body>
        <script>var x = 1;</script>
        <h1>Heading</h1>
        <p>First   paragraph with <b>bold</b> text.</p>
        <p>Second&nbsp;paragraph &#8212; with &#x27;quotes&#x27;.</p>
        </body></html>"#;

    #[test]
    fn extracts_text_with_paragraphs() {
        let out = BasicExtractor.extract(PAGE);
        assert_eq!(
            out.text,
            "Heading\n\nFirst paragraph with bold text.\n\nSecond paragraph \u{2014} with 'quotes'."
        );
    }

    #[test]
    fn extracts_metadata() {
        let out = BasicExtractor.extract(PAGE);
        assert_eq!(out.title.as_deref(), Some("Hello & welcome"));
        assert_eq!(out.author.as_deref(), Some("Jane Doe"));
        assert_eq!(out.image_url.as_deref(), Some("https://example.com/a.png"));
        assert!(out.published_at.is_some());
    }

    #[test]
    fn plain_text_passes_through() {
        let out = BasicExtractor.extract("just words\n\nand more");
        assert_eq!(out.text, "just words\n\nand more");
        assert!(out.title.is_none());
    }

    #[test]
    fn escaped_ampersand_decodes_once() {
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
    }
}
