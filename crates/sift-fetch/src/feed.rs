//! RSS/Atom parsing into flat [`FeedEntry`] records.

use std::io::Cursor;

use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

use crate::error::FetchError;

/// One entry of a parsed feed, before extraction and deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    /// The entry's GUID, falling back to its link and then its title.
    pub external_id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    /// Full content when the feed carries it, otherwise the summary.
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub audio_url: Option<String>,
    pub audio_duration_secs: Option<i32>,
}

/// Parses feed bytes. Entries with no usable identifier are dropped.
///
/// # Errors
///
/// Returns [`FetchError::Malformed`] if the document is not a feed.
pub fn parse_feed(bytes: &[u8], context: &str) -> Result<Vec<FeedEntry>, FetchError> {
    let feed = parser::parse(Cursor::new(bytes)).map_err(|e| FetchError::Malformed {
        context: context.to_string(),
        reason: e.to_string(),
    })?;

    Ok(feed.entries.into_iter().filter_map(convert_entry).collect())
}

fn convert_entry(entry: Entry) -> Option<FeedEntry> {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty());
    let link = select_link(&entry);
    let external_id = [Some(entry.id.trim().to_string()), link.clone(), title.clone()]
        .into_iter()
        .flatten()
        .find(|id| !id.is_empty())?;

    let content = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
        .filter(|c| !c.trim().is_empty());
    let author = entry.authors.first().map(|p| p.name.clone());
    let (audio_url, audio_duration_secs) = select_audio(&entry);
    let image_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next();

    Some(FeedEntry {
        external_id,
        title,
        link,
        content,
        author,
        published_at: entry.published.or(entry.updated),
        image_url,
        audio_url,
        audio_duration_secs,
    })
}

fn select_link(entry: &Entry) -> Option<String> {
    let usable = || entry.links.iter().filter(|l| !l.href.trim().is_empty());
    usable()
        .find(|l| {
            l.rel
                .as_deref()
                .map_or(true, |rel| rel.is_empty() || rel.eq_ignore_ascii_case("alternate"))
        })
        .or_else(|| usable().next())
        .map(|l| l.href.trim().to_string())
}

fn select_audio(entry: &Entry) -> (Option<String>, Option<i32>) {
    for media in &entry.media {
        for content in &media.content {
            let is_audio = content
                .content_type
                .as_ref()
                .is_some_and(|m| m.ty().as_str() == "audio");
            if let (true, Some(url)) = (is_audio, content.url.as_ref()) {
                let duration = content
                    .duration
                    .or(media.duration)
                    .and_then(|d| i32::try_from(d.as_secs()).ok());
                return (Some(url.to_string()), duration);
            }
        }
    }
    let enclosure = entry.links.iter().find(|l| {
        l.rel
            .as_deref()
            .is_some_and(|r| r.eq_ignore_ascii_case("enclosure"))
            || l.media_type
                .as_deref()
                .is_some_and(|t| t.starts_with("audio/"))
    });
    (enclosure.map(|l| l.href.clone()), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <item>
      <guid>post-1</guid>
      <title>First post</title>
      <link>https://example.com/1</link>
      <description>Hello world</description>
      <pubDate>Mon, 02 Mar 2026 10:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Episode 2</title>
      <link>https://example.com/2</link>
      <enclosure url="https://cdn.example.com/2.mp3" type="audio/mpeg" length="1000"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_entries() {
        let entries = parse_feed(RSS.as_bytes(), "test").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("First post"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/1"));
        assert_eq!(entries[0].content.as_deref(), Some("Hello world"));
        assert!(entries[0].published_at.is_some());
    }

    #[test]
    fn entries_always_have_an_identifier() {
        let entries = parse_feed(RSS.as_bytes(), "test").unwrap();
        assert!(entries.iter().all(|e| !e.external_id.is_empty()));
    }

    #[test]
    fn enclosure_becomes_audio_url() {
        let entries = parse_feed(RSS.as_bytes(), "test").unwrap();
        assert_eq!(
            entries[1].audio_url.as_deref(),
            Some("https://cdn.example.com/2.mp3")
        );
    }

    #[test]
    fn media_content_audio_carries_duration() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Talks</title>
    <item>
      <guid>ep-9</guid>
      <title>Episode 9</title>
      <media:content url="https://cdn.example.com/9.jpg" type="image/jpeg"/>
      <media:content url="https://cdn.example.com/9.mp3" type="audio/mpeg" duration="1800"/>
    </item>
  </channel>
</rss>"#;
        let entries = parse_feed(rss.as_bytes(), "test").unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].audio_url.as_deref(),
            Some("https://cdn.example.com/9.mp3")
        );
        assert_eq!(entries[0].audio_duration_secs, Some(1800));
    }

    #[test]
    fn non_feed_is_malformed() {
        let err = parse_feed(b"<html>nope</html>", "test").unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }
}
