use super::*;

const VALID: &str = r"
sources:
  - slug: example-blog
    name: Example Blog
    kind: feed
    url: https://example.com/feed.xml
  - slug: deep-talks
    name: Deep Talks
    kind: podcast
    url: https://podcasts.example.com/deep-talks.rss
    enabled: false
";

#[test]
fn parses_valid_sources() {
    let file = parse_sources(VALID).expect("valid sources");
    assert_eq!(file.sources.len(), 2);
    assert_eq!(file.sources[0].kind, SourceKind::Feed);
    assert!(file.sources[0].enabled, "enabled defaults to true");
    assert_eq!(file.sources[1].kind, SourceKind::Podcast);
    assert!(!file.sources[1].enabled);
}

#[test]
fn enabled_filters_disabled_sources() {
    let file = parse_sources(VALID).unwrap();
    let slugs: Vec<&str> = file.enabled().map(|s| s.slug.as_str()).collect();
    assert_eq!(slugs, vec!["example-blog"]);
}

#[test]
fn find_by_slug() {
    let file = parse_sources(VALID).unwrap();
    assert_eq!(file.find("deep-talks").map(|s| s.kind), Some(SourceKind::Podcast));
    assert!(file.find("missing").is_none());
}

#[test]
fn kind_maps_to_content_type() {
    assert_eq!(SourceKind::Feed.content_type(), ContentType::Article);
    assert_eq!(
        SourceKind::Podcast.content_type(),
        ContentType::PodcastEpisode
    );
}

#[test]
fn rejects_duplicate_slugs() {
    let yaml = r"
sources:
  - { slug: a, name: A, kind: feed, url: https://a.example.com/rss }
  - { slug: a, name: A2, kind: feed, url: https://a2.example.com/rss }
";
    let result = parse_sources(yaml);
    assert!(
        matches!(result, Err(ConfigError::Validation(ref msg)) if msg.contains("duplicate")),
        "got: {result:?}"
    );
}

#[test]
fn rejects_uppercase_slug() {
    let yaml = r"
sources:
  - { slug: Blog, name: Blog, kind: feed, url: https://blog.example.com/rss }
";
    assert!(matches!(
        parse_sources(yaml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn rejects_non_http_url() {
    let yaml = r"
sources:
  - { slug: blog, name: Blog, kind: feed, url: ftp://blog.example.com/rss }
";
    assert!(matches!(
        parse_sources(yaml),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn rejects_unknown_kind() {
    let yaml = r"
sources:
  - { slug: blog, name: Blog, kind: newsletter, url: https://blog.example.com/rss }
";
    assert!(matches!(
        parse_sources(yaml),
        Err(ConfigError::SourcesFileParse(_))
    ));
}

#[test]
fn missing_file_is_io_error() {
    let result = load_sources(Path::new("/definitely/not/here/sources.yaml"));
    assert!(matches!(result, Err(ConfigError::SourcesFileIo { .. })));
}
