//! Integration tests for `HttpFetcher` using wiremock HTTP mocks.

use sift_core::UnavailableReason;
use sift_fetch::{FetchError, Fetcher, FetcherConfig, HttpFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_fetcher(max_retries: u32) -> HttpFetcher {
    HttpFetcher::new(&FetcherConfig {
        timeout_secs: 5,
        user_agent: "sift-test".to_string(),
        max_retries,
        backoff_base_ms: 0,
    })
    .expect("fetcher construction should not fail")
}

const FEED: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
  <item><guid>a</guid><title>A</title><link>https://example.com/a</link>
    <description>Alpha</description></item>
</channel></rss>"#;

#[tokio::test]
async fn fetch_feed_parses_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FEED))
        .mount(&server)
        .await;

    let entries = test_fetcher(0)
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .expect("feed should parse");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].external_id, "a");
}

#[tokio::test]
async fn server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let err = test_fetcher(2)
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .expect_err("should fail after retries");
    assert!(matches!(err, FetchError::ServerError { status: 503 }));
}

#[tokio::test]
async fn missing_feed_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_fetcher(3)
        .fetch_feed(&format!("{}/feed.xml", server.uri()))
        .await
        .expect_err("404 should fail");
    assert!(matches!(
        err,
        FetchError::ContentUnavailable {
            reason: UnavailableReason::NotFound
        }
    ));
}

#[tokio::test]
async fn transcript_is_returned_as_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Host: welcome to the show."))
        .mount(&server)
        .await;

    let text = test_fetcher(0)
        .fetch_transcript(&format!("{}/t/1", server.uri()))
        .await
        .expect("transcript should load");
    assert_eq!(text, "Host: welcome to the show.");
}

#[tokio::test]
async fn transcript_with_invalid_utf8_is_decoded_lossily() {
    let server = MockServer::start().await;
    let mut body = b"Host: caf".to_vec();
    body.extend_from_slice(&[0xE9, 0xFF]);
    body.extend_from_slice(b" opens the show.");
    Mock::given(method("GET"))
        .and(path("/t/latin1"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(&server)
        .await;

    let text = test_fetcher(0)
        .fetch_transcript(&format!("{}/t/latin1", server.uri()))
        .await
        .expect("stray bytes should not fail the transcript");
    assert!(text.starts_with("Host: caf"));
    assert!(text.contains('\u{FFFD}'));
    assert!(text.ends_with(" opens the show."));
}

#[tokio::test]
async fn private_video_marker_is_classified_from_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("This video is private"))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_fetcher(3)
        .fetch_transcript(&format!("{}/t/2", server.uri()))
        .await
        .expect_err("private video should fail");
    assert!(matches!(
        err,
        FetchError::ContentUnavailable {
            reason: UnavailableReason::Private
        }
    ));
}

#[tokio::test]
async fn rate_limited_then_ok_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/t/3"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/t/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Guest: thanks for having me."))
        .mount(&server)
        .await;

    let text = test_fetcher(2)
        .fetch_transcript(&format!("{}/t/3", server.uri()))
        .await
        .expect("should succeed after one 429");
    assert!(text.starts_with("Guest"));
}

#[tokio::test]
async fn audio_is_returned_as_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1_u8, 2, 3]))
        .mount(&server)
        .await;

    let bytes = test_fetcher(0)
        .fetch_audio(&format!("{}/a.mp3", server.uri()))
        .await
        .expect("audio should load");
    assert_eq!(bytes, vec![1, 2, 3]);
}
