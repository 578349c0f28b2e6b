//! Offline tests for sift-db pool configuration and row conversions.
//! These tests do not require a live database connection.

use chrono::Utc;
use rust_decimal::Decimal;
use sift_core::{
    AppConfig, ContentItem, ContentType, Environment, ProcessingStatus, RelatedIdea,
    RelatedIdeaKind, Summary, Takeaway, UsageRecord,
};
use sift_db::{ContentItemRow, DbError, PoolConfig, SummaryRow, UsageRecordRow};
use sqlx::types::Json;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use uuid::Uuid;

fn app_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://example".to_string(),
        env: Environment::Test,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        sources_path: PathBuf::from("./config/sources.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        llm_base_url: "http://localhost".to_string(),
        llm_api_key: None,
        llm_model: "gpt-4o-mini".to_string(),
        llm_timeout_secs: 120,
        llm_max_retries: 3,
        rate_requests_per_minute: 50,
        rate_tokens_per_minute: 150_000,
        rate_max_wait_secs: 300,
        budget_daily_usd: Decimal::new(5, 0),
        budget_monthly_usd: Decimal::new(100, 0),
        fetch_timeout_secs: 30,
        fetch_user_agent: "ua".to_string(),
        fetch_max_retries: 3,
        fetch_backoff_base_ms: 1_000,
        min_words_article: 100,
        min_words_transcript: 300,
        max_item_attempts: 3,
        batch_delay_ms: 500,
    }
}

fn content_row(content_type: &str, status: &str) -> ContentItemRow {
    ContentItemRow {
        id: Uuid::new_v4(),
        source: "example-blog".to_string(),
        external_id: "post-1".to_string(),
        content_type: content_type.to_string(),
        title: Some("Title".to_string()),
        url: Some("https://example.com/post-1".to_string()),
        author: None,
        published_at: None,
        image_url: None,
        raw_text: None,
        extracted_text: "body".to_string(),
        content_hash: "abc".to_string(),
        word_count: 1,
        audio_url: None,
        audio_duration_secs: None,
        transcript_url: None,
        processing_status: status.to_string(),
        retry_count: 0,
        last_error: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let pool_config = PoolConfig::from_app_config(&app_config());
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout, std::time::Duration::from_secs(9));
}

#[test]
fn content_row_converts_enum_columns() {
    let item = ContentItem::try_from(content_row("podcast_episode", "failed"))
        .expect("valid row should convert");
    assert_eq!(item.content_type, ContentType::PodcastEpisode);
    assert_eq!(item.processing_status, ProcessingStatus::Failed);
}

#[test]
fn content_row_with_unknown_status_is_rejected() {
    let err = ContentItem::try_from(content_row("article", "archived"))
        .expect_err("unknown status must not convert");
    assert!(matches!(
        err,
        DbError::InvalidRow {
            table: "content_items",
            ..
        }
    ));
}

#[test]
fn summary_row_unwraps_json_columns() {
    let row = SummaryRow {
        id: Uuid::new_v4(),
        content_id: Uuid::new_v4(),
        summary_type: "full".to_string(),
        headline: "Headline".to_string(),
        tldr: "tldr".to_string(),
        full_summary: "full".to_string(),
        key_points: Json(vec!["one".to_string()]),
        takeaways: Json(vec![Takeaway {
            takeaway: "t".to_string(),
            context: "c".to_string(),
            action: None,
            confidence: 0.5,
            source_quote: None,
        }]),
        related_ideas: Json(vec![RelatedIdea {
            idea: "i".to_string(),
            kind: RelatedIdeaKind::Question,
            explanation: None,
        }]),
        trivia: Json(vec![]),
        speakers: None,
        model: "gpt-4o-mini".to_string(),
        strategy: "single_pass".to_string(),
        input_tokens: 10,
        output_tokens: 5,
        cost_usd: Decimal::new(12, 6),
        latency_ms: 40,
        quality_score: 0.3,
        degraded: false,
        created_at: Utc::now(),
    };

    let summary = Summary::from(row);
    assert_eq!(summary.content.key_points, vec!["one".to_string()]);
    assert_eq!(summary.content.takeaways.len(), 1);
    assert_eq!(
        summary.content.related_ideas[0].kind,
        RelatedIdeaKind::Question
    );
    assert!(summary.content.speakers.is_none());
}

#[test]
fn usage_row_converts_to_record() {
    let row = UsageRecordRow {
        id: Uuid::new_v4(),
        recorded_at: Utc::now(),
        model: "gpt-4o-mini".to_string(),
        input_tokens: 100,
        output_tokens: 20,
        cost_usd: Decimal::new(27, 6),
        operation: "summarize".to_string(),
    };
    let record = UsageRecord::from(row.clone());
    assert_eq!(record.id, row.id);
    assert_eq!(record.cost_usd, row.cost_usd);
    assert_eq!(record.operation, "summarize");
}
