//! Database operations for `summaries`.
//!
//! One row per `(content_id, summary_type)`. List-valued fields are stored
//! as JSONB; `quality_score` is written from [`Summary::quality_score`] and
//! never read back into the domain type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sift_core::{RelatedIdea, Speaker, Summary, SummaryContent, Takeaway, TriviaFact};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `summaries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SummaryRow {
    pub id: Uuid,
    pub content_id: Uuid,
    pub summary_type: String,
    pub headline: String,
    pub tldr: String,
    pub full_summary: String,
    pub key_points: Json<Vec<String>>,
    pub takeaways: Json<Vec<Takeaway>>,
    pub related_ideas: Json<Vec<RelatedIdea>>,
    pub trivia: Json<Vec<TriviaFact>>,
    pub speakers: Option<Json<Vec<Speaker>>>,
    pub model: String,
    pub strategy: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: Decimal,
    pub latency_ms: i64,
    pub quality_score: f32,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

impl From<SummaryRow> for Summary {
    fn from(row: SummaryRow) -> Self {
        Summary {
            id: row.id,
            content_id: row.content_id,
            summary_type: row.summary_type,
            content: SummaryContent {
                headline: row.headline,
                tldr: row.tldr,
                full_summary: row.full_summary,
                key_points: row.key_points.0,
                takeaways: row.takeaways.0,
                related_ideas: row.related_ideas.0,
                trivia: row.trivia.0,
                speakers: row.speakers.map(|s| s.0),
            },
            model: row.model,
            strategy: row.strategy,
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            cost_usd: row.cost_usd,
            latency_ms: row.latency_ms,
            degraded: row.degraded,
            created_at: row.created_at,
        }
    }
}

/// Fetches the summary of the given type for a content item.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_summary(
    pool: &PgPool,
    content_id: Uuid,
    summary_type: &str,
) -> Result<Option<Summary>, DbError> {
    let row = sqlx::query_as::<_, SummaryRow>(
        "SELECT id, content_id, summary_type, headline, tldr, full_summary, key_points, \
                takeaways, related_ideas, trivia, speakers, model, strategy, input_tokens, \
                output_tokens, cost_usd, latency_ms, quality_score, degraded, created_at \
         FROM summaries \
         WHERE content_id = $1 AND summary_type = $2",
    )
    .bind(content_id)
    .bind(summary_type)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Summary::from))
}

/// Inserts a summary, replacing any existing row for the same
/// `(content_id, summary_type)`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_summary(pool: &PgPool, summary: &Summary) -> Result<(), DbError> {
    let content = &summary.content;
    sqlx::query(
        "INSERT INTO summaries \
             (id, content_id, summary_type, headline, tldr, full_summary, key_points, \
              takeaways, related_ideas, trivia, speakers, model, strategy, input_tokens, \
              output_tokens, cost_usd, latency_ms, quality_score, degraded, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                 $17, $18, $19, $20) \
         ON CONFLICT (content_id, summary_type) DO UPDATE SET \
             headline      = EXCLUDED.headline, \
             tldr          = EXCLUDED.tldr, \
             full_summary  = EXCLUDED.full_summary, \
             key_points    = EXCLUDED.key_points, \
             takeaways     = EXCLUDED.takeaways, \
             related_ideas = EXCLUDED.related_ideas, \
             trivia        = EXCLUDED.trivia, \
             speakers      = EXCLUDED.speakers, \
             model         = EXCLUDED.model, \
             strategy      = EXCLUDED.strategy, \
             input_tokens  = EXCLUDED.input_tokens, \
             output_tokens = EXCLUDED.output_tokens, \
             cost_usd      = EXCLUDED.cost_usd, \
             latency_ms    = EXCLUDED.latency_ms, \
             quality_score = EXCLUDED.quality_score, \
             degraded      = EXCLUDED.degraded, \
             updated_at    = NOW()",
    )
    .bind(summary.id)
    .bind(summary.content_id)
    .bind(&summary.summary_type)
    .bind(&content.headline)
    .bind(&content.tldr)
    .bind(&content.full_summary)
    .bind(Json(&content.key_points))
    .bind(Json(&content.takeaways))
    .bind(Json(&content.related_ideas))
    .bind(Json(&content.trivia))
    .bind(content.speakers.as_ref().map(Json))
    .bind(&summary.model)
    .bind(&summary.strategy)
    .bind(summary.input_tokens)
    .bind(summary.output_tokens)
    .bind(summary.cost_usd)
    .bind(summary.latency_ms)
    .bind(summary.quality_score())
    .bind(summary.degraded)
    .bind(summary.created_at)
    .execute(pool)
    .await?;

    Ok(())
}
