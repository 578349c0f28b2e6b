//! Append-only generation usage ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sift_core::UsageRecord;
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `usage_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageRecordRow {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost_usd: Decimal,
    pub operation: String,
}

impl From<UsageRecordRow> for UsageRecord {
    fn from(row: UsageRecordRow) -> Self {
        UsageRecord {
            id: row.id,
            recorded_at: row.recorded_at,
            model: row.model,
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            cost_usd: row.cost_usd,
            operation: row.operation,
        }
    }
}

/// Appends a ledger entry. Entries are never updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_usage_record(pool: &PgPool, record: &UsageRecord) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO usage_records \
             (id, recorded_at, model, input_tokens, output_tokens, cost_usd, operation) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(record.id)
    .bind(record.recorded_at)
    .bind(&record.model)
    .bind(record.input_tokens)
    .bind(record.output_tokens)
    .bind(record.cost_usd)
    .bind(&record.operation)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns ledger entries recorded at or after `since`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_usage_since(
    pool: &PgPool,
    since: DateTime<Utc>,
) -> Result<Vec<UsageRecord>, DbError> {
    let rows = sqlx::query_as::<_, UsageRecordRow>(
        "SELECT id, recorded_at, model, input_tokens, output_tokens, cost_usd, operation \
         FROM usage_records \
         WHERE recorded_at >= $1 \
         ORDER BY recorded_at ASC",
    )
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(UsageRecord::from).collect())
}
