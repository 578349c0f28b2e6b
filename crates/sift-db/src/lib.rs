//! Postgres persistence for content items, summaries, and the usage ledger.

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

// Resolved relative to this crate's manifest.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout: Duration::from_secs(config.db_acquire_timeout_secs),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,

    /// A stored enum column held a value the domain types do not know.
    #[error("invalid row in {table}: {reason}")]
    InvalidRow { table: &'static str, reason: String },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Opens a pool against `database_url`.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if no connection can be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
}

/// Applies every migration under `migrations/` not yet recorded.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Round-trips `SELECT 1`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the database cannot be reached.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

pub mod content_items;
pub mod summaries;
pub mod usage_records;

pub use content_items::{
    claim_content_item, find_content_item, get_content_item, insert_content_item,
    list_pending_content, refresh_content_item, update_extracted_text, update_processing_status,
    ContentItemRow, PendingFilter,
};
pub use summaries::{get_summary, upsert_summary, SummaryRow};
pub use usage_records::{insert_usage_record, list_usage_since, UsageRecordRow};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_keeps_one_warm_connection() {
        let config = PoolConfig::default();
        assert_eq!(config.min_connections, 1);
        assert!(config.max_connections >= config.min_connections);
        assert_eq!(config.acquire_timeout, Duration::from_secs(10));
    }
}
