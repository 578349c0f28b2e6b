//! Read-only `pending` and `usage` command handlers.

use rust_decimal::Decimal;
use sift_core::AppConfig;
use sift_pipeline::{load_budget, ContentStore, PendingQuery};

/// # Errors
///
/// Returns an error if the store query fails.
pub(crate) async fn run_pending(
    config: &AppConfig,
    store: &dyn ContentStore,
    limit: usize,
    source: Option<String>,
) -> anyhow::Result<()> {
    let ids = store
        .list_pending(&PendingQuery {
            limit,
            source,
            max_attempts: config.max_item_attempts,
        })
        .await?;
    if ids.is_empty() {
        println!("nothing pending");
        return Ok(());
    }

    println!(
        "{:<38}{:<18}{:<12}{:>7}  TITLE",
        "ID", "SOURCE", "STATUS", "TRIES"
    );
    for id in ids {
        let Some(item) = store.get_item(id).await? else {
            continue;
        };
        let title = item.title.as_deref().unwrap_or("(untitled)");
        let title: String = if title.chars().count() > 50 {
            format!("{}...", title.chars().take(50).collect::<String>())
        } else {
            title.to_string()
        };
        println!(
            "{:<38}{:<18}{:<12}{:>7}  {}",
            item.id,
            item.source,
            item.processing_status.as_str(),
            item.retry_count,
            title
        );
    }
    Ok(())
}

fn usd(amount: Decimal) -> String {
    format!("${}", amount.round_dp(4))
}

/// # Errors
///
/// Returns an error if the usage history cannot be read.
pub(crate) async fn run_usage(config: &AppConfig, store: &dyn ContentStore) -> anyhow::Result<()> {
    let usage = load_budget(config, store).await?.usage().await;
    println!("{:<10}{:>14}{:>14}{:>14}", "WINDOW", "SPENT", "LIMIT", "REMAINING");
    println!(
        "{:<10}{:>14}{:>14}{:>14}",
        "today",
        usd(usage.daily_spent_usd),
        usd(usage.daily_limit_usd),
        usd(usage.daily_remaining_usd())
    );
    println!(
        "{:<10}{:>14}{:>14}{:>14}",
        "month",
        usd(usage.monthly_spent_usd),
        usd(usage.monthly_limit_usd),
        usd(usage.monthly_remaining_usd())
    );
    Ok(())
}
