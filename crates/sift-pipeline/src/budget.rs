//! Spend tracking against daily and monthly ceilings.
//!
//! Windows are calendar days and months in the service's local time zone,
//! computed from record timestamps when queried. Nothing rolls over on a
//! schedule.

use chrono::{DateTime, Datelike, Duration, Local, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sift_core::UsageRecord;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{BudgetWindow, PipelineError};

/// USD per 1K tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelPrice {
    pub input_per_1k: Decimal,
    pub output_per_1k: Decimal,
}

/// Prices are given in millionths of a dollar per 1K tokens.
const fn price(input_micros: u32, output_micros: u32) -> ModelPrice {
    ModelPrice {
        input_per_1k: Decimal::from_parts(input_micros, 0, 0, false, 6),
        output_per_1k: Decimal::from_parts(output_micros, 0, 0, false, 6),
    }
}

/// Most specific prefix first.
const PRICE_TABLE: &[(&str, ModelPrice)] = &[
    ("gpt-4o-mini", price(150, 600)),
    ("gpt-4o", price(2_500, 10_000)),
    ("gpt-4.1-nano", price(100, 400)),
    ("gpt-4.1-mini", price(400, 1_600)),
    ("gpt-4.1", price(2_000, 8_000)),
    ("gpt-3.5-turbo", price(500, 1_500)),
    ("claude-3-5-haiku", price(800, 4_000)),
    ("claude-3-haiku", price(250, 1_250)),
    ("claude-sonnet", price(3_000, 15_000)),
    ("claude-3-5-sonnet", price(3_000, 15_000)),
];

/// Unknown models are priced high so they cannot quietly overspend.
const FALLBACK_PRICE: ModelPrice = price(10_000, 30_000);

#[must_use]
pub fn model_price(model: &str) -> ModelPrice {
    PRICE_TABLE
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map_or(FALLBACK_PRICE, |(_, p)| *p)
}

/// Pure function of the static price table.
#[must_use]
pub fn estimate_cost(model: &str, input_tokens: i64, output_tokens: i64) -> Decimal {
    let p = model_price(model);
    let thousand = Decimal::from(1_000);
    (Decimal::from(input_tokens.max(0)) * p.input_per_1k
        + Decimal::from(output_tokens.max(0)) * p.output_per_1k)
        / thousand
}

#[derive(Debug, Clone, Copy)]
pub struct BudgetLimits {
    pub daily_usd: Decimal,
    pub monthly_usd: Decimal,
}

impl BudgetLimits {
    #[must_use]
    pub fn from_app_config(config: &sift_core::AppConfig) -> Self {
        Self {
            daily_usd: config.budget_daily_usd,
            monthly_usd: config.budget_monthly_usd,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BudgetUsage {
    pub daily_spent_usd: Decimal,
    pub daily_limit_usd: Decimal,
    pub monthly_spent_usd: Decimal,
    pub monthly_limit_usd: Decimal,
}

impl BudgetUsage {
    #[must_use]
    pub fn daily_remaining_usd(&self) -> Decimal {
        (self.daily_limit_usd - self.daily_spent_usd).max(Decimal::ZERO)
    }

    #[must_use]
    pub fn monthly_remaining_usd(&self) -> Decimal {
        (self.monthly_limit_usd - self.monthly_spent_usd).max(Decimal::ZERO)
    }
}

/// Midnight on the first of the current local month, in UTC.
#[must_use]
pub fn current_month_start() -> DateTime<Utc> {
    let now = Local::now();
    now.date_naive()
        .with_day(1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .and_then(|d| d.and_local_timezone(Local).earliest())
        .map_or_else(
            || now.with_timezone(&Utc) - Duration::days(31),
            |d| d.with_timezone(&Utc),
        )
}

pub struct BudgetGuard {
    limits: BudgetLimits,
    /// Current-month ledger (older entries are pruned on write).
    ledger: Mutex<Vec<(DateTime<Utc>, Decimal)>>,
}

fn same_day(a: DateTime<Local>, b: DateTime<Local>) -> bool {
    a.date_naive() == b.date_naive()
}

fn same_month(a: DateTime<Local>, b: DateTime<Local>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

impl BudgetGuard {
    #[must_use]
    pub fn new(limits: BudgetLimits) -> Self {
        Self::with_history(limits, &[])
    }

    /// Seeds the ledger with persisted records so a restart keeps the
    /// month's spend.
    #[must_use]
    pub fn with_history(limits: BudgetLimits, records: &[UsageRecord]) -> Self {
        let now = Local::now();
        let ledger = records
            .iter()
            .filter(|r| same_month(r.recorded_at.with_timezone(&Local), now))
            .map(|r| (r.recorded_at, r.cost_usd))
            .collect();
        Self {
            limits,
            ledger: Mutex::new(ledger),
        }
    }

    #[must_use]
    pub fn limits(&self) -> BudgetLimits {
        self.limits
    }

    fn totals(ledger: &[(DateTime<Utc>, Decimal)], now: DateTime<Local>) -> (Decimal, Decimal) {
        ledger
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(day, month), (at, cost)| {
                let at = at.with_timezone(&Local);
                (
                    if same_day(at, now) { day + cost } else { day },
                    if same_month(at, now) { month + cost } else { month },
                )
            })
    }

    pub async fn usage(&self) -> BudgetUsage {
        self.usage_at(Utc::now()).await
    }

    pub async fn usage_at(&self, now: DateTime<Utc>) -> BudgetUsage {
        let ledger = self.ledger.lock().await;
        let (daily, monthly) = Self::totals(&ledger, now.with_timezone(&Local));
        BudgetUsage {
            daily_spent_usd: daily,
            daily_limit_usd: self.limits.daily_usd,
            monthly_spent_usd: monthly,
            monthly_limit_usd: self.limits.monthly_usd,
        }
    }

    /// # Errors
    ///
    /// [`PipelineError::BudgetExceeded`] naming the first window that
    /// `estimated_cost` would push past its limit.
    pub async fn check(&self, estimated_cost: Decimal) -> Result<(), PipelineError> {
        self.check_at(estimated_cost, Utc::now()).await
    }

    /// # Errors
    ///
    /// See [`check`](Self::check).
    pub async fn check_at(
        &self,
        estimated_cost: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), PipelineError> {
        let usage = self.usage_at(now).await;
        let exceeded = |window, spent: Decimal, limit: Decimal| {
            (spent + estimated_cost > limit).then_some(PipelineError::BudgetExceeded {
                window,
                spent,
                estimated: estimated_cost,
                limit,
            })
        };
        match exceeded(
            BudgetWindow::Daily,
            usage.daily_spent_usd,
            usage.daily_limit_usd,
        )
        .or_else(|| {
            exceeded(
                BudgetWindow::Monthly,
                usage.monthly_spent_usd,
                usage.monthly_limit_usd,
            )
        }) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub async fn can_afford(&self, estimated_cost: Decimal) -> bool {
        self.check(estimated_cost).await.is_ok()
    }

    /// Appends a ledger entry priced from the static table and returns it
    /// for persistence.
    pub async fn record_usage(
        &self,
        model: &str,
        input_tokens: i64,
        output_tokens: i64,
        operation: &str,
    ) -> UsageRecord {
        let record = UsageRecord {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost_usd: estimate_cost(model, input_tokens, output_tokens),
            operation: operation.to_string(),
        };
        let mut ledger = self.ledger.lock().await;
        let now = record.recorded_at.with_timezone(&Local);
        ledger.retain(|(at, _)| same_month(at.with_timezone(&Local), now));
        ledger.push((record.recorded_at, record.cost_usd));
        record
    }
}
