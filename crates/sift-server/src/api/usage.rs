use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use sift_pipeline::{current_month_start, BudgetGuard, BudgetUsage};

use crate::middleware::RequestId;

use super::{map_store_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct UsageData {
    #[serde(flatten)]
    pub usage: BudgetUsage,
    pub daily_remaining_usd: Decimal,
    pub monthly_remaining_usd: Decimal,
}

impl From<BudgetUsage> for UsageData {
    fn from(usage: BudgetUsage) -> Self {
        Self {
            daily_remaining_usd: usage.daily_remaining_usd(),
            monthly_remaining_usd: usage.monthly_remaining_usd(),
            usage,
        }
    }
}

/// Spend against the limits. Reads the live guard when processing is
/// enabled, otherwise rebuilds one from the persisted ledger.
pub(super) async fn get_usage(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<UsageData>>, ApiError> {
    let usage = match &state.processor {
        Some(processor) => processor.summarizer().budget().usage().await,
        None => {
            let history = state
                .store
                .usage_since(current_month_start())
                .await
                .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
            BudgetGuard::with_history(state.budget_limits, &history)
                .usage()
                .await
        }
    };
    Ok(ApiResponse::new(UsageData::from(usage), req_id.0))
}
