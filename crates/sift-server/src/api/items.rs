use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sift_core::{
    ContentItem, ContentType, ErrorKind, ProcessingStatus, SummaryContent, DEFAULT_SUMMARY_TYPE,
};
use sift_pipeline::{PendingQuery, ProcessOptions, ProcessingResult, Processor};
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{map_store_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ItemListEntry {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub content_type: ContentType,
    pub title: Option<String>,
    pub processing_status: ProcessingStatus,
    pub retry_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<&ContentItem> for ItemListEntry {
    fn from(item: &ContentItem) -> Self {
        Self {
            id: item.id,
            source: item.source.clone(),
            external_id: item.external_id.clone(),
            content_type: item.content_type,
            title: item.title.clone(),
            processing_status: item.processing_status,
            retry_count: item.retry_count,
            created_at: item.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SummaryView {
    #[serde(flatten)]
    pub content: SummaryContent,
    pub strategy: String,
    pub model: String,
    pub degraded: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct ItemDetail {
    #[serde(flatten)]
    pub item: ItemListEntry,
    pub url: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub word_count: i32,
    pub last_error: Option<String>,
    pub summary: Option<SummaryView>,
}

#[derive(Debug, Deserialize)]
pub(super) struct PendingParams {
    pub limit: Option<usize>,
    pub source: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct ProcessParams {
    pub force_resummarize: bool,
    pub force_retranscribe: bool,
}

impl From<ProcessParams> for ProcessOptions {
    fn from(params: ProcessParams) -> Self {
        ProcessOptions {
            force_resummarize: params.force_resummarize,
            force_retranscribe: params.force_retranscribe,
        }
    }
}

fn require_processor(state: &AppState, request_id: &str) -> Result<Arc<Processor>, ApiError> {
    state.processor.clone().ok_or_else(|| {
        ApiError::new(
            request_id,
            "processing_unavailable",
            "processing is disabled: no generation API key configured",
        )
    })
}

fn not_found(request_id: &str, id: Uuid) -> ApiError {
    ApiError::new(request_id, "not_found", format!("item {id} not found"))
}

pub(super) async fn list_pending(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<PendingParams>,
) -> Result<Json<ApiResponse<Vec<ItemListEntry>>>, ApiError> {
    let query = PendingQuery {
        limit: normalize_limit(params.limit),
        source: params.source,
        max_attempts: state.max_attempts,
    };
    let ids = state
        .store
        .list_pending(&query)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?;

    let mut data = Vec::with_capacity(ids.len());
    for id in ids {
        let item = state
            .store
            .get_item(id)
            .await
            .map_err(|e| map_store_error(req_id.0.clone(), &e))?;
        if let Some(item) = item {
            data.push(ItemListEntry::from(&item));
        }
    }

    Ok(ApiResponse::new(data, req_id.0))
}

pub(super) async fn get_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ItemDetail>>, ApiError> {
    let item = state
        .store
        .get_item(id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .ok_or_else(|| not_found(&req_id.0, id))?;
    let summary = state
        .store
        .get_summary(id, DEFAULT_SUMMARY_TYPE)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .map(|s| SummaryView {
            content: s.content,
            strategy: s.strategy,
            model: s.model,
            degraded: s.degraded,
            created_at: s.created_at,
        });

    let data = ItemDetail {
        item: ItemListEntry::from(&item),
        url: item.url,
        author: item.author,
        published_at: item.published_at,
        word_count: item.word_count,
        last_error: item.last_error,
        summary,
    };
    Ok(ApiResponse::new(data, req_id.0))
}

/// Runs one item synchronously. Processing failures are data, not HTTP
/// errors, except when the budget is exhausted.
pub(super) async fn process_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Query(params): Query<ProcessParams>,
) -> Result<Json<ApiResponse<ProcessingResult>>, ApiError> {
    let exists = state
        .store
        .get_item(id)
        .await
        .map_err(|e| map_store_error(req_id.0.clone(), &e))?
        .is_some();
    if !exists {
        return Err(not_found(&req_id.0, id));
    }
    let processor = require_processor(&state, &req_id.0)?;

    let result = processor.process_item(id, params.into()).await;
    if let Some(failure) = result
        .error
        .as_ref()
        .filter(|f| f.kind == ErrorKind::BudgetExceeded)
    {
        return Err(ApiError::new(
            req_id.0,
            "budget_exceeded",
            failure.message.clone(),
        ));
    }
    Ok(ApiResponse::new(result, req_id.0))
}

#[derive(Debug, Deserialize)]
pub(super) struct ProcessPendingParams {
    pub limit: Option<usize>,
    pub source: Option<String>,
    #[serde(default)]
    pub force_resummarize: bool,
}

pub(super) async fn process_pending(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ProcessPendingParams>,
) -> Result<Json<ApiResponse<Vec<ProcessingResult>>>, ApiError> {
    let processor = require_processor(&state, &req_id.0)?;
    let options = ProcessOptions {
        force_resummarize: params.force_resummarize,
        force_retranscribe: false,
    };
    let results = processor
        .process_pending(
            normalize_limit(params.limit),
            params.source.as_deref(),
            options,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "failed to list pending items");
            ApiError::new(
                req_id.0.clone(),
                "internal_error",
                "failed to list pending items",
            )
        })?;
    Ok(ApiResponse::new(results, req_id.0))
}
