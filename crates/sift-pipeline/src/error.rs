use std::fmt;

use rust_decimal::Decimal;
use sift_core::ErrorKind;
use sift_fetch::FetchError;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetWindow {
    Daily,
    Monthly,
}

impl fmt::Display for BudgetWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BudgetWindow::Daily => f.write_str("daily"),
            BudgetWindow::Monthly => f.write_str("monthly"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Spending `estimated` would push the window past its limit. Never
    /// retried; the window has to roll over first.
    #[error("{window} budget exceeded: spent ${spent} + estimated ${estimated} > limit ${limit}")]
    BudgetExceeded {
        window: BudgetWindow,
        spent: Decimal,
        estimated: Decimal,
        limit: Decimal,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("content item {0} not found")]
    ItemNotFound(Uuid),

    /// Another run holds the `processing` claim on the item.
    #[error("content item {0} is already being processed")]
    AlreadyProcessing(Uuid),
}

impl PipelineError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Fetch(e) => e.kind(),
            PipelineError::BudgetExceeded { .. } => ErrorKind::BudgetExceeded,
            PipelineError::Store(_)
            | PipelineError::ItemNotFound(_)
            | PipelineError::AlreadyProcessing(_) => ErrorKind::Storage,
        }
    }
}
