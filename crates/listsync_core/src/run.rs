use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SourceId;

/// Outcome class of one source run, returned by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Success,
    /// Some pages were obtained before the walk had to stop.
    PartialFailure,
    Failure,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::PartialFailure => write!(f, "partial failure"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRunResult {
    pub source_id: SourceId,
    pub items_fetched: usize,
    pub items_after_dedup: usize,
    pub status: RunStatus,
    pub error_detail: Option<String>,
    /// Provider asked us to wait at least this long before the next call.
    pub retry_after: Option<Duration>,
}

impl SourceRunResult {
    pub fn success(source_id: SourceId, items_fetched: usize, items_after_dedup: usize) -> Self {
        Self {
            source_id,
            items_fetched,
            items_after_dedup,
            status: RunStatus::Success,
            error_detail: None,
            retry_after: None,
        }
    }

    pub fn failure(source_id: SourceId, detail: impl Into<String>) -> Self {
        Self {
            source_id,
            items_fetched: 0,
            items_after_dedup: 0,
            status: RunStatus::Failure,
            error_detail: Some(detail.into()),
            retry_after: None,
        }
    }
}
