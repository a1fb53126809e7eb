use std::fmt;
use std::time::Duration;

use listsync_core::{SourceId, SourceRunResult};
use tokio_util::sync::CancellationToken;

/// Per-run values threaded through walk, normalize and clean.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub source_id: SourceId,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(source_id: SourceId, cancel: CancellationToken) -> Self {
        Self { source_id, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    PageFetched {
        source_id: SourceId,
        page: u32,
        items: usize,
    },
    SourceCompleted(SourceRunResult),
    ReconcileCompleted {
        items: usize,
        intents: usize,
    },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink for callers that do not watch progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn emit(&self, _event: EngineEvent) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Credential rejected, as opposed to a transport level failure.
    pub fn is_auth(&self) -> bool {
        self.kind == FailureKind::Auth
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self.kind {
            FailureKind::RateLimited {
                retry_after_secs: Some(secs),
            } => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    Auth,
    HttpStatus(u16),
    RateLimited { retry_after_secs: Option<u64> },
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    InvalidResponse,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::Auth => write!(f, "authentication rejected"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::RateLimited { retry_after_secs } => match retry_after_secs {
                Some(secs) => write!(f, "rate limited (retry after {secs}s)"),
                None => write!(f, "rate limited"),
            },
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::InvalidResponse => write!(f, "invalid response"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    #[error("item has no credited author")]
    MissingAuthor,
    #[error("first author has no external id")]
    MissingAuthorId,
    #[error("first author has no name")]
    MissingAuthorName,
    #[error("item has no title")]
    MissingTitle,
}

/// A run was cancelled; nothing it produced may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("run aborted for source {source_id}")]
pub struct RunAborted {
    pub source_id: SourceId,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("unknown source {0}")]
    UnknownSource(SourceId),
    #[error("source {0} is disabled")]
    Disabled(SourceId),
    #[error(transparent)]
    Aborted(#[from] RunAborted),
}
