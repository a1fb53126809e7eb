//! Listsync engine: source clients, paginated walks and sync passes.
mod client;
mod normalize;
mod persist;
mod runner;
mod types;
mod walker;

pub use client::{CredentialProvider, FetchSettings, GoodreadsClient, SourceClient, StaticCredentials};
pub use normalize::{
    normalize, AuthorResource, BookResource, OwnedBookResource, RawItem, RawPage, ReviewResource,
};
pub use persist::{ensure_state_dir, AtomicFileWriter, HealthStore, PersistError, HEALTH_FILENAME};
pub use runner::{
    EngineSettings, SourceConfigStore, SourceRun, SyncEngine, SyncOptions, SyncReport,
};
pub use types::{
    EngineEvent, FailureKind, FetchError, NoopSink, NormalizeError, ProgressSink, RunAborted,
    RunContext, RunError,
};
pub use walker::{PageWalker, WalkEvent, WalkOutcome, WalkSummary, DEFAULT_MAX_PAGES};
