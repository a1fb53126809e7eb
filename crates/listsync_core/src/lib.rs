//! Listsync core: canonical import list model and the pure sync decisions
//! (cleaning, reconciliation, source health).
mod clean;
mod config;
mod health;
mod intent;
mod item;
mod reconcile;
mod run;
mod snapshot;
pub mod text;

pub use clean::{clean, merge_sources};
pub use config::{AddDefaults, MonitorMode, ProviderKind, SourceConfig, SourceId};
pub use health::{BackoffPolicy, HealthRecord, ListHealthTracker};
pub use intent::{ExclusionMatch, IntentAction, MutationIntent, SkipReason};
pub use item::{DedupKey, ImportListItem};
pub use reconcile::{reconcile, DefaultsBySource};
pub use run::{RunStatus, SourceRunResult};
pub use snapshot::{ExclusionSet, LibrarySnapshot, LibraryState};
