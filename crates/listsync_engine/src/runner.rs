use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use listsync_core::{
    clean, merge_sources, reconcile, DefaultsBySource, ImportListItem, LibrarySnapshot,
    ListHealthTracker, MutationIntent, SourceConfig, SourceId, SourceRunResult,
};
use serde::{Deserialize, Serialize};
use sync_logging::{sync_info, sync_warn};
use tokio_util::sync::CancellationToken;

use crate::client::SourceClient;
use crate::normalize::normalize;
use crate::walker::{PageWalker, DEFAULT_MAX_PAGES};
use crate::{EngineEvent, ProgressSink, RunAborted, RunContext, RunError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub max_pages: u32,
    pub max_concurrent_sources: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_concurrent_sources: 4,
        }
    }
}

/// Read-only access to configured sources, keyed by id.
pub trait SourceConfigStore: Send + Sync {
    fn source(&self, id: SourceId) -> Option<SourceConfig>;
    fn sources(&self) -> Vec<SourceConfig>;
}

impl SourceConfigStore for Vec<SourceConfig> {
    fn source(&self, id: SourceId) -> Option<SourceConfig> {
        self.iter().find(|config| config.id == id).cloned()
    }

    fn sources(&self) -> Vec<SourceConfig> {
        self.clone()
    }
}

/// Result of one source run together with its cleaned items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRun {
    pub result: SourceRunResult,
    pub items: Vec<ImportListItem>,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub now: DateTime<Utc>,
    /// Run sources even while they are backing off.
    pub ignore_backoff: bool,
}

impl SyncOptions {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            ignore_backoff: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub results: Vec<SourceRunResult>,
    /// Enabled sources left out because they are still backing off.
    pub deferred: Vec<SourceId>,
    pub items: Vec<ImportListItem>,
    pub intents: Vec<MutationIntent>,
}

pub struct SyncEngine {
    client: Arc<dyn SourceClient>,
    walker: PageWalker,
    settings: EngineSettings,
}

impl SyncEngine {
    pub fn new(client: Arc<dyn SourceClient>, settings: EngineSettings) -> Self {
        Self {
            client,
            walker: PageWalker::new(settings.max_pages),
            settings,
        }
    }

    /// Walks, normalizes and cleans one source.
    pub async fn run_config(
        &self,
        config: &SourceConfig,
        ctx: &RunContext,
        sink: &dyn ProgressSink,
    ) -> Result<SourceRun, RunAborted> {
        let outcome = self
            .walker
            .walk(self.client.as_ref(), ctx, config, sink)
            .await?;

        let items_fetched = outcome.items.len();
        let canonical: Vec<ImportListItem> = outcome
            .items
            .iter()
            .filter_map(|raw| match normalize(raw, config.id) {
                Ok(item) => Some(item),
                Err(err) => {
                    sync_warn!("Source {} dropped an item: {}", config.id, err);
                    None
                }
            })
            .collect();
        let items = clean(canonical);

        let result = SourceRunResult {
            source_id: config.id,
            items_fetched,
            items_after_dedup: items.len(),
            status: outcome.summary.status,
            error_detail: outcome.summary.detail(),
            retry_after: outcome
                .summary
                .error
                .as_ref()
                .and_then(|(_, err)| err.retry_after()),
        };
        sync_info!(
            "Source {} ({}, {}) finished: {}, {} fetched, {} after cleanup",
            config.id,
            config.name,
            config.provider.label(),
            result.status,
            result.items_fetched,
            result.items_after_dedup
        );
        sink.emit(EngineEvent::SourceCompleted(result.clone()));

        Ok(SourceRun { result, items })
    }

    /// Runs one stored source on demand, as the scheduler does.
    pub async fn run_source(
        &self,
        store: &dyn SourceConfigStore,
        source_id: SourceId,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<SourceRun, RunError> {
        let config = store
            .source(source_id)
            .ok_or(RunError::UnknownSource(source_id))?;
        if !config.enabled {
            return Err(RunError::Disabled(source_id));
        }
        let ctx = RunContext::new(source_id, cancel.child_token());
        Ok(self.run_config(&config, &ctx, sink).await?)
    }

    /// Runs every given source with at most `max_concurrent_sources` in
    /// flight. Results come back in input order.
    pub async fn run_sources(
        &self,
        configs: &[SourceConfig],
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Vec<Result<SourceRun, RunAborted>> {
        let mut runs: Vec<_> = stream::iter(configs.iter().enumerate())
            .map(|(index, config)| async move {
                let ctx = RunContext::new(config.id, cancel.child_token());
                (index, self.run_config(config, &ctx, sink).await)
            })
            .buffer_unordered(self.settings.max_concurrent_sources.max(1))
            .collect()
            .await;
        runs.sort_by_key(|(index, _)| *index);
        runs.into_iter().map(|(_, run)| run).collect()
    }

    /// One full pass: run every enabled, ready source, record health, merge,
    /// clean across sources and reconcile against the snapshot.
    ///
    /// A cancelled pass returns `RunAborted` and no intents. Sources that
    /// completed before the cancellation still get their health recorded.
    pub async fn sync(
        &self,
        configs: &[SourceConfig],
        snapshot: &dyn LibrarySnapshot,
        tracker: &mut ListHealthTracker,
        options: SyncOptions,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> Result<SyncReport, RunAborted> {
        let mut deferred = Vec::new();
        let selected: Vec<SourceConfig> = configs
            .iter()
            .filter(|config| config.enabled)
            .filter(|config| {
                let ready = options.ignore_backoff || tracker.is_ready(config.id, options.now);
                if !ready {
                    sync_info!(
                        "Source {} backing off until {:?}",
                        config.id,
                        tracker.next_attempt(config.id)
                    );
                    deferred.push(config.id);
                }
                ready
            })
            .cloned()
            .collect();

        let runs = self.run_sources(&selected, cancel, sink).await;

        let mut aborted = None;
        let mut completed = Vec::with_capacity(runs.len());
        for run in runs {
            match run {
                Ok(run) => {
                    tracker.record(&run.result, options.now);
                    completed.push(run);
                }
                Err(err) => aborted = Some(err),
            }
        }
        if let Some(err) = aborted {
            sync_warn!("Sync pass aborted, discarding results: {}", err);
            return Err(err);
        }

        let results: Vec<SourceRunResult> =
            completed.iter().map(|run| run.result.clone()).collect();
        let items = merge_sources(completed.into_iter().map(|run| run.items));
        let defaults: DefaultsBySource = selected
            .iter()
            .map(|config| (config.id, config.defaults.clone()))
            .collect();
        let intents = reconcile(&items, snapshot, &defaults);
        sink.emit(EngineEvent::ReconcileCompleted {
            items: items.len(),
            intents: intents.len(),
        });

        Ok(SyncReport {
            results,
            deferred,
            items,
            intents,
        })
    }
}
