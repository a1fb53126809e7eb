use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use listsync_core::{
    reconcile, DefaultsBySource, IntentAction, LibraryState, ListHealthTracker, SourceId,
};
use listsync_engine::{
    GoodreadsClient, HealthStore, StaticCredentials, SyncEngine, SyncOptions, SyncReport,
};
use sync_logging::{sync_info, sync_warn};
use tokio_util::sync::CancellationToken;

use crate::cli::Cli;
use crate::config::{load_library, AppConfig};
use crate::progress::LogProgressSink;
use crate::report::Report;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli.config)?;
    let library = load_library(cli.library.as_deref())?;

    let store = HealthStore::new(cli.state_dir.clone());
    let mut tracker = ListHealthTracker::new(config.backoff);
    tracker.restore(store.load().context("loading source health")?);

    let credentials = Arc::new(StaticCredentials::new(config.credentials.clone()));
    let client = GoodreadsClient::new(config.fetch.to_settings(), credentials)
        .context("building http client")?;
    let engine = SyncEngine::new(Arc::new(client), config.engine);

    let cancel = CancellationToken::new();
    spawn_interrupt_watch(cancel.clone());

    let options = SyncOptions {
        now: Utc::now(),
        ignore_backoff: cli.ignore_backoff,
    };
    let outcome = match cli.source {
        Some(source_id) => {
            run_single(
                &engine,
                &config,
                &library,
                &mut tracker,
                source_id,
                options,
                &cancel,
            )
            .await
        }
        None => engine
            .sync(
                &config.sources,
                &library,
                &mut tracker,
                options,
                &cancel,
                &LogProgressSink,
            )
            .await
            .map_err(anyhow::Error::from),
    };

    // Completed sources keep their health even when the pass was aborted.
    let health_path = store.save(&tracker.records()).context("saving source health")?;
    sync_info!("Source health saved to {}", health_path.display());

    let report = outcome?;
    let document = Report {
        generated_at: options.now,
        results: &report.results,
        deferred: &report.deferred,
        intents: &report.intents,
    };
    sync_info!(
        "{} authors and {} books to add, {} skipped, {} excluded",
        document.count(|action| *action == IntentAction::AddAuthor),
        document.count(|action| *action == IntentAction::AddBook),
        document.count(|action| matches!(action, IntentAction::Skip(_))),
        document.count(|action| matches!(action, IntentAction::Excluded(_)))
    );
    document.write(cli.output.as_deref())
}

/// Runs one source on demand, then reconciles just its items.
async fn run_single(
    engine: &SyncEngine,
    config: &AppConfig,
    library: &LibraryState,
    tracker: &mut ListHealthTracker,
    source_id: SourceId,
    options: SyncOptions,
    cancel: &CancellationToken,
) -> anyhow::Result<SyncReport> {
    if !options.ignore_backoff && !tracker.is_ready(source_id, options.now) {
        sync_warn!(
            "Source {} is backing off until {:?}, pass --ignore-backoff to run it anyway",
            source_id,
            tracker.next_attempt(source_id)
        );
        return Ok(SyncReport {
            results: Vec::new(),
            deferred: vec![source_id],
            items: Vec::new(),
            intents: Vec::new(),
        });
    }

    let run = engine
        .run_source(&config.sources, source_id, cancel, &LogProgressSink)
        .await?;
    tracker.record(&run.result, options.now);

    let defaults: DefaultsBySource = config
        .sources
        .iter()
        .filter(|source| source.id == source_id)
        .map(|source| (source.id, source.defaults.clone()))
        .collect();
    let intents = reconcile(&run.items, library, &defaults);
    Ok(SyncReport {
        results: vec![run.result],
        deferred: Vec::new(),
        items: run.items,
        intents,
    })
}

fn spawn_interrupt_watch(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            sync_warn!("Interrupted, cancelling the sync pass");
            cancel.cancel();
        }
    });
}
