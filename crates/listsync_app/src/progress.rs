use listsync_core::RunStatus;
use listsync_engine::{EngineEvent, ProgressSink};
use sync_logging::{sync_debug, sync_info, sync_warn};

/// Turns engine events into log lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::PageFetched {
                source_id,
                page,
                items,
            } => {
                sync_debug!("Source {} page {}: {} items", source_id, page, items);
            }
            EngineEvent::SourceCompleted(result) => match result.status {
                RunStatus::Success => sync_info!(
                    "Source {} done, {} items",
                    result.source_id,
                    result.items_after_dedup
                ),
                RunStatus::PartialFailure | RunStatus::Failure => sync_warn!(
                    "Source {} {}: {}",
                    result.source_id,
                    result.status,
                    result.error_detail.as_deref().unwrap_or("no detail")
                ),
            },
            EngineEvent::ReconcileCompleted { items, intents } => {
                sync_info!("Reconciled {} items into {} intents", items, intents);
            }
        }
    }
}
