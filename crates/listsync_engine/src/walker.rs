use std::pin::pin;

use futures_util::stream::{self, Stream, StreamExt};
use listsync_core::{RunStatus, SourceConfig};
use sync_logging::{sync_debug, sync_warn};

use crate::client::SourceClient;
use crate::normalize::{RawItem, RawPage};
use crate::{EngineEvent, FetchError, ProgressSink, RunAborted, RunContext};

pub const DEFAULT_MAX_PAGES: u32 = 500;

/// How a walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkSummary {
    pub status: RunStatus,
    /// Pages that produced items.
    pub pages: u32,
    /// The error that stopped the walk early, with the page it hit.
    pub error: Option<(u32, FetchError)>,
    pub cap_reached: bool,
}

impl WalkSummary {
    pub fn detail(&self) -> Option<String> {
        match (&self.error, self.cap_reached) {
            (Some((page, err)), _) => Some(format!("page {page}: {err}")),
            (None, true) => Some(format!("page cap reached after {} pages", self.pages)),
            (None, false) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEvent {
    Page(RawPage),
    Finished(WalkSummary),
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOutcome {
    pub items: Vec<RawItem>,
    pub summary: WalkSummary,
}

/// Drives a `SourceClient` through pages `1, 2, 3, ...` of one source.
#[derive(Debug, Clone, Copy)]
pub struct PageWalker {
    max_pages: u32,
}

impl Default for PageWalker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES)
    }
}

struct WalkState<'a> {
    client: &'a dyn SourceClient,
    ctx: &'a RunContext,
    config: &'a SourceConfig,
    max_pages: u32,
    next_page: u32,
    pages: u32,
    pending: Option<WalkSummary>,
    done: bool,
}

impl WalkState<'_> {
    fn finish(&mut self, status: RunStatus, error: Option<(u32, FetchError)>) -> WalkEvent {
        self.done = true;
        WalkEvent::Finished(WalkSummary {
            status,
            pages: self.pages,
            error,
            cap_reached: false,
        })
    }

    async fn step(&mut self) -> WalkEvent {
        if let Some(summary) = self.pending.take() {
            self.done = true;
            return WalkEvent::Finished(summary);
        }
        if self.ctx.is_cancelled() {
            self.done = true;
            return WalkEvent::Aborted;
        }

        let page_index = self.next_page;
        match self.client.fetch_page(self.config, page_index).await {
            Err(err) => {
                let status = if page_index == 1 {
                    RunStatus::Failure
                } else {
                    RunStatus::PartialFailure
                };
                sync_warn!(
                    "Source {} stopped at page {}: {}",
                    self.ctx.source_id,
                    page_index,
                    err
                );
                self.finish(status, Some((page_index, err)))
            }
            Ok(page) if page.items.is_empty() => self.finish(RunStatus::Success, None),
            Ok(page) => {
                self.pages += 1;
                if !page.has_more {
                    self.pending = Some(WalkSummary {
                        status: RunStatus::Success,
                        pages: self.pages,
                        error: None,
                        cap_reached: false,
                    });
                } else if page_index >= self.max_pages {
                    sync_warn!(
                        "Source {} still reports more after {} pages, stopping",
                        self.ctx.source_id,
                        self.max_pages
                    );
                    self.pending = Some(WalkSummary {
                        status: RunStatus::PartialFailure,
                        pages: self.pages,
                        error: None,
                        cap_reached: true,
                    });
                } else {
                    self.next_page += 1;
                }
                WalkEvent::Page(page)
            }
        }
    }
}

impl PageWalker {
    pub fn new(max_pages: u32) -> Self {
        Self {
            max_pages: max_pages.max(1),
        }
    }

    /// Lazy walk: yields each non-empty page, then exactly one `Finished` or
    /// `Aborted`. Pages are requested one at a time, only when polled, and
    /// cancellation is checked before every request.
    pub fn pages<'a>(
        &self,
        client: &'a dyn SourceClient,
        ctx: &'a RunContext,
        config: &'a SourceConfig,
    ) -> impl Stream<Item = WalkEvent> + Send + 'a {
        let state = WalkState {
            client,
            ctx,
            config,
            max_pages: self.max_pages,
            next_page: 1,
            pages: 0,
            pending: None,
            done: false,
        };
        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let event = state.step().await;
            Some((event, state))
        })
    }

    /// Collects a whole walk. Items from pages before an error are kept.
    pub async fn walk(
        &self,
        client: &dyn SourceClient,
        ctx: &RunContext,
        config: &SourceConfig,
        sink: &dyn ProgressSink,
    ) -> Result<WalkOutcome, RunAborted> {
        let mut items = Vec::new();
        let mut events = pin!(self.pages(client, ctx, config));
        while let Some(event) = events.next().await {
            match event {
                WalkEvent::Page(page) => {
                    sync_debug!(
                        "Source {} page {}: {} items (more: {})",
                        ctx.source_id,
                        page.page,
                        page.items.len(),
                        page.has_more
                    );
                    sink.emit(EngineEvent::PageFetched {
                        source_id: ctx.source_id,
                        page: page.page,
                        items: page.items.len(),
                    });
                    items.extend(page.items);
                }
                WalkEvent::Finished(summary) => return Ok(WalkOutcome { items, summary }),
                WalkEvent::Aborted => {
                    return Err(RunAborted {
                        source_id: ctx.source_id,
                    })
                }
            }
        }
        Err(RunAborted {
            source_id: ctx.source_id,
        })
    }
}
