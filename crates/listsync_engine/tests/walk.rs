use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Once};

use chrono::{TimeZone, Utc};
use listsync_core::{
    BackoffPolicy, IntentAction, LibraryState, ListHealthTracker, ProviderKind, RunStatus,
    SourceConfig,
};
use listsync_engine::{
    EngineEvent, EngineSettings, FetchSettings, GoodreadsClient, NoopSink, PageWalker,
    ProgressSink, RunContext, StaticCredentials, SyncEngine, SyncOptions,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(sync_logging::initialize_for_tests);
}

#[derive(Default)]
struct TestSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl TestSink {
    fn take(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for TestSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn book(author_id: u64, author: &str, edition_id: u64, title: &str) -> Value {
    json!({ "book": {
        "id": edition_id,
        "title": title,
        "authors": [{ "id": author_id, "name": author }]
    }})
}

async fn mount_page(server: &MockServer, page: u32, status: u16, body: Value) {
    Mock::given(method("GET"))
        .and(path("/owned_books/user"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> Arc<GoodreadsClient> {
    let settings = FetchSettings {
        base_url: server.uri(),
        requests_per_second: 1000,
        ..FetchSettings::default()
    };
    let credentials = Arc::new(StaticCredentials::new(BTreeMap::new()));
    Arc::new(GoodreadsClient::new(settings, credentials).unwrap())
}

fn config() -> SourceConfig {
    SourceConfig {
        id: 1,
        name: "Owned".to_string(),
        provider: ProviderKind::GoodreadsOwnedBooks,
        auth_ref: None,
        user_id: "u1".to_string(),
        enabled: true,
        defaults: Default::default(),
    }
}

#[tokio::test]
async fn walk_stops_at_empty_page_and_concatenates() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(&server, 1, 200, json!({ "items": [book(1, "A1", 11, "B1")] })).await;
    mount_page(&server, 2, 200, json!({ "items": [book(1, "A1", 12, "B2")] })).await;
    mount_page(&server, 3, 200, json!({ "items": [] })).await;

    let client = client(&server);
    let ctx = RunContext::new(1, CancellationToken::new());
    let sink = TestSink::default();
    let outcome = PageWalker::default()
        .walk(client.as_ref(), &ctx, &config(), &sink)
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 2);
    assert_eq!(outcome.summary.status, RunStatus::Success);
    assert_eq!(outcome.summary.pages, 2);
    let pages: Vec<u32> = sink
        .take()
        .into_iter()
        .filter_map(|event| match event {
            EngineEvent::PageFetched { page, .. } => Some(page),
            _ => None,
        })
        .collect();
    assert_eq!(pages, vec![1, 2]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn one_author_two_editions_adds_author_once() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        200,
        json!({ "items": [book(1, "A1", 11, "B1"), book(1, "A1", 12, "B2")] }),
    )
    .await;
    mount_page(&server, 2, 200, json!({ "items": [] })).await;

    let engine = SyncEngine::new(client(&server), EngineSettings::default());
    let mut tracker = ListHealthTracker::new(BackoffPolicy::default());
    let report = engine
        .sync(
            &[config()],
            &LibraryState::new(),
            &mut tracker,
            SyncOptions::at(Utc::now()),
            &CancellationToken::new(),
            &NoopSink,
        )
        .await
        .unwrap();

    let actions: Vec<IntentAction> = report.intents.iter().map(|i| i.action).collect();
    assert_eq!(
        actions,
        vec![
            IntentAction::AddAuthor,
            IntentAction::AddBook,
            IntentAction::AddBook
        ]
    );
    assert_eq!(report.intents[1].item.book_title, "B1");
    assert_eq!(report.intents[2].item.book_title, "B2");
}

#[tokio::test]
async fn later_page_error_keeps_earlier_pages() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        200,
        json!({ "items": [book(1, "A1", 11, "B1"), book(2, "A2", 21, "B3")] }),
    )
    .await;
    mount_page(&server, 2, 500, json!({})).await;

    let engine = SyncEngine::new(client(&server), EngineSettings::default());
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let mut tracker = ListHealthTracker::new(BackoffPolicy::default());
    tracker.record(
        &listsync_core::SourceRunResult::failure(1, "earlier failure"),
        now,
    );

    let report = engine
        .sync(
            &[config()],
            &LibraryState::new(),
            &mut tracker,
            SyncOptions {
                now,
                ignore_backoff: true,
            },
            &CancellationToken::new(),
            &NoopSink,
        )
        .await
        .unwrap();

    let result = &report.results[0];
    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.items_fetched, 2);
    assert!(result.error_detail.as_deref().unwrap().starts_with("page 2"));
    assert_eq!(report.items.len(), 2);

    let health = tracker.get(1).unwrap();
    assert_eq!(health.consecutive_failures, 0);
    assert_eq!(health.backoff_until, None);
}

#[tokio::test]
async fn first_page_error_fails_the_source() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(&server, 1, 502, json!({})).await;

    let engine = SyncEngine::new(client(&server), EngineSettings::default());
    let ctx = RunContext::new(1, CancellationToken::new());
    let run = engine.run_config(&config(), &ctx, &NoopSink).await.unwrap();

    assert_eq!(run.result.status, RunStatus::Failure);
    assert_eq!(run.result.items_fetched, 0);
    assert!(run.items.is_empty());
    assert_eq!(
        run.result.error_detail.as_deref(),
        Some("page 1: http status 502: 502 Bad Gateway")
    );
}

#[tokio::test]
async fn malformed_items_are_dropped_not_fatal() {
    init_logging();
    let server = MockServer::start().await;
    mount_page(
        &server,
        1,
        200,
        json!({ "items": [
            { "book": { "id": 1, "title": "No author", "authors": [] } },
            book(3, "A3", 31, "Kept  Title (Saga, #4)")
        ] }),
    )
    .await;
    mount_page(&server, 2, 200, json!({ "items": [] })).await;

    let engine = SyncEngine::new(client(&server), EngineSettings::default());
    let ctx = RunContext::new(1, CancellationToken::new());
    let run = engine.run_config(&config(), &ctx, &NoopSink).await.unwrap();

    assert_eq!(run.result.status, RunStatus::Success);
    assert_eq!(run.result.items_fetched, 2);
    assert_eq!(run.result.items_after_dedup, 1);
    assert_eq!(run.items[0].book_title, "Kept Title");
}
