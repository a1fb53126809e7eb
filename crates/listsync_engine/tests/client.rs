use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use listsync_core::{ProviderKind, SourceConfig};
use listsync_engine::{
    FailureKind, FetchSettings, GoodreadsClient, RawItem, SourceClient, StaticCredentials,
};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer) -> FetchSettings {
    FetchSettings {
        base_url: server.uri(),
        requests_per_second: 1000,
        ..FetchSettings::default()
    }
}

fn client_with(settings: FetchSettings, tokens: &[(&str, &str)]) -> GoodreadsClient {
    let tokens: BTreeMap<String, String> = tokens
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    GoodreadsClient::new(settings, Arc::new(StaticCredentials::new(tokens))).expect("client")
}

fn owned_config(auth_ref: Option<&str>) -> SourceConfig {
    SourceConfig {
        id: 1,
        name: "Owned".to_string(),
        provider: ProviderKind::GoodreadsOwnedBooks,
        auth_ref: auth_ref.map(str::to_string),
        user_id: "1234".to_string(),
        enabled: true,
        defaults: Default::default(),
    }
}

#[tokio::test]
async fn owned_books_page_is_decoded_with_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned_books/user"))
        .and(query_param("id", "1234"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "start": 1,
            "end": 2,
            "total": 3,
            "items": [
                { "book": { "id": 42, "title": "A (S, #1)", "authors": [{ "id": 7, "name": "X" }] } },
                { "book": { "id": 43, "title": "B", "authors": [] } }
            ]
        })))
        .mount(&server)
        .await;

    let client = client_with(settings(&server), &[("goodreads", "secret")]);
    let page = client
        .fetch_page(&owned_config(Some("goodreads")), 1)
        .await
        .expect("page");

    assert_eq!(page.page, 1);
    assert!(page.has_more);
    assert_eq!(page.items.len(), 2);
    match &page.items[0] {
        RawItem::OwnedBook(owned) => {
            assert_eq!(owned.book.id, Some(42));
            assert_eq!(owned.book.authors[0].name.as_deref(), Some("X"));
        }
        other => panic!("unexpected item {other:?}"),
    }
}

#[tokio::test]
async fn last_page_reports_no_more() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/owned_books/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "start": 1, "end": 1, "total": 1,
            "items": [{ "book": { "id": 1, "title": "T", "authors": [{ "id": 2, "name": "N" }] } }]
        })))
        .mount(&server)
        .await;

    let client = client_with(settings(&server), &[]);
    let page = client.fetch_page(&owned_config(None), 1).await.unwrap();
    assert!(!page.has_more);
}

#[tokio::test]
async fn shelf_route_carries_user_and_shelf() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/review/list/1234"))
        .and(query_param("shelf", "to-read"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{ "book": { "id": 5, "title": "T", "authors": [{ "id": 6, "name": "N" }] },
                        "rating": 4, "shelves": ["to-read"] }]
        })))
        .mount(&server)
        .await;

    let config = SourceConfig {
        provider: ProviderKind::GoodreadsBookshelf {
            shelf: "to-read".to_string(),
        },
        ..owned_config(None)
    };
    let client = client_with(settings(&server), &[]);
    let page = client.fetch_page(&config, 2).await.unwrap();

    assert!(page.has_more, "no totals and a non-empty page means keep going");
    assert!(matches!(&page.items[0], RawItem::Review(review) if review.rating == Some(4)));
}

#[tokio::test]
async fn rejected_credentials_are_auth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_with(settings(&server), &[("goodreads", "stale")]);
    let err = client
        .fetch_page(&owned_config(Some("goodreads")), 1)
        .await
        .unwrap_err();
    assert!(err.is_auth());
}

#[tokio::test]
async fn missing_credential_fails_before_request() {
    let server = MockServer::start().await;
    let client = client_with(settings(&server), &[]);
    let err = client
        .fetch_page(&owned_config(Some("nowhere")), 1)
        .await
        .unwrap_err();
    assert_eq!(err.kind, FailureKind::Auth);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
        .mount(&server)
        .await;

    let client = client_with(settings(&server), &[]);
    let err = client.fetch_page(&owned_config(None), 1).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::RateLimited {
            retry_after_secs: Some(120)
        }
    );
    assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
}

#[tokio::test]
async fn server_errors_and_bad_bodies_are_transport_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = client_with(settings(&server), &[]);
    let first = client.fetch_page(&owned_config(None), 1).await.unwrap_err();
    assert_eq!(first.kind, FailureKind::HttpStatus(503));
    let second = client.fetch_page(&owned_config(None), 2).await.unwrap_err();
    assert_eq!(second.kind, FailureKind::InvalidResponse);
}

#[tokio::test]
async fn slow_pages_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(json!({ "items": [] })),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..settings(&server)
    };
    let client = client_with(settings, &[]);
    let err = client.fetch_page(&owned_config(None), 1).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn oversized_pages_are_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_page_bytes: 10,
        ..settings(&server)
    };
    let client = client_with(settings, &[]);
    let err = client.fetch_page(&owned_config(None), 1).await.unwrap_err();
    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 10, .. }));
}
