//! Exercises `ArchiveClient` against a local axum server speaking the archive API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{Json, Router};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use slackarchive_core::archive::{ArchiveApi, ArchiveClient};
use slackarchive_core::{
    ApiConfig, CoreError, ExportLayout, ExportOptions, Exporter, PagePlan, RuntimeConfig,
};

#[derive(Debug, Clone)]
struct Request {
    path: &'static str,
    referer: Option<String>,
    query: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<Request>>>,
}

impl Recorder {
    fn record(&self, path: &'static str, headers: &HeaderMap, query: &HashMap<String, String>) {
        let referer = headers
            .get("referer")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.requests.lock().expect("lock").push(Request {
            path,
            referer,
            query: query.clone(),
        });
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().expect("lock").clone()
    }
}

async fn team(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    rec.record("/v1/team", &headers, &query);
    match query.get("domain").map(String::as_str) {
        Some("acme") => Json(json!({
            "team": [
                {"team_id": "T1", "name": "Acme", "domain": "acme"},
                {"team_id": "T2", "name": "Shadow"}
            ]
        }))
        .into_response(),
        Some("garbage") => "<html>not json</html>".into_response(),
        _ => Json(json!({"team": []})).into_response(),
    }
}

async fn channels(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    rec.record("/v1/channels", &headers, &query);
    if query.get("team_id").map(String::as_str) == Some("BROKEN") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({
        "channels": [
            {"channel_id": "C1", "name": "general", "members": 3},
            {"channel_id": "C2", "name": ""},
            {"channel_id": "C0", "name": "announcements"}
        ]
    }))
    .into_response()
}

async fn messages(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    rec.record("/v1/messages", &headers, &query);
    let offset: u64 = query
        .get("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or_default();
    let channel = query.get("channel").cloned().unwrap_or_default();
    let count = if channel == "C1" && offset == 0 { 5 } else { 0 };
    let messages: Vec<Value> = (0..count)
        .map(|i| json!({"ts": format!("{}", 100 - i), "user": "U1", "text": format!("hi {i}")}))
        .collect();
    Json(json!({
        "messages": messages,
        "related": {"users": [{"id": "U1", "name": "alice"}]},
        "total": count
    }))
    .into_response()
}

fn router(recorder: &Recorder) -> Router {
    Router::new()
        .route("/v1/team", get(team))
        .route("/v1/channels", get(channels))
        .route("/v1/messages", get(messages))
        .with_state(recorder.clone())
}

async fn serve() -> (String, Recorder) {
    serve_after_dropped_connections(0).await
}

/// Serve the archive after closing the first `dropped` connections unanswered.
async fn serve_after_dropped_connections(dropped: usize) -> (String, Recorder) {
    let recorder = Recorder::default();
    let router = router(&recorder);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        for _ in 0..dropped {
            let (socket, _) = listener.accept().await.expect("accept");
            drop(socket);
        }
        axum::serve(listener, router).await.expect("serve");
    });
    (format!("http://{addr}"), recorder)
}

fn client(base_url: &str) -> ArchiveClient {
    client_with_retries(base_url, 1)
}

fn client_with_retries(base_url: &str, retries: u32) -> ArchiveClient {
    let api = ApiConfig {
        base_url: base_url.to_string(),
        site_host: "slackarchive.io".to_string(),
    };
    let runtime = RuntimeConfig {
        timeout: 5,
        retries,
        retry_backoff_ms: 1,
        fail_fast: false,
    };
    ArchiveClient::new(&api, &runtime).expect("client")
}

#[tokio::test]
async fn fetch_team_returns_first_entry_unchanged() {
    let (base, rec) = serve().await;

    let team = client(&base).fetch_team("acme").await.expect("team");

    assert_eq!(
        team.0,
        json!({"team_id": "T1", "name": "Acme", "domain": "acme"})
    );
    let requests = rec.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/v1/team");
    assert_eq!(requests[0].query.get("domain").map(String::as_str), Some("acme"));
    assert_eq!(
        requests[0].referer.as_deref(),
        Some("https://acme.slackarchive.io/")
    );
}

#[tokio::test]
async fn empty_team_array_is_not_found() {
    let (base, _rec) = serve().await;

    let err = client(&base).fetch_team("nobody").await.expect_err("no team");
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn non_json_body_is_an_api_error() {
    let (base, _rec) = serve().await;

    let err = client(&base).fetch_team("garbage").await.expect_err("bad body");
    assert!(matches!(err, CoreError::Api(_)));
}

#[tokio::test]
async fn fetch_channels_preserves_order() {
    let (base, rec) = serve().await;

    let channels = client(&base)
        .fetch_channels("acme", "T1")
        .await
        .expect("channels");

    let ids: Vec<&str> = channels
        .iter()
        .filter_map(|c| c.channel_id().ok())
        .collect();
    assert_eq!(ids, vec!["C1", "C2", "C0"]);
    assert_eq!(channels[0].0["members"], json!(3));
    assert_eq!(
        rec.requests()[0].query.get("team_id").map(String::as_str),
        Some("T1")
    );
}

#[tokio::test]
async fn error_status_is_an_api_error_and_not_retried() {
    let (base, rec) = serve().await;

    let err = client(&base)
        .fetch_channels("acme", "BROKEN")
        .await
        .expect_err("500");

    assert!(matches!(err, CoreError::Api(ref msg) if msg.contains("500")));
    assert_eq!(rec.requests().len(), 1);
}

#[tokio::test]
async fn fetch_messages_sends_page_parameters() {
    let (base, rec) = serve().await;

    let page = client(&base)
        .fetch_messages("acme", "T1", "C1", 100, 0)
        .await
        .expect("page");

    assert_eq!(page.messages().len(), 5);
    assert_eq!(page.related_users().len(), 1);
    assert_eq!(page.0["total"], json!(5));

    let requests = rec.requests();
    let query = &requests[0].query;
    assert_eq!(query.get("size").map(String::as_str), Some("100"));
    assert_eq!(query.get("team").map(String::as_str), Some("T1"));
    assert_eq!(query.get("channel").map(String::as_str), Some("C1"));
    assert_eq!(query.get("offset").map(String::as_str), Some("0"));
}

#[tokio::test]
async fn unreachable_archive_is_a_network_error_after_retries() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let err = client(&format!("http://{addr}"))
        .fetch_team("acme")
        .await
        .expect_err("nothing listens");
    assert!(err.is_retryable());
}

#[tokio::test]
async fn dropped_connections_are_retried_up_to_the_limit() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    tokio::spawn(async move {
        loop {
            let (socket, _) = listener.accept().await.expect("accept");
            counter.fetch_add(1, Ordering::SeqCst);
            drop(socket);
        }
    });

    let err = client_with_retries(&format!("http://{addr}"), 2)
        .fetch_team("acme")
        .await
        .expect_err("every connection is dropped");

    assert!(matches!(err, CoreError::Network(_)));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn request_succeeding_on_a_later_attempt_is_ok() {
    let (base, rec) = serve_after_dropped_connections(2).await;

    let team = client_with_retries(&base, 2)
        .fetch_team("acme")
        .await
        .expect("third attempt answers");

    assert_eq!(team.team_id().expect("team id"), "T1");
    assert_eq!(rec.requests().len(), 1);
}

#[tokio::test]
async fn retries_stop_when_the_limit_is_reached() {
    let (base, rec) = serve_after_dropped_connections(2).await;

    let err = client_with_retries(&base, 1)
        .fetch_team("acme")
        .await
        .expect_err("only two attempts allowed");

    assert!(err.is_retryable());
    assert!(rec.requests().is_empty());
}

#[tokio::test]
async fn export_over_http_writes_expected_artifacts() {
    let (base, rec) = serve().await;
    let dir = tempfile::tempdir().expect("tempdir");
    let api = client(&base);
    let layout = ExportLayout::new(dir.path(), "channel.json");
    let options = ExportOptions {
        write_users: true,
        ..ExportOptions::default()
    };

    let summary = Exporter::new(&api, layout, PagePlan::default(), options)
        .run("acme", |_| {})
        .await
        .expect("export");

    assert_eq!(summary.reports.len(), 2);
    let general: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("messages/general.json")).expect("read"),
    )
    .expect("json");
    assert_eq!(general.as_array().map(Vec::len), Some(5));
    assert!(dir.path().join("messages/announcements.json").exists());
    assert!(dir.path().join("users/general.json").exists());

    let channel_list = std::fs::read_to_string(dir.path().join("channel.json")).expect("read");
    assert!(channel_list.starts_with("[\n    {\n        \"channel_id\": \"C1\""));

    // general: one full page then an empty one; announcements: one empty page
    let pages: Vec<(String, String)> = rec
        .requests()
        .iter()
        .filter(|r| r.path == "/v1/messages")
        .map(|r| (r.query["channel"].clone(), r.query["offset"].clone()))
        .collect();
    assert_eq!(
        pages,
        vec![
            ("C1".to_string(), "0".to_string()),
            ("C1".to_string(), "100".to_string()),
            ("C0".to_string(), "0".to_string()),
        ]
    );
    assert!(
        rec.requests()
            .iter()
            .all(|r| r.referer.as_deref() == Some("https://acme.slackarchive.io/"))
    );
}
