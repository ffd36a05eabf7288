//! Integration tests for the dual-mode execution model: the same route
//! table served live and captured to disk by the snapshot builder.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::response::IntoResponse;
use tokio::task::JoinHandle;

use mocklite::build::{self, BuildSummary};
use mocklite::registry::{file, RouteMethod, RouteTable};
use mocklite::render::MarkdownRenderer;
use mocklite::server::session::SessionStore;
use mocklite::server::{build_router, ServerEnv};

/// Serve a route table on an ephemeral port.
async fn spawn_server(table: &RouteTable) -> (u16, JoinHandle<std::io::Result<()>>) {
    let env = ServerEnv::new(
        SessionStore::new(Duration::from_secs(60)),
        Arc::new(MarkdownRenderer::with_css("")),
        Duration::ZERO,
        0,
    );
    let router = build_router(table, env);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move { axum::serve(listener, router).await });

    (port, handle)
}

fn demo_table(dest_dir: &Path) -> RouteTable {
    let mut table = RouteTable::new();
    table
        .route(RouteMethod::Get, "/api/greeting", |_ctx| async {
            axum::Json(serde_json::json!({"message": "hello"})).into_response()
        })
        .unwrap();
    table
        .route(RouteMethod::Get, "/api/plain", |_ctx| async {
            "plain text response".into_response()
        })
        .unwrap();
    table
        .capture(
            RouteMethod::Get,
            "/api/greeting",
            dest_dir.join("api/greeting.json"),
        )
        .unwrap();
    table
        .capture(RouteMethod::Get, "/api/plain", dest_dir.join("plain.txt"))
        .unwrap();
    table
}

#[tokio::test]
async fn captured_bytes_equal_live_response() {
    let out = tempfile::tempdir().unwrap();
    let table = demo_table(out.path());
    let (port, server) = spawn_server(&table).await;

    let client = reqwest::Client::new();

    // what a live client sees
    let live = client
        .get(format!("http://127.0.0.1:{port}/api/greeting"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();

    // what the builder writes
    let outcomes = build::run(&table, port, &client).await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let captured = std::fs::read(out.path().join("api/greeting.json")).unwrap();
    assert_eq!(&captured[..], &live[..]);

    let captured = std::fs::read(out.path().join("plain.txt")).unwrap();
    assert_eq!(&captured[..], b"plain text response");

    server.abort();
}

#[tokio::test]
async fn build_pass_settles_every_target() {
    let out = tempfile::tempdir().unwrap();
    let mut table = demo_table(out.path());
    // a target with no matching route: captures the 404 body, still settles
    table
        .capture(RouteMethod::Get, "/missing", out.path().join("missing.txt"))
        .unwrap();

    let (port, server) = spawn_server(&table).await;
    let client = reqwest::Client::new();

    let outcomes = build::run(&table, port, &client).await;
    assert_eq!(outcomes.len(), table.build_targets().len());

    // the unregistered route degrades to its 404 body on disk
    let missing = std::fs::read(out.path().join("missing.txt")).unwrap();
    assert_eq!(&missing[..], b"Route not defined");

    server.abort();
}

#[tokio::test]
async fn capture_failure_does_not_disturb_siblings() {
    let out = tempfile::tempdir().unwrap();
    let mut table = demo_table(out.path());
    // writing to the tempdir itself fails: it is a directory
    table
        .capture(RouteMethod::Get, "/api/greeting", out.path())
        .unwrap();

    let (port, server) = spawn_server(&table).await;
    let client = reqwest::Client::new();

    let outcomes = build::run(&table, port, &client).await;
    let summary = BuildSummary::of(&outcomes);

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.written, 2);
    assert!(out.path().join("api/greeting.json").exists());
    assert!(out.path().join("plain.txt").exists());

    server.abort();
}

#[tokio::test]
async fn entrypoint_file_round_trips_through_build() {
    let data = tempfile::tempdir().unwrap();
    std::fs::write(data.path().join("payload.json"), br#"{"ok":true}"#).unwrap();
    std::fs::write(
        data.path().join("api.toml"),
        r#"
        [[route]]
        path = "/api/payload"
        file = "payload.json"

        [[build]]
        path = "/api/payload"
        out = "static/payload.json"
        "#,
    )
    .unwrap();

    let table = file::load(&data.path().join("api.toml")).unwrap();
    let (port, server) = spawn_server(&table).await;
    let client = reqwest::Client::new();

    let live = client
        .get(format!("http://127.0.0.1:{port}/api/payload"))
        .send()
        .await
        .unwrap();
    assert_eq!(
        live.headers().get("content-type").unwrap(),
        "application/json"
    );
    let live = live.bytes().await.unwrap();

    let outcomes = build::run(&table, port, &client).await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    let captured = std::fs::read(data.path().join("static/payload.json")).unwrap();
    assert_eq!(&captured[..], &live[..]);
    assert_eq!(&captured[..], br#"{"ok":true}"#);

    server.abort();
}

#[tokio::test]
async fn convenience_routes_can_be_captured_too() {
    let out = tempfile::tempdir().unwrap();
    let mut table = RouteTable::new();
    table
        .capture(RouteMethod::Get, "/-/418", out.path().join("teapot.txt"))
        .unwrap();

    let (port, server) = spawn_server(&table).await;
    let client = reqwest::Client::new();

    let outcomes = build::run(&table, port, &client).await;
    assert_eq!(outcomes.len(), 1);
    // 418 is an error status but the body is still captured verbatim
    assert!(outcomes[0].result.is_ok());

    let body = std::fs::read_to_string(out.path().join("teapot.txt")).unwrap();
    assert_eq!(body, "I'm a teapot");

    server.abort();
}
