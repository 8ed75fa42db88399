//! Integration tests for the client delivery protocol.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::TestHarness;
use lc_core::Segment;

fn segment_file(dir: &std::path::Path, index: usize, body: &str) -> Arc<Segment> {
    let path = dir.join(format!("{index}.webm"));
    std::fs::write(&path, body).unwrap();
    Arc::new(Segment {
        source: dir.join("demo-live/clip.mp4"),
        index,
        path,
        duration: Duration::from_secs(2),
    })
}

#[tokio::test]
async fn register_returns_session_id() {
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let id = h.register(&client).await;
    let parsed: lc_core::SessionId = id.parse().expect("session id is a uuid");
    assert!(h.ctx.registry.lookup(&parsed).is_ok());
}

#[tokio::test]
async fn each_registration_is_distinct() {
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let a = h.register(&client).await;
    let b = h.register(&client).await;
    assert_ne!(a, b);
    assert_eq!(h.ctx.registry.len(), 2);
}

#[tokio::test]
async fn unknown_session_is_forbidden() {
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(h.url("/next"))
        .body(lc_core::SessionId::new().to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "forbidden");
}

#[tokio::test]
async fn garbage_session_is_forbidden() {
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(h.url("/next"))
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn drained_queue_is_empty_success() {
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let id = h.register(&client).await;

    let resp = client.post(h.url("/next")).body(id).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    assert!(resp.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn segments_are_delivered_in_broadcast_order() {
    let dir = tempfile::tempdir().unwrap();
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    let id = h.register(&client).await;

    for i in 0..3 {
        h.ctx
            .registry
            .broadcast(segment_file(dir.path(), i, &format!("chunk-{i}")));
    }

    for i in 0..3 {
        let resp = client
            .post(h.url("/next"))
            .body(id.clone())
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "video/webm");
        assert_eq!(resp.text().await.unwrap(), format!("chunk-{i}"));
    }

    let resp = client.post(h.url("/next")).body(id).send().await.unwrap();
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn late_registration_starts_with_latest_segment() {
    let dir = tempfile::tempdir().unwrap();
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();

    h.ctx.registry.broadcast(segment_file(dir.path(), 0, "old"));
    h.ctx.registry.broadcast(segment_file(dir.path(), 1, "current"));

    let id = h.register(&client).await;
    let resp = client
        .post(h.url("/next"))
        .body(id.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "current");

    let resp = client.post(h.url("/next")).body(id).send().await.unwrap();
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn status_reports_sessions() {
    let h = TestHarness::with_server().await;
    let client = reqwest::Client::new();
    h.register(&client).await;
    h.register(&client).await;

    let status: serde_json::Value = client
        .get(h.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["sessions"], 2);
    assert_eq!(status["broadcasts"], 0);
    assert!(status["latest"].is_null());
}

#[tokio::test]
async fn health_endpoint() {
    let h = TestHarness::with_server().await;
    let resp = reqwest::get(h.url("/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}
