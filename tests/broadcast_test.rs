//! End-to-end tests: the running channel delivering to HTTP clients.

mod common;

use std::time::Duration;

use common::TestHarness;

/// Poll `next` until `count` payloads have been received.
async fn collect(h: &TestHarness, client: &reqwest::Client, id: &str, count: usize) -> Vec<String> {
    let mut payloads = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);

    while payloads.len() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "only received {} of {count} segments",
            payloads.len()
        );
        let resp = client
            .post(h.url("/next"))
            .body(id.to_string())
            .send()
            .await
            .unwrap();
        match resp.status().as_u16() {
            200 => payloads.push(resp.text().await.unwrap()),
            204 => tokio::time::sleep(Duration::from_millis(20)).await,
            other => panic!("unexpected status {other}"),
        }
    }
    payloads
}

fn index_of(payload: &str) -> usize {
    payload
        .strip_prefix("segment ")
        .and_then(|rest| rest.split(' ').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or_else(|| panic!("unexpected payload {payload:?}"))
}

#[tokio::test]
async fn client_receives_contiguous_stream() {
    // 1s source in 0.25s segments: indices 0..4, then the source repeats.
    let h = TestHarness::with_channel(1.0, 0.25).await;
    let client = reqwest::Client::new();
    let id = h.register(&client).await;

    let payloads = collect(&h, &client, &id, 6).await;
    let indices: Vec<usize> = payloads.iter().map(|p| index_of(p)).collect();
    for pair in indices.windows(2) {
        assert_eq!(pair[1], (pair[0] + 1) % 4, "gap in {indices:?}");
    }
    let source = h.library[0].display().to_string();
    assert!(payloads.iter().all(|p| p.contains(&source)));

    h.shutdown().await;
}

#[tokio::test]
async fn clients_share_the_same_broadcast() {
    let h = TestHarness::with_channel(1.0, 0.25).await;
    let client = reqwest::Client::new();
    let first = h.register(&client).await;
    let second = h.register(&client).await;

    let a = collect(&h, &client, &first, 6).await;
    let b = collect(&h, &client, &second, 3).await;

    let start = a
        .iter()
        .position(|p| p == &b[0])
        .expect("second client saw a segment the first never got");
    assert_eq!(&a[start..start + 3], &b[..]);

    h.shutdown().await;
}

#[tokio::test]
async fn ticks_follow_segment_duration() {
    let h = TestHarness::with_channel(2.0, 0.5).await;
    let client = reqwest::Client::new();
    let id = h.register(&client).await;

    collect(&h, &client, &id, 1).await;
    let started = std::time::Instant::now();
    collect(&h, &client, &id, 3).await;
    // Three more ticks cannot arrive faster than three 0.5s segments
    // (minus the part of the first interval already elapsed).
    assert!(started.elapsed() >= Duration::from_millis(1000));

    h.shutdown().await;
}

#[tokio::test]
async fn status_reflects_running_pipeline() {
    let h = TestHarness::with_channel(1.0, 0.25).await;
    let client = reqwest::Client::new();
    let id = h.register(&client).await;
    collect(&h, &client, &id, 2).await;

    let status: serde_json::Value = client
        .get(h.url("/api/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(status["broadcasts"].as_u64().unwrap() >= 2);
    assert_eq!(status["prefetch"]["lookahead"], 2);
    assert_eq!(status["latest"]["content_type"], "video/webm");
    assert!(status["latest"]["source"]
        .as_str()
        .unwrap()
        .ends_with("demo-live/clip.mp4"));

    h.shutdown().await;
}
