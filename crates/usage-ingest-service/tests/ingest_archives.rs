//! Message archive ingestion integration tests.

mod common;

use axum::http::StatusCode;
use common::{archive, bulk, gzip, now_epoch, TestHarness};
use serde_json::{json, Value};

use usage_ingest_core::EventId;

const PATH: &str = "/ingest/archives:bulk";

async fn post(harness: &TestHarness, body: &Value) -> axum_test::TestResponse {
    harness
        .server
        .post(PATH)
        .add_header("authorization", TestHarness::auth_header())
        .json(body)
        .await
}

#[tokio::test]
async fn archives_are_stored() {
    let harness = TestHarness::new();
    let item = archive();
    let event_id: EventId = item["event_id"].as_str().unwrap().parse().unwrap();

    let response = post(&harness, &bulk(vec![item, archive(), archive()])).await;

    response.assert_status_ok();
    response.assert_json(&json!({"accepted": 3, "rejected": 0, "errors": []}));

    let stored = harness.store.archive(&event_id).unwrap();
    assert_eq!(stored.prompt_full.as_deref(), Some("What is the capital of France?"));
    assert_eq!(stored.response_full.as_deref(), Some("Paris."));
}

#[tokio::test]
async fn archive_without_usage_event_is_accepted() {
    let harness = TestHarness::new();

    let body: Value = post(&harness, &bulk(vec![archive()])).await.json();

    assert_eq!(body["accepted"], 1);
    assert_eq!(harness.store.usage_event_count(), 0);
}

#[tokio::test]
async fn resubmitted_archives_are_absorbed() {
    let harness = TestHarness::new();
    let batch = bulk(vec![archive(), archive()]);

    let first: Value = post(&harness, &batch).await.json();
    let second: Value = post(&harness, &batch).await.json();

    assert_eq!(first["accepted"], 2);
    assert_eq!(second["accepted"], 0);
    assert_eq!(second["rejected"], 2);
    assert_eq!(harness.store.archive_count(), 2);
}

#[tokio::test]
async fn oversized_text_is_rejected_per_item() {
    let harness = TestHarness::new();
    let mut big = archive();
    big["response_full"] = json!("r".repeat(50_001));
    let big_id = big["event_id"].as_str().unwrap().to_string();

    let body: Value = post(&harness, &bulk(vec![archive(), big])).await.json();

    assert_eq!(body["accepted"], 1);
    assert_eq!(body["rejected"], 1);
    assert_eq!(
        body["errors"],
        json!([format!("Archive {big_id}: response_full exceeds 50000 characters")])
    );
}

#[tokio::test]
async fn far_future_archive_is_rejected() {
    let harness = TestHarness::new();
    let mut item = archive();
    item["stored_at"] = json!(now_epoch() + 2 * 3600);

    let body: Value = post(&harness, &bulk(vec![item])).await.json();

    assert_eq!(body["accepted"], 0);
    assert_eq!(body["rejected"], 1);
}

#[tokio::test]
async fn bad_archive_is_isolated_on_write() {
    let harness = TestHarness::new();
    let mut bad = archive();
    bad["prompt_full"] = json!("nul \u{0} here");
    let bad_id = bad["event_id"].as_str().unwrap().to_string();

    let body: Value = post(&harness, &bulk(vec![archive(), bad, archive()])).await.json();

    assert_eq!(body["accepted"], 2);
    assert_eq!(body["rejected"], 1);
    assert!(body["errors"][0]
        .as_str()
        .unwrap()
        .starts_with(&format!("Archive {bad_id}: ")));
}

#[tokio::test]
async fn gzip_archives_are_accepted() {
    let harness = TestHarness::new();
    let body = serde_json::to_vec(&bulk(vec![archive(), archive()])).unwrap();

    let response = harness
        .server
        .post("/api/v1/ingest/archives:bulk")
        .add_header("authorization", TestHarness::auth_header())
        .add_header("content-encoding", "gzip")
        .bytes(gzip(&body).into())
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["accepted"], 2);
}

#[tokio::test]
async fn archive_batch_over_limit_is_rejected() {
    let harness = TestHarness::with_config(|c| c.max_bulk_size = 5);
    let items = (0..6).map(|_| archive()).collect();

    let response = post(&harness, &bulk(items)).await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["error"]["details"], json!({"count": 6, "limit": 5}));
}
