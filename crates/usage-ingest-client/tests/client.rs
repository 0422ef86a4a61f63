//! Client integration tests against a mock ingestion service.

use std::io::Read;

use flate2::read::GzDecoder;
use serde_json::{json, Value};
use usage_ingest_client::{
    ArchiveInput, ClientError, ClientOptions, IngestClient, UsageEventInput,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "client-test-token";

fn plain_client(server: &MockServer) -> IngestClient {
    let options = ClientOptions {
        compress: false,
        ..ClientOptions::default()
    };
    IngestClient::with_options(server.uri(), TOKEN, options).unwrap()
}

fn event() -> UsageEventInput {
    UsageEventInput::new("user_1", "platform", "chat", "openai", "gpt-4o").with_tokens(42)
}

#[tokio::test]
async fn ingest_usage_events_posts_bulk_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest/requests:bulk"))
        .and(header("authorization", format!("Bearer {TOKEN}").as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accepted": 1, "rejected": 0, "errors": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = plain_client(&server);
    let sent = event();
    let response = client.ingest_usage_events(&[sent.clone()]).await.unwrap();

    assert_eq!(response.accepted, 1);
    assert_eq!(response.rejected, 0);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["items"][0]["event_id"], sent.event_id.as_str());
    assert_eq!(body["items"][0]["total_tokens"], 42);
    assert!(body["items"][0].get("latency_ms").is_none());
}

#[tokio::test]
async fn compressed_bodies_are_gzip_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ingest/archives:bulk"))
        .and(header("content-encoding", "gzip"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"accepted": 1, "rejected": 0, "errors": []})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = IngestClient::new(server.uri(), TOKEN).unwrap();
    let archive = ArchiveInput::for_event(&event(), "prompt", "response");
    client.ingest_archives(&[archive.clone()]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let mut decoded = String::new();
    GzDecoder::new(requests[0].body.as_slice())
        .read_to_string(&mut decoded)
        .unwrap();
    let body: Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(body["items"][0]["event_id"], archive.event_id.as_str());
    assert_eq!(body["items"][0]["prompt_full"], "prompt");
}

#[tokio::test]
async fn partial_acceptance_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accepted": 1,
            "rejected": 1,
            "errors": ["Event abc: status_code must be between 100 and 599"]
        })))
        .mount(&server)
        .await;

    let client = plain_client(&server);
    let response = client
        .ingest_usage_events(&[event(), event()])
        .await
        .unwrap();

    assert_eq!(response.accepted, 1);
    assert_eq!(response.rejected, 1);
    assert_eq!(response.errors.len(), 1);
}

#[tokio::test]
async fn api_errors_carry_code_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "forbidden", "message": "invalid token"}
        })))
        .mount(&server)
        .await;

    let client = plain_client(&server);
    let err = client.ingest_usage_events(&[event()]).await.unwrap_err();

    match err {
        ClientError::Api {
            ref code, status, ..
        } => {
            assert_eq!(code, "forbidden");
            assert_eq!(status, 403);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unparseable_error_body_falls_back_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let client = plain_client(&server);
    let err = client.ingest_archives(&[]).await.unwrap_err();

    match err {
        ClientError::Api {
            ref code, status, ..
        } => {
            assert_eq!(code, "unknown");
            assert_eq!(status, 502);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn health_parses_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "unhealthy",
            "database": false,
            "timestamp": "2026-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = plain_client(&server);
    let health = client.health().await.unwrap();

    assert!(!health.is_healthy());
    assert!(!health.database);
}
