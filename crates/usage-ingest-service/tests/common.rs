//! Common test utilities for usage-ingest integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::io::Write;
use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};

use usage_ingest_core::EventId;
use usage_ingest_service::{create_router, AppState, ServiceConfig};
use usage_ingest_store::MemoryStore;

/// Bearer token configured on every test server.
pub const TOKEN: &str = "test-analytics-token";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for assertions and outage simulation.
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a new test harness with an empty store.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness after adjusting the default test configuration.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            database_url: "memory://".into(),
            analytics_token: TOKEN.into(),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, store }
    }

    /// Authorization header value carrying the configured token.
    pub fn auth_header() -> String {
        format!("Bearer {TOKEN}")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time as epoch seconds.
pub fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}

/// A valid usage event item, timestamped `offset_secs` from now.
pub fn usage_event(offset_secs: i64) -> Value {
    json!({
        "event_id": EventId::generate().to_string(),
        "event_time_epoch": now_epoch() + offset_secs,
        "user_id": "user_1",
        "team": "platform",
        "service": "chat_completion",
        "provider": "openai",
        "model": "gpt-4o",
        "total_tokens": 150,
        "latency_ms": 820,
        "status_code": 200,
    })
}

/// `n` valid usage event items.
pub fn usage_events(n: usize) -> Vec<Value> {
    (0..n).map(|_| usage_event(-60)).collect()
}

/// A valid message archive item.
pub fn archive() -> Value {
    json!({
        "event_id": EventId::generate().to_string(),
        "user_id": "user_1",
        "service": "chat_completion",
        "prompt_full": "What is the capital of France?",
        "response_full": "Paris.",
        "stored_at": now_epoch(),
    })
}

/// Wrap items into a bulk request body.
pub fn bulk(items: Vec<Value>) -> Value {
    json!({ "items": items })
}

/// gzip-compress a byte slice.
pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}
