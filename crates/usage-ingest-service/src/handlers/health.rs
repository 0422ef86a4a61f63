//! Health check and service info handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"healthy"` when storage is reachable, `"unhealthy"` otherwise.
    pub status: String,
    /// Whether the storage engine answered.
    pub database: bool,
    /// Time of the check.
    pub timestamp: DateTime<Utc>,
}

/// Liveness and storage reachability probe.
///
/// Always answers 200; the body says whether storage is reachable.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach storage");
            false
        }
    };

    Json(HealthResponse {
        status: if database { "healthy" } else { "unhealthy" }.to_string(),
        database,
        timestamp: Utc::now(),
    })
}

/// Service info response.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    /// Service name.
    pub service: &'static str,
    /// Service version.
    pub version: &'static str,
    /// Endpoint map.
    pub endpoints: serde_json::Value,
}

/// Service name, version and endpoint map.
pub async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        service: "usage-ingest",
        version: env!("CARGO_PKG_VERSION"),
        endpoints: serde_json::json!({
            "health": "GET /healthz",
            "usage_events": "POST /ingest/requests:bulk",
            "archives": "POST /ingest/archives:bulk",
        }),
    })
}
