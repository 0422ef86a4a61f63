//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{health, ingest};
use crate::state::AppState;

/// Maximum concurrent requests across all ingestion endpoints.
/// Keeps a burst of producers from queueing indefinitely on the pool.
const INGEST_MAX_CONCURRENT_REQUESTS: usize = 64;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /` - Service info
/// - `GET /healthz` - Liveness and storage probe
///
/// ## Ingestion (bearer token, concurrency-limited)
/// - `POST /ingest/requests:bulk` - Usage events
/// - `POST /ingest/archives:bulk` - Message archives
///
/// Ingestion routes are also served under `/api/v1`.
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    let ingest_routes = Router::new()
        .route("/ingest/requests:bulk", post(ingest::ingest_usage_events))
        .route("/ingest/archives:bulk", post(ingest::ingest_archives))
        .layer(GlobalConcurrencyLimitLayer::new(
            INGEST_MAX_CONCURRENT_REQUESTS,
        ));

    Router::new()
        .route("/", get(health::info))
        .route("/healthz", get(health::health))
        .merge(ingest_routes.clone())
        .nest("/api/v1", ingest_routes)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
