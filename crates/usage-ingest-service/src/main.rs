//! Usage-ingest service - bulk ingestion of LLM usage telemetry.
//!
//! This is the main entry point for the usage-ingest service.

use std::sync::Arc;

use usage_ingest_service::{create_router, telemetry, AppState, ServiceConfig};
use usage_ingest_store::{schema, PgStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment
    let (config, warnings) = ServiceConfig::from_env()?;

    telemetry::init(config.log_format);

    for warning in &warnings {
        tracing::warn!(
            variable = warning.variable,
            value = %warning.value,
            "Unparseable value, using default"
        );
    }

    tracing::info!("Starting usage-ingest service");

    tracing::info!(
        listen_addr = %config.listen_addr,
        max_bulk_size = config.max_bulk_size,
        max_gzip_size = config.max_gzip_size,
        db_pool_size = config.db_pool_size,
        db_max_overflow = config.db_max_overflow,
        "Service configuration loaded"
    );

    let store = PgStore::connect(&config.database_url, &config.pool_settings()).await?;

    if config.bootstrap_schema {
        schema::bootstrap(store.pool(), &config.retention_policy()).await?;
    } else {
        tracing::info!("Schema bootstrap disabled");
    }

    // Build app state
    let state = AppState::new(Arc::new(store.clone()), config.clone());

    let app = create_router(state);

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
