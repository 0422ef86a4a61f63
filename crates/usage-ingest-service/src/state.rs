//! Application state.

use std::sync::Arc;

use usage_ingest_core::{PayloadLimits, Validator};
use usage_ingest_store::Store;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Batch validator, sized from `config.max_bulk_size`.
    pub validator: Validator,

    /// Decoder ceilings, from `config`.
    pub limits: PayloadLimits,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig) -> Self {
        let validator = Validator::new(config.max_bulk_size);
        let limits = config.payload_limits();

        tracing::debug!(
            max_items = validator.max_items(),
            max_compressed_bytes = limits.max_compressed_bytes,
            max_decompressed_bytes = limits.max_decompressed_bytes,
            "Ingestion limits configured"
        );

        Self {
            store,
            config,
            validator,
            limits,
        }
    }
}
