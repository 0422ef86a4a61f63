//! Client error types.

/// Errors that can occur when using the usage-ingest client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compressing the request body failed.
    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether resubmitting the same batch may succeed.
    ///
    /// Ingestion is idempotent on `event_id`, so retrying after a server or
    /// transport failure never double-counts.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status >= 500,
            Self::Serialization(_) | Self::Compression(_) | Self::Configuration(_) => false,
        }
    }
}
