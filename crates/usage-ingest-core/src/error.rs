//! Error types for the ingestion pipeline.

/// Result type for payload-level operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Request-level failures raised before any record reaches storage.
///
/// None of these are retryable as-is: the caller has to fix or split the
/// payload first.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    /// The body could not be decompressed or parsed as a JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The payload exceeds a configured byte ceiling.
    #[error("payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Observed size in bytes (a lower bound when decompression was cut short).
        size: usize,
        /// Configured ceiling in bytes.
        limit: usize,
    },

    /// The batch carries more items than allowed per request.
    #[error("batch too large: {count} items exceeds limit of {limit}")]
    BatchTooLarge {
        /// Number of items submitted.
        count: usize,
        /// Configured maximum item count.
        limit: usize,
    },

    /// The payload is valid JSON but does not have the bulk request shape,
    /// e.g. `items` is not a list.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
}
