//! Bulk ingestion response body.

use serde::{Deserialize, Serialize};

/// Maximum number of error strings returned to the caller per request.
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Outcome summary for one bulk request.
///
/// `accepted` counts records newly persisted; duplicates and invalid records
/// both land in `rejected`. `errors` is a truncated sample, never the full
/// list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Records newly persisted.
    pub accepted: usize,
    /// Records submitted but not persisted.
    pub rejected: usize,
    /// Up to [`MAX_REPORTED_ERRORS`] human-readable messages.
    pub errors: Vec<String>,
}

impl IngestResponse {
    /// Build a response for `submitted` items of which `accepted` were persisted.
    ///
    /// `errors` is consumed in order and cut at [`MAX_REPORTED_ERRORS`].
    #[must_use]
    pub fn new<I>(submitted: usize, accepted: usize, errors: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            accepted,
            rejected: submitted.saturating_sub(accepted),
            errors: errors
                .into_iter()
                .take(MAX_REPORTED_ERRORS)
                .map(Into::into)
                .collect(),
        }
    }

    /// Response for an empty batch.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}
