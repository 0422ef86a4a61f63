//! Request and response types for the usage-ingest client.

use serde::{Deserialize, Serialize};

pub use usage_ingest_core::IngestResponse;

/// One usage event as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEventInput {
    /// Unique event ID (UUID) for idempotency.
    pub event_id: String,
    /// When the call occurred, in Unix seconds.
    pub event_time_epoch: i64,
    /// Caller identity.
    pub user_id: String,
    /// Owning team.
    pub team: String,
    /// Calling service.
    pub service: String,
    /// LLM provider (e.g., "openai", "anthropic").
    pub provider: String,
    /// Model name.
    pub model: String,
    /// Tokens consumed.
    pub total_tokens: i64,
    /// End-to-end latency in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i32>,
    /// Provider HTTP status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<i32>,
    /// Short error classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Prompt excerpt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Free-form attributes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

impl UsageEventInput {
    /// Create an event stamped now, with a fresh random `event_id`.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        team: impl Into<String>,
        service: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            event_time_epoch: chrono::Utc::now().timestamp(),
            user_id: user_id.into(),
            team: team.into(),
            service: service.into(),
            provider: provider.into(),
            model: model.into(),
            total_tokens: 0,
            latency_ms: None,
            status_code: None,
            error_type: None,
            prompt: None,
            extra: None,
        }
    }

    /// Set the token count.
    #[must_use]
    pub fn with_tokens(mut self, total_tokens: i64) -> Self {
        self.total_tokens = total_tokens;
        self
    }

    /// Set latency and provider status.
    #[must_use]
    pub fn with_outcome(mut self, latency_ms: i32, status_code: i32) -> Self {
        self.latency_ms = Some(latency_ms);
        self.status_code = Some(status_code);
        self
    }
}

/// Full prompt/response text for an event, as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInput {
    /// Identifier of the usage event this archive belongs to.
    pub event_id: String,
    /// Caller identity.
    pub user_id: String,
    /// Calling service.
    pub service: String,
    /// Full prompt text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_full: Option<String>,
    /// Full response text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_full: Option<String>,
    /// Storage time in Unix seconds.
    pub stored_at: i64,
}

impl ArchiveInput {
    /// Create an archive for `event`, stamped now.
    #[must_use]
    pub fn for_event(
        event: &UsageEventInput,
        prompt_full: impl Into<String>,
        response_full: impl Into<String>,
    ) -> Self {
        Self {
            event_id: event.event_id.clone(),
            user_id: event.user_id.clone(),
            service: event.service.clone(),
            prompt_full: Some(prompt_full.into()),
            response_full: Some(response_full.into()),
            stored_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// Bulk request body.
#[derive(Debug, Serialize)]
pub(crate) struct BulkRequest<'a, T> {
    pub items: &'a [T],
}

/// Health probe response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    /// `"healthy"` or `"unhealthy"`.
    pub status: String,
    /// Whether the service reached its database.
    pub database: bool,
    /// Time of the check (RFC 3339).
    pub timestamp: String,
}

impl HealthStatus {
    /// Whether the service reports itself healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy" && self.database
    }
}

/// API error response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: String,
    pub message: String,
}
