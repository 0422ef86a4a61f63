//! Usage event records.
//!
//! A usage event is one observed call to an LLM provider. Events are written
//! once and never updated; the store partitions them by `event_time`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EventId;

/// A normalized usage event, ready to be persisted.
///
/// Instances are produced by the [`Validator`](crate::Validator), which
/// guarantees the field bounds documented below. `created_at` is not part of
/// the record: the store assigns it at write time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Caller-supplied de-duplication key.
    pub event_id: EventId,

    /// When the call occurred. Partitioning key of the store.
    pub event_time: DateTime<Utc>,

    /// Caller identity (trimmed, 1..=255 chars).
    pub user_id: String,

    /// Owning team (trimmed, 1..=100 chars).
    pub team: String,

    /// Calling service (trimmed, 1..=100 chars).
    pub service: String,

    /// LLM provider (trimmed, 1..=100 chars).
    pub provider: String,

    /// Model name (trimmed, 1..=100 chars).
    pub model: String,

    /// Tokens consumed by the call.
    pub total_tokens: i64,

    /// End-to-end latency in milliseconds.
    pub latency_ms: Option<i32>,

    /// HTTP status returned by the provider (100..=599).
    pub status_code: Option<i32>,

    /// Short error classification (up to 100 chars).
    pub error_type: Option<String>,

    /// Prompt excerpt (up to 10 000 chars).
    pub prompt: Option<String>,

    /// Free-form attributes.
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

impl UsageEvent {
    /// Label used in per-record error messages.
    pub const KIND: &'static str = "Event";

    /// Create a usage event with the required fields and no optional data.
    #[must_use]
    pub fn new(
        event_id: EventId,
        event_time: DateTime<Utc>,
        user_id: impl Into<String>,
        team: impl Into<String>,
        service: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            event_time,
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

    /// Set the provider response status.
    #[must_use]
    pub fn with_status(mut self, status_code: i32) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Set the prompt excerpt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let id = EventId::generate();
        let event = UsageEvent::new(id, Utc::now(), "u1", "core", "chat", "openai", "gpt-4o")
            .with_tokens(120)
            .with_status(200);

        assert_eq!(event.event_id, id);
        assert_eq!(event.total_tokens, 120);
        assert_eq!(event.status_code, Some(200));
        assert!(event.latency_ms.is_none());
        assert!(event.extra.is_none());
    }
}
