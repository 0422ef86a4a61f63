//! Message archive records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::EventId;

/// Full prompt/response text for a usage event, stored separately.
///
/// The archive shares its `event_id` with a [`UsageEvent`](crate::UsageEvent)
/// but may arrive before, after, or without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageArchive {
    /// Identifier of the usage event this archive belongs to.
    pub event_id: EventId,

    /// Denormalized caller identity (trimmed, 1..=255 chars).
    pub user_id: String,

    /// Denormalized calling service (trimmed, 1..=100 chars).
    pub service: String,

    /// Full prompt text (up to 50 000 chars).
    pub prompt_full: Option<String>,

    /// Full response text (up to 50 000 chars).
    pub response_full: Option<String>,

    /// Caller-supplied storage time.
    pub stored_at: DateTime<Utc>,
}

impl MessageArchive {
    /// Label used in per-record error messages.
    pub const KIND: &'static str = "Archive";

    /// Create an archive with no text bodies.
    #[must_use]
    pub fn new(
        event_id: EventId,
        user_id: impl Into<String>,
        service: impl Into<String>,
        stored_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            user_id: user_id.into(),
            service: service.into(),
            prompt_full: None,
            response_full: None,
            stored_at,
        }
    }

    /// Attach prompt and response bodies.
    #[must_use]
    pub fn with_texts(
        mut self,
        prompt_full: impl Into<String>,
        response_full: impl Into<String>,
    ) -> Self {
        self.prompt_full = Some(prompt_full.into());
        self.response_full = Some(response_full.into());
        self
    }
}
