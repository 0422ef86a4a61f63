//! Schema validation: untyped JSON items to typed records.
//!
//! Validation runs in two phases. The request-level phase checks the shape
//! of the payload (`items` must be a list) and the batch size; a failure here
//! rejects the whole request. The record-level phase converts each item on
//! its own: an invalid item becomes a [`Rejection`] and its siblings carry on.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{IngestError, Result};
use crate::{EventId, MessageArchive, UsageEvent};

/// Default maximum number of items per bulk request.
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// How far ahead of the validator's clock a timestamp may be, in seconds.
pub const MAX_FUTURE_SKEW_SECS: i64 = 3600;

const USER_ID_MAX_CHARS: usize = 255;
const LABEL_MAX_CHARS: usize = 100;
const ERROR_TYPE_MAX_CHARS: usize = 100;
const PROMPT_MAX_CHARS: usize = 10_000;
const ARCHIVE_TEXT_MAX_CHARS: usize = 50_000;

/// Why a single item was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    /// The item is not a JSON object.
    #[error("item must be a JSON object")]
    NotAnObject,

    /// A required field is absent or null.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A field has the wrong JSON type.
    #[error("{field} must be {expected}")]
    WrongType {
        /// Field name.
        field: &'static str,
        /// Human-readable expected type.
        expected: &'static str,
    },

    /// A required string is empty once surrounding whitespace is removed.
    #[error("{0} cannot be empty or whitespace only")]
    Empty(&'static str),

    /// A string exceeds its maximum length.
    #[error("{field} exceeds {max} characters")]
    TooLong {
        /// Field name.
        field: &'static str,
        /// Maximum length in characters.
        max: usize,
    },

    /// A number lies outside its allowed range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        /// Field name.
        field: &'static str,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },

    /// A timestamp lies too far in the future.
    #[error("{0} cannot be more than 1 hour in the future")]
    TooFarInFuture(&'static str),

    /// The event identifier is not a UUID.
    #[error("event_id must be a valid UUID")]
    InvalidEventId,
}

/// A validation-stage rejection of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Record kind label (`Event` or `Archive`).
    pub kind: &'static str,
    /// The item's `event_id`, or `item[<index>]` when it has no usable one.
    pub identifier: String,
    /// The first rule the item violated.
    pub reason: FieldError,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.kind, self.identifier, self.reason)
    }
}

/// Outcome of validating one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBatch<R> {
    /// Records that passed validation, in input order.
    pub records: Vec<R>,
    /// Items that failed validation, in input order.
    pub rejections: Vec<Rejection>,
    /// Number of items the caller submitted.
    pub submitted: usize,
}

impl<R> ValidatedBatch<R> {
    /// Whether no item survived validation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Converts decoded payloads into typed record batches.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    max_items: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS)
    }
}

impl Validator {
    /// Create a validator that accepts at most `max_items` items per batch.
    #[must_use]
    pub const fn new(max_items: usize) -> Self {
        Self { max_items }
    }

    /// The configured per-batch item ceiling.
    #[must_use]
    pub const fn max_items(&self) -> usize {
        self.max_items
    }

    /// Validate a usage-event batch against the clock reading `now`.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `items` is present but not a list.
    /// - `BatchTooLarge` if the list exceeds the configured item count.
    pub fn validate_usage_events(
        &self,
        payload: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<ValidatedBatch<UsageEvent>> {
        let items = self.items(payload)?;
        Ok(collect(items, UsageEvent::KIND, |fields| {
            usage_event(fields, now)
        }))
    }

    /// Validate a message-archive batch against the clock reading `now`.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if `items` is present but not a list.
    /// - `BatchTooLarge` if the list exceeds the configured item count.
    pub fn validate_archives(
        &self,
        payload: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<ValidatedBatch<MessageArchive>> {
        let items = self.items(payload)?;
        Ok(collect(items, MessageArchive::KIND, |fields| {
            message_archive(fields, now)
        }))
    }

    fn items<'a>(&self, payload: &'a Map<String, Value>) -> Result<&'a [Value]> {
        let items = match payload.get("items") {
            None | Some(Value::Null) => return Ok(&[]),
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(IngestError::ValidationFailed(
                    "items must be a list".into(),
                ))
            }
        };

        if items.len() > self.max_items {
            return Err(IngestError::BatchTooLarge {
                count: items.len(),
                limit: self.max_items,
            });
        }

        Ok(items)
    }
}

fn collect<R>(
    items: &[Value],
    kind: &'static str,
    convert: impl Fn(&Fields<'_>) -> std::result::Result<R, FieldError>,
) -> ValidatedBatch<R> {
    let mut records = Vec::with_capacity(items.len());
    let mut rejections = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let outcome = match item {
            Value::Object(map) => {
                let fields = Fields(map);
                convert(&fields).map_err(|reason| (fields.identifier(), reason))
            }
            _ => Err((None, FieldError::NotAnObject)),
        };

        match outcome {
            Ok(record) => records.push(record),
            Err((identifier, reason)) => rejections.push(Rejection {
                kind,
                identifier: identifier.unwrap_or_else(|| format!("item[{index}]")),
                reason,
            }),
        }
    }

    if !rejections.is_empty() {
        tracing::debug!(
            kind,
            submitted = items.len(),
            rejected = rejections.len(),
            "Dropped items failing validation"
        );
    }

    ValidatedBatch {
        records,
        rejections,
        submitted: items.len(),
    }
}

fn usage_event(f: &Fields<'_>, now: DateTime<Utc>) -> std::result::Result<UsageEvent, FieldError> {
    Ok(UsageEvent {
        event_id: f.event_id()?,
        event_time: f.timestamp("event_time_epoch", now)?,
        user_id: f.label("user_id", USER_ID_MAX_CHARS)?,
        team: f.label("team", LABEL_MAX_CHARS)?,
        service: f.label("service", LABEL_MAX_CHARS)?,
        provider: f.label("provider", LABEL_MAX_CHARS)?,
        model: f.label("model", LABEL_MAX_CHARS)?,
        total_tokens: f.int("total_tokens", 0, i64::MAX)?.unwrap_or(0),
        latency_ms: f
            .int("latency_ms", 0, i64::from(i32::MAX))?
            .map(narrow),
        status_code: f.int("status_code", 100, 599)?.map(narrow),
        error_type: f.text("error_type", ERROR_TYPE_MAX_CHARS)?,
        prompt: f.text("prompt", PROMPT_MAX_CHARS)?,
        extra: f.object("extra")?,
    })
}

fn message_archive(
    f: &Fields<'_>,
    now: DateTime<Utc>,
) -> std::result::Result<MessageArchive, FieldError> {
    Ok(MessageArchive {
        event_id: f.event_id()?,
        user_id: f.label("user_id", USER_ID_MAX_CHARS)?,
        service: f.label("service", LABEL_MAX_CHARS)?,
        prompt_full: f.text("prompt_full", ARCHIVE_TEXT_MAX_CHARS)?,
        response_full: f.text("response_full", ARCHIVE_TEXT_MAX_CHARS)?,
        stored_at: f.timestamp("stored_at", now)?,
    })
}

/// Values passed through `narrow` were range-checked against `i32` already.
#[allow(clippy::cast_possible_truncation)]
fn narrow(value: i64) -> i32 {
    value as i32
}

/// Typed accessors over one JSON item. `null` counts as absent.
struct Fields<'a>(&'a Map<String, Value>);

type FieldResult<T> = std::result::Result<T, FieldError>;

impl Fields<'_> {
    fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    fn identifier(&self) -> Option<String> {
        self.get("event_id")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<EventId>().ok())
            .map(|id| id.to_string())
    }

    fn event_id(&self) -> FieldResult<EventId> {
        let raw = self
            .get("event_id")
            .ok_or(FieldError::Missing("event_id"))?
            .as_str()
            .ok_or(FieldError::InvalidEventId)?;
        raw.parse().map_err(|_| FieldError::InvalidEventId)
    }

    /// Required, trimmed, non-empty string.
    fn label(&self, name: &'static str, max: usize) -> FieldResult<String> {
        let raw = self
            .get(name)
            .ok_or(FieldError::Missing(name))?
            .as_str()
            .ok_or(FieldError::WrongType {
                field: name,
                expected: "a string",
            })?;

        // The ceiling applies to the value as sent, before trimming.
        check_length(name, raw, max)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(FieldError::Empty(name));
        }
        Ok(trimmed.to_string())
    }

    /// Optional string, stored as sent.
    fn text(&self, name: &'static str, max: usize) -> FieldResult<Option<String>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let raw = value.as_str().ok_or(FieldError::WrongType {
            field: name,
            expected: "a string",
        })?;
        check_length(name, raw, max)?;
        Ok(Some(raw.to_string()))
    }

    /// Optional integer within `[min, max]`.
    fn int(&self, name: &'static str, min: i64, max: i64) -> FieldResult<Option<i64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let out_of_range = FieldError::OutOfRange {
            field: name,
            min,
            max,
        };

        let Value::Number(number) = value else {
            return Err(FieldError::WrongType {
                field: name,
                expected: "an integer",
            });
        };

        let parsed = if let Some(v) = number.as_i64() {
            v
        } else if number.is_u64() {
            return Err(out_of_range);
        } else {
            match number.as_f64() {
                Some(v) if v.fract() == 0.0 => integral_float(v).ok_or_else(|| out_of_range.clone())?,
                _ => {
                    return Err(FieldError::WrongType {
                        field: name,
                        expected: "an integer",
                    })
                }
            }
        };

        if parsed < min || parsed > max {
            return Err(out_of_range);
        }
        Ok(Some(parsed))
    }

    /// Required epoch-seconds timestamp, at most one hour ahead of `now`.
    fn timestamp(&self, name: &'static str, now: DateTime<Utc>) -> FieldResult<DateTime<Utc>> {
        let secs = self
            .int(name, 0, i64::MAX)?
            .ok_or(FieldError::Missing(name))?;

        if secs > now.timestamp().saturating_add(MAX_FUTURE_SKEW_SECS) {
            return Err(FieldError::TooFarInFuture(name));
        }

        DateTime::from_timestamp(secs, 0).ok_or(FieldError::OutOfRange {
            field: name,
            min: 0,
            max: now.timestamp().saturating_add(MAX_FUTURE_SKEW_SECS),
        })
    }

    fn object(&self, name: &'static str) -> FieldResult<Option<Map<String, Value>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map.clone())),
            Some(_) => Err(FieldError::WrongType {
                field: name,
                expected: "an object",
            }),
        }
    }
}

fn check_length(name: &'static str, value: &str, max: usize) -> FieldResult<()> {
    if value.chars().count() > max {
        return Err(FieldError::TooLong { field: name, max });
    }
    Ok(())
}

/// Convert a float with no fractional part, such as `5.0`, if it fits `i64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_float(v: f64) -> Option<i64> {
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return None;
    }
    Some(v as i64)
}
