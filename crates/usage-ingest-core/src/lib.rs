//! Core types and utilities for usage-ingest.
//!
//! This crate provides the pieces of the ingestion pipeline that do no I/O:
//!
//! - **Identifiers**: `EventId`
//! - **Records**: `UsageEvent`, `MessageArchive`
//! - **Transport decoding**: `decode_body`, `PayloadLimits`
//! - **Validation**: `Validator`, `ValidatedBatch`, `Rejection`
//! - **Reporting**: `IngestResponse`
//!
//! # Pipeline
//!
//! A request body flows through `decode_body` (decompression and JSON parsing),
//! then through a `Validator` that turns the untyped `items` list into typed
//! records. Storage and the HTTP surface live in the `usage-ingest-store` and
//! `usage-ingest-service` crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod archive;
pub mod decode;
pub mod error;
pub mod ids;
pub mod report;
pub mod usage;
pub mod validation;

pub use archive::MessageArchive;
pub use decode::{decode_body, ContentEncoding, PayloadLimits};
pub use error::{IngestError, Result};
pub use ids::{EventId, IdError};
pub use report::{IngestResponse, MAX_REPORTED_ERRORS};
pub use usage::UsageEvent;
pub use validation::{
    FieldError, Rejection, ValidatedBatch, Validator, DEFAULT_MAX_ITEMS, MAX_FUTURE_SKEW_SECS,
};
