//! Usage-ingest Client SDK.
//!
//! This crate provides a client library for producers to push LLM usage
//! telemetry to the usage-ingest service.
//!
//! # Example
//!
//! ```no_run
//! use usage_ingest_client::{ArchiveInput, IngestClient, UsageEventInput};
//!
//! # async fn example() -> Result<(), usage_ingest_client::ClientError> {
//! let client = IngestClient::new("http://usage-ingest:8000", "analytics-token")?;
//!
//! let event = UsageEventInput::new("user_1", "platform", "chat", "openai", "gpt-4o")
//!     .with_tokens(1500)
//!     .with_outcome(820, 200);
//! let archive = ArchiveInput::for_event(&event, "Hello?", "Hi!");
//!
//! let response = client.ingest_usage_events(&[event]).await?;
//! println!("accepted {} rejected {}", response.accepted, response.rejected);
//!
//! client.ingest_archives(&[archive]).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, IngestClient};
pub use error::ClientError;
pub use types::{ArchiveInput, HealthStatus, IngestResponse, UsageEventInput};
