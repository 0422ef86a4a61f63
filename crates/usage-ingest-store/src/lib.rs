//! Storage layer for usage-ingest.
//!
//! This crate persists validated records and hosts the bulk write algorithm.
//!
//! # Architecture
//!
//! - [`Store`]: the storage-engine seam. Batch inserts are atomic and skip
//!   records whose key already exists; single inserts report whether a row
//!   was written.
//! - [`PgStore`]: PostgreSQL/TimescaleDB implementation over a `sqlx` pool.
//! - [`MemoryStore`]: in-process implementation with the same semantics.
//! - [`BulkWriter`]: fast batch path with per-record fallback.
//! - [`schema`]: idempotent bootstrap DDL.
//!
//! # Example
//!
//! ```no_run
//! use usage_ingest_store::{BulkWriter, MemoryStore};
//! # async fn run(events: Vec<usage_ingest_core::UsageEvent>) -> usage_ingest_store::Result<()> {
//! let store = MemoryStore::new();
//! let report = BulkWriter::new(&store).write(&events).await?;
//! println!("accepted {}", report.accepted);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod writer;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::{PgStore, PoolSettings};
pub use schema::RetentionPolicy;
pub use writer::{BulkWriter, Record, RecordOutcome, WritePath, WriteReport};

use async_trait::async_trait;
use usage_ingest_core::{MessageArchive, UsageEvent};

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage engine, allowing for different
/// implementations (PostgreSQL, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Usage Events
    // =========================================================================

    /// Insert a batch of usage events in one transaction.
    ///
    /// Records whose key already exists are skipped. Returns the number of
    /// rows actually written.
    ///
    /// # Errors
    ///
    /// Any error aborts the whole batch; nothing is written.
    async fn insert_usage_events(&self, events: &[UsageEvent]) -> Result<u64>;

    /// Insert one usage event. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_usage_event(&self, event: &UsageEvent) -> Result<bool>;

    // =========================================================================
    // Message Archives
    // =========================================================================

    /// Insert a batch of message archives in one transaction.
    ///
    /// Same contract as [`Store::insert_usage_events`].
    ///
    /// # Errors
    ///
    /// Any error aborts the whole batch; nothing is written.
    async fn insert_archives(&self, archives: &[MessageArchive]) -> Result<u64>;

    /// Insert one message archive. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_archive(&self, archive: &MessageArchive) -> Result<bool>;

    // =========================================================================
    // Health
    // =========================================================================

    /// Check that the storage engine is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if a trivial round trip fails.
    async fn ping(&self) -> Result<()>;
}
