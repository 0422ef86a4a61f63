//! Bulk write algorithm: one batch insert, then per-record fallback.
//!
//! The fast path hands the whole batch to the store in one transaction. If
//! the store refuses it for a data reason, the transaction is gone and
//! nothing was written, so every record is retried on its own. That isolates
//! the offending records while the rest still land. Only
//! [`StoreError::Integrity`] triggers the fallback; any other failure of the
//! fast path is returned to the caller.

use async_trait::async_trait;

use usage_ingest_core::{EventId, MessageArchive, UsageEvent};

use crate::error::{Result, StoreError};
use crate::Store;

/// A record type the writer knows how to persist.
#[async_trait]
pub trait Record: Send + Sync + Sized {
    /// Label used in per-record error messages.
    const KIND: &'static str;

    /// The record's de-duplication key.
    fn event_id(&self) -> EventId;

    /// Batch insert through `store`.
    async fn insert_batch(store: &dyn Store, records: &[Self]) -> Result<u64>;

    /// Single insert through `store`.
    async fn insert_one(store: &dyn Store, record: &Self) -> Result<bool>;
}

#[async_trait]
impl Record for UsageEvent {
    const KIND: &'static str = UsageEvent::KIND;

    fn event_id(&self) -> EventId {
        self.event_id
    }

    async fn insert_batch(store: &dyn Store, records: &[Self]) -> Result<u64> {
        store.insert_usage_events(records).await
    }

    async fn insert_one(store: &dyn Store, record: &Self) -> Result<bool> {
        store.insert_usage_event(record).await
    }
}

#[async_trait]
impl Record for MessageArchive {
    const KIND: &'static str = MessageArchive::KIND;

    fn event_id(&self) -> EventId {
        self.event_id
    }

    async fn insert_batch(store: &dyn Store, records: &[Self]) -> Result<u64> {
        store.insert_archives(records).await
    }

    async fn insert_one(store: &dyn Store, record: &Self) -> Result<bool> {
        store.insert_archive(record).await
    }
}

/// What happened to one record on the fallback path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// A new row was written.
    Written,
    /// The key already existed; nothing was written.
    Duplicate,
    /// The store refused the record.
    Rejected {
        /// Store-provided cause.
        reason: String,
    },
}

/// Which path a write took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePath {
    /// Nothing to write; the store was not called.
    #[default]
    Empty,
    /// The batch insert succeeded.
    Batch,
    /// The batch was refused and records were written one by one.
    Fallback,
}

/// Result of writing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReport {
    /// Rows newly written.
    pub accepted: usize,
    /// `"<Kind> <event_id>: <cause>"` for each refused record, in input order.
    pub errors: Vec<String>,
    /// Path taken.
    pub path: WritePath,
}

/// Writes validated records through a [`Store`].
#[derive(Clone, Copy)]
pub struct BulkWriter<'a> {
    store: &'a dyn Store,
}

impl<'a> BulkWriter<'a> {
    /// Create a writer over `store`.
    #[must_use]
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Persist `records`, in input order.
    ///
    /// # Errors
    ///
    /// Returns the store error when the batch fails for a reason other than
    /// the data, or when the store becomes unreachable during the fallback.
    pub async fn write<R: Record>(&self, records: &[R]) -> Result<WriteReport> {
        if records.is_empty() {
            return Ok(WriteReport::default());
        }

        match R::insert_batch(self.store, records).await {
            Ok(written) => {
                let accepted = usize::try_from(written).unwrap_or(usize::MAX);
                tracing::info!(
                    kind = R::KIND,
                    count = records.len(),
                    accepted,
                    "Batch insert succeeded"
                );
                Ok(WriteReport {
                    accepted,
                    errors: Vec::new(),
                    path: WritePath::Batch,
                })
            }
            Err(StoreError::Integrity(cause)) => {
                tracing::warn!(
                    kind = R::KIND,
                    count = records.len(),
                    error = %cause,
                    "Batch insert refused, retrying records individually"
                );
                self.fallback(records).await
            }
            Err(e) => {
                tracing::error!(kind = R::KIND, count = records.len(), error = %e, "Batch insert failed");
                Err(e)
            }
        }
    }

    async fn fallback<R: Record>(&self, records: &[R]) -> Result<WriteReport> {
        let mut report = WriteReport {
            path: WritePath::Fallback,
            ..WriteReport::default()
        };

        for record in records {
            match self.write_one(record).await? {
                RecordOutcome::Written => report.accepted += 1,
                RecordOutcome::Duplicate => {}
                RecordOutcome::Rejected { reason } => {
                    report
                        .errors
                        .push(format!("{} {}: {reason}", R::KIND, record.event_id()));
                }
            }
        }

        tracing::info!(
            kind = R::KIND,
            count = records.len(),
            accepted = report.accepted,
            failed = report.errors.len(),
            "Per-record fallback finished"
        );
        Ok(report)
    }

    /// Write one record, classifying the outcome.
    ///
    /// # Errors
    ///
    /// Only [`StoreError::Unavailable`] is returned; every other failure is
    /// folded into [`RecordOutcome::Rejected`].
    pub async fn write_one<R: Record>(&self, record: &R) -> Result<RecordOutcome> {
        match R::insert_one(self.store, record).await {
            Ok(true) => Ok(RecordOutcome::Written),
            Ok(false) => Ok(RecordOutcome::Duplicate),
            Err(e @ StoreError::Unavailable(_)) => {
                tracing::error!(
                    kind = R::KIND,
                    event_id = %record.event_id(),
                    error = %e,
                    "Store unreachable during per-record fallback"
                );
                Err(e)
            }
            Err(e) => {
                tracing::debug!(
                    kind = R::KIND,
                    event_id = %record.event_id(),
                    error = %e,
                    "Record refused"
                );
                Ok(RecordOutcome::Rejected {
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;

    use super::*;
    use crate::MemoryStore;

    fn event() -> UsageEvent {
        UsageEvent::new(
            EventId::generate(),
            Utc::now(),
            "user_1",
            "team_a",
            "chat",
            "openai",
            "gpt-4",
        )
        .with_tokens(10)
    }

    #[tokio::test]
    async fn empty_batch_does_not_touch_store() {
        let store = MemoryStore::new();
        let report = BulkWriter::new(&store)
            .write::<UsageEvent>(&[])
            .await
            .unwrap();

        assert_eq!(report, WriteReport::default());
        assert_eq!(store.batch_calls(), 0);
    }

    #[tokio::test]
    async fn fast_path_counts_rows_written() {
        let store = MemoryStore::new();
        let writer = BulkWriter::new(&store);
        let events = vec![event(), event(), event()];

        let first = writer.write(&events).await.unwrap();
        assert_eq!(first.accepted, 3);
        assert_eq!(first.path, WritePath::Batch);

        let second = writer.write(&events).await.unwrap();
        assert_eq!(second.accepted, 0);
        assert!(second.errors.is_empty());
        assert_eq!(store.usage_event_count(), 3);
    }

    #[tokio::test]
    async fn integrity_failure_isolates_bad_record() {
        let store = MemoryStore::new();
        let bad = event().with_prompt("bad\0prompt");
        let events = vec![event(), event(), bad.clone(), event()];

        let report = BulkWriter::new(&store).write(&events).await.unwrap();

        assert_eq!(report.path, WritePath::Fallback);
        assert_eq!(report.accepted, 3);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with(&format!("Event {}: ", bad.event_id)));
        assert_eq!(store.usage_event_count(), 3);
        assert_eq!(store.single_calls(), 4);
    }

    #[tokio::test]
    async fn fallback_preserves_input_order() {
        let store = MemoryStore::new();
        let bad_a = MessageArchive::new(EventId::generate(), "u\0", "chat", Utc::now());
        let good = MessageArchive::new(EventId::generate(), "u", "chat", Utc::now());
        let bad_b = MessageArchive::new(EventId::generate(), "u", "chat\0", Utc::now());

        let report = BulkWriter::new(&store)
            .write(&[bad_a.clone(), good, bad_b.clone()])
            .await
            .unwrap();

        assert_eq!(report.accepted, 1);
        assert!(report.errors[0].starts_with(&format!("Archive {}", bad_a.event_id)));
        assert!(report.errors[1].starts_with(&format!("Archive {}", bad_b.event_id)));
    }

    #[tokio::test]
    async fn unavailable_fast_path_is_fatal() {
        let store = MemoryStore::new();
        store.set_available(false);

        let err = BulkWriter::new(&store).write(&[event()]).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.single_calls(), 0);
    }

    /// Refuses every batch and goes down after a number of single inserts.
    struct FlakyStore {
        inner: MemoryStore,
        singles_before_outage: usize,
        singles: AtomicUsize,
    }

    #[async_trait]
    impl Store for FlakyStore {
        async fn insert_usage_events(&self, _events: &[UsageEvent]) -> Result<u64> {
            Err(StoreError::Integrity("value too long".into()))
        }

        async fn insert_usage_event(&self, event: &UsageEvent) -> Result<bool> {
            if self.singles.fetch_add(1, Ordering::SeqCst) >= self.singles_before_outage {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            self.inner.insert_usage_event(event).await
        }

        async fn insert_archives(&self, archives: &[MessageArchive]) -> Result<u64> {
            self.inner.insert_archives(archives).await
        }

        async fn insert_archive(&self, archive: &MessageArchive) -> Result<bool> {
            self.inner.insert_archive(archive).await
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn outage_during_fallback_aborts_batch() {
        let store = FlakyStore {
            inner: MemoryStore::new(),
            singles_before_outage: 2,
            singles: AtomicUsize::new(0),
        };

        let err = BulkWriter::new(&store)
            .write(&[event(), event(), event(), event()])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.singles.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fallback_counts_duplicates_as_not_accepted() {
        let store = MemoryStore::new();
        let existing = event();
        store.insert_usage_event(&existing).await.unwrap();

        let bad = event().with_prompt("\0");
        let report = BulkWriter::new(&store)
            .write(&[existing, event(), bad])
            .await
            .unwrap();

        assert_eq!(report.path, WritePath::Fallback);
        assert_eq!(report.accepted, 1);
        assert_eq!(report.errors.len(), 1);
    }
}
