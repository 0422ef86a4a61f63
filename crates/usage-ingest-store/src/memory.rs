//! In-memory storage implementation.
//!
//! Mirrors the PostgreSQL backend closely enough for the service to run
//! against it unchanged: batches are all-or-nothing, duplicate keys are
//! skipped, and text PostgreSQL would refuse is refused here too.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use usage_ingest_core::{EventId, MessageArchive, UsageEvent};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Default)]
struct Tables {
    /// Keyed like the hypertable: `(event_time, event_id)`.
    usage_events: BTreeMap<(DateTime<Utc>, EventId), UsageEvent>,
    archives: BTreeMap<EventId, MessageArchive>,
}

/// In-memory [`Store`] for tests and local runs.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
    batch_calls: AtomicUsize,
    single_calls: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("usage_events", &self.usage_event_count())
            .field("archives", &self.archive_count())
            .field("available", &self.is_available())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Create an empty, reachable store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            available: AtomicBool::new(true),
            batch_calls: AtomicUsize::new(0),
            single_calls: AtomicUsize::new(0),
        }
    }

    /// Simulate the engine going down (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Whether the store currently accepts calls.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Number of stored usage events.
    #[must_use]
    pub fn usage_event_count(&self) -> usize {
        self.tables().usage_events.len()
    }

    /// Number of stored message archives.
    #[must_use]
    pub fn archive_count(&self) -> usize {
        self.tables().archives.len()
    }

    /// Look up a usage event by id.
    #[must_use]
    pub fn usage_event(&self, event_id: &EventId) -> Option<UsageEvent> {
        self.tables()
            .usage_events
            .values()
            .find(|e| &e.event_id == event_id)
            .cloned()
    }

    /// Look up a message archive by id.
    #[must_use]
    pub fn archive(&self, event_id: &EventId) -> Option<MessageArchive> {
        self.tables().archives.get(event_id).cloned()
    }

    /// Number of batch insert calls received.
    #[must_use]
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// Number of single-record insert calls received.
    #[must_use]
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }
}

/// PostgreSQL `text` cannot hold NUL.
fn check_text(value: &str) -> Result<()> {
    if value.contains('\0') {
        return Err(StoreError::Integrity(
            "invalid byte sequence for encoding \"UTF8\": 0x00".into(),
        ));
    }
    Ok(())
}

fn check_optional(value: Option<&str>) -> Result<()> {
    value.map_or(Ok(()), check_text)
}

fn check_usage_event(event: &UsageEvent) -> Result<()> {
    for value in [
        &event.user_id,
        &event.team,
        &event.service,
        &event.provider,
        &event.model,
    ] {
        check_text(value)?;
    }
    check_optional(event.error_type.as_deref())?;
    check_optional(event.prompt.as_deref())?;

    // `jsonb` refuses the escaped form as well.
    if let Some(extra) = &event.extra {
        let encoded = serde_json::Value::Object(extra.clone()).to_string();
        if encoded.contains("\\u0000") {
            return Err(StoreError::Integrity(
                "unsupported Unicode escape sequence".into(),
            ));
        }
    }
    Ok(())
}

fn check_archive(archive: &MessageArchive) -> Result<()> {
    check_text(&archive.user_id)?;
    check_text(&archive.service)?;
    check_optional(archive.prompt_full.as_deref())?;
    check_optional(archive.response_full.as_deref())
}

fn usage_key(event: &UsageEvent) -> (DateTime<Utc>, EventId) {
    (event.event_time, event.event_id)
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_usage_events(&self, events: &[UsageEvent]) -> Result<u64> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        events.iter().try_for_each(check_usage_event)?;

        let mut tables = self.tables();
        let mut written = 0;
        for event in events {
            if let std::collections::btree_map::Entry::Vacant(slot) =
                tables.usage_events.entry(usage_key(event))
            {
                slot.insert(event.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn insert_usage_event(&self, event: &UsageEvent) -> Result<bool> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        check_usage_event(event)?;

        let mut tables = self.tables();
        let key = usage_key(event);
        if tables.usage_events.contains_key(&key) {
            return Ok(false);
        }
        tables.usage_events.insert(key, event.clone());
        Ok(true)
    }

    async fn insert_archives(&self, archives: &[MessageArchive]) -> Result<u64> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        archives.iter().try_for_each(check_archive)?;

        let mut tables = self.tables();
        let mut written = 0;
        for archive in archives {
            if !tables.archives.contains_key(&archive.event_id) {
                tables.archives.insert(archive.event_id, archive.clone());
                written += 1;
            }
        }
        Ok(written)
    }

    async fn insert_archive(&self, archive: &MessageArchive) -> Result<bool> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;
        check_archive(archive)?;

        let mut tables = self.tables();
        if tables.archives.contains_key(&archive.event_id) {
            return Ok(false);
        }
        tables.archives.insert(archive.event_id, archive.clone());
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    }

    #[tokio::test]
    async fn batch_skips_duplicates() {
        let store = MemoryStore::new();
        let first = event();
        let second = event();

        let written = store
            .insert_usage_events(&[first.clone(), second.clone(), first.clone()])
            .await
            .unwrap();
        assert_eq!(written, 2);

        let written = store.insert_usage_events(&[first, second]).await.unwrap();
        assert_eq!(written, 0);
        assert_eq!(store.usage_event_count(), 2);
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let store = MemoryStore::new();
        let bad = event().with_prompt("nul\0byte");

        let err = store
            .insert_usage_events(&[event(), bad, event()])
            .await
            .unwrap_err();

        assert!(err.is_integrity());
        assert_eq!(store.usage_event_count(), 0);
        assert_eq!(store.batch_calls(), 1);
    }

    #[tokio::test]
    async fn single_insert_reports_duplicates() {
        let store = MemoryStore::new();
        let e = event();

        assert!(store.insert_usage_event(&e).await.unwrap());
        assert!(!store.insert_usage_event(&e).await.unwrap());
        assert_eq!(store.usage_event(&e.event_id), Some(e));
        assert_eq!(store.single_calls(), 2);
    }

    #[tokio::test]
    async fn nul_in_extra_is_refused() {
        let store = MemoryStore::new();
        let mut e = event();
        let mut extra = serde_json::Map::new();
        extra.insert("note".into(), serde_json::Value::String("a\0b".into()));
        e.extra = Some(extra);

        assert!(store.insert_usage_event(&e).await.unwrap_err().is_integrity());
    }

    #[tokio::test]
    async fn unavailable_store_refuses_everything() {
        let store = MemoryStore::new();
        store.set_available(false);

        assert!(matches!(
            store.ping().await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            store.insert_usage_events(&[event()]).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_available(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn archives_key_on_event_id() {
        let store = MemoryStore::new();
        let archive = MessageArchive::new(EventId::generate(), "user_1", "chat", Utc::now())
            .with_texts("prompt", "response");

        assert_eq!(
            store.insert_archives(&[archive.clone(), archive.clone()]).await.unwrap(),
            1
        );
        assert!(!store.insert_archive(&archive).await.unwrap());
        assert_eq!(store.archive(&archive.event_id), Some(archive));
    }
}
