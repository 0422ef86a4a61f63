//! PostgreSQL/TimescaleDB storage implementation.
//!
//! Batches are written with multi-row `INSERT ... ON CONFLICT DO NOTHING`
//! statements inside a single transaction. A dropped transaction rolls back,
//! so every early return on `?` leaves the table untouched.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};

use usage_ingest_core::{MessageArchive, UsageEvent};

use crate::error::Result;
use crate::Store;

/// PostgreSQL caps a statement at 65 535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_535;

const USAGE_EVENT_COLUMNS: usize = 13;
const ARCHIVE_COLUMNS: usize = 6;

/// Connection pool sizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Connections kept open while idle.
    pub pool_size: u32,
    /// Extra connections allowed under load.
    pub max_overflow: u32,
    /// How long a request waits for a free connection.
    pub acquire_timeout: Duration,
    /// Connections older than this are recycled.
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            pool_size: 10,
            max_overflow: 20,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl PoolSettings {
    /// Upper bound on open connections.
    #[must_use]
    pub const fn max_connections(&self) -> u32 {
        self.pool_size.saturating_add(self.max_overflow)
    }

    fn options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections())
            .min_connections(self.pool_size)
            .acquire_timeout(self.acquire_timeout)
            .max_lifetime(self.max_lifetime)
            .test_before_acquire(true)
    }
}

/// PostgreSQL-backed storage implementation.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial connections cannot be established.
    pub async fn connect(url: &str, settings: &PoolSettings) -> Result<Self> {
        let pool = settings.options().connect(url).await?;

        tracing::info!(
            max_connections = settings.max_connections(),
            min_connections = settings.pool_size,
            "Connected to PostgreSQL"
        );

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool, for schema bootstrap and shutdown.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Close all pooled connections.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn usage_event_insert(events: &[UsageEvent]) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(
        "INSERT INTO analytics.usage_events (event_id, event_time, user_id, team, service, \
         provider, model, total_tokens, latency_ms, status_code, error_type, prompt, extra) ",
    );
    qb.push_values(events, |mut row, e| {
        row.push_bind(*e.event_id.as_uuid())
            .push_bind(e.event_time)
            .push_bind(e.user_id.as_str())
            .push_bind(e.team.as_str())
            .push_bind(e.service.as_str())
            .push_bind(e.provider.as_str())
            .push_bind(e.model.as_str())
            .push_bind(e.total_tokens)
            .push_bind(e.latency_ms)
            .push_bind(e.status_code)
            .push_bind(e.error_type.as_deref())
            .push_bind(e.prompt.as_deref())
            .push_bind(e.extra.as_ref().map(Json));
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn archive_insert(archives: &[MessageArchive]) -> QueryBuilder<'_, Postgres> {
    let mut qb = QueryBuilder::new(
        "INSERT INTO analytics.message_archives \
         (event_id, user_id, service, prompt_full, response_full, stored_at) ",
    );
    qb.push_values(archives, |mut row, a| {
        row.push_bind(*a.event_id.as_uuid())
            .push_bind(a.user_id.as_str())
            .push_bind(a.service.as_str())
            .push_bind(a.prompt_full.as_deref())
            .push_bind(a.response_full.as_deref())
            .push_bind(a.stored_at);
    });
    qb.push(" ON CONFLICT (event_id) DO NOTHING");
    qb
}

#[async_trait]
impl Store for PgStore {
    async fn insert_usage_events(&self, events: &[UsageEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for chunk in events.chunks(MAX_BIND_PARAMS / USAGE_EVENT_COLUMNS) {
            written += usage_event_insert(chunk)
                .build()
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(written)
    }

    async fn insert_usage_event(&self, event: &UsageEvent) -> Result<bool> {
        let result = usage_event_insert(std::slice::from_ref(event))
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_archives(&self, archives: &[MessageArchive]) -> Result<u64> {
        if archives.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for chunk in archives.chunks(MAX_BIND_PARAMS / ARCHIVE_COLUMNS) {
            written += archive_insert(chunk)
                .build()
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }
        tx.commit().await?;

        Ok(written)
    }

    async fn insert_archive(&self, archive: &MessageArchive) -> Result<bool> {
        let result = archive_insert(std::slice::from_ref(archive))
            .build()
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_bounds_include_overflow() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections(), 30);
        assert_eq!(settings.pool_size, 10);
    }

    #[test]
    fn chunks_stay_under_bind_limit() {
        let per_statement = MAX_BIND_PARAMS / USAGE_EVENT_COLUMNS;
        assert!(per_statement * USAGE_EVENT_COLUMNS <= MAX_BIND_PARAMS);
        // The largest default batch fits in a single statement.
        assert!(per_statement >= usage_ingest_core::DEFAULT_MAX_ITEMS);
    }

    #[test]
    fn insert_statement_skips_conflicts() {
        let event = UsageEvent::new(
            usage_ingest_core::EventId::generate(),
            chrono::Utc::now(),
            "u",
            "t",
            "s",
            "p",
            "m",
        );
        let qb = usage_event_insert(std::slice::from_ref(&event));
        let sql = qb.sql();
        assert!(sql.starts_with("INSERT INTO analytics.usage_events"));
        assert!(sql.ends_with("ON CONFLICT DO NOTHING"));
        assert!(sql.contains("$13"));
        assert!(!sql.contains("$14"));
    }
}
