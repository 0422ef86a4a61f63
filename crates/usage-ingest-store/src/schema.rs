//! Database schema bootstrap.
//!
//! Every statement is idempotent, so bootstrap runs on each service start.
//! Usage events live in a TimescaleDB hypertable partitioned by
//! `event_time`; the hypertable's unique key must include that column, so
//! the key is `(event_time, event_id)`. Archives are keyed by `event_id`
//! alone and carry no foreign key: an archive may arrive before its event.

use sqlx::PgPool;

use crate::error::Result;

/// Chunking, compression and retention for the usage hypertable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Width of each hypertable chunk, in hours.
    pub chunk_interval_hours: u32,
    /// Chunks older than this are compressed.
    pub compress_after_days: u32,
    /// Chunks older than this are dropped.
    pub retain_days: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            chunk_interval_hours: 24,
            compress_after_days: 7,
            retain_days: 180,
        }
    }
}

/// Core tables, indexes and policies.
#[must_use]
pub fn tables_ddl(policy: &RetentionPolicy) -> String {
    format!(
        r"
CREATE EXTENSION IF NOT EXISTS timescaledb;
CREATE SCHEMA IF NOT EXISTS analytics;

CREATE TABLE IF NOT EXISTS analytics.usage_events (
    event_id      UUID NOT NULL,
    event_time    TIMESTAMPTZ NOT NULL,
    user_id       TEXT NOT NULL,
    team          TEXT NOT NULL,
    service       TEXT NOT NULL,
    provider      TEXT NOT NULL,
    model         TEXT NOT NULL,
    total_tokens  BIGINT NOT NULL DEFAULT 0,
    latency_ms    INTEGER,
    status_code   INTEGER,
    error_type    TEXT,
    prompt        TEXT,
    extra         JSONB,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (event_time, event_id)
);

SELECT create_hypertable(
    'analytics.usage_events',
    'event_time',
    chunk_time_interval => INTERVAL '{chunk} hours',
    if_not_exists => TRUE
);

CREATE TABLE IF NOT EXISTS analytics.message_archives (
    event_id       UUID PRIMARY KEY,
    user_id        TEXT NOT NULL,
    service        TEXT NOT NULL,
    prompt_full    TEXT,
    response_full  TEXT,
    stored_at      TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_events_event_id
    ON analytics.usage_events (event_id);
CREATE INDEX IF NOT EXISTS idx_usage_events_team_time
    ON analytics.usage_events (team, event_time DESC);
CREATE INDEX IF NOT EXISTS idx_usage_events_user_time
    ON analytics.usage_events (user_id, event_time DESC);
CREATE INDEX IF NOT EXISTS idx_usage_events_service_model
    ON analytics.usage_events (service, model, event_time DESC);
CREATE INDEX IF NOT EXISTS idx_usage_events_status_time
    ON analytics.usage_events (status_code, event_time DESC);
CREATE INDEX IF NOT EXISTS idx_usage_events_provider
    ON analytics.usage_events (provider, event_time DESC);
CREATE INDEX IF NOT EXISTS idx_message_archives_user
    ON analytics.message_archives (user_id);
CREATE INDEX IF NOT EXISTS idx_message_archives_service
    ON analytics.message_archives (service);
CREATE INDEX IF NOT EXISTS idx_message_archives_stored_at
    ON analytics.message_archives (stored_at DESC);

DO $$
BEGIN
    IF NOT EXISTS (
        SELECT 1 FROM timescaledb_information.hypertables
        WHERE hypertable_schema = 'analytics'
          AND hypertable_name = 'usage_events'
          AND compression_enabled
    ) THEN
        ALTER TABLE analytics.usage_events SET (
            timescaledb.compress,
            timescaledb.compress_segmentby = 'team,service,model',
            timescaledb.compress_orderby = 'event_time DESC'
        );
    END IF;
END
$$;

SELECT add_compression_policy(
    'analytics.usage_events',
    INTERVAL '{compress} days',
    if_not_exists => TRUE
);

SELECT add_retention_policy(
    'analytics.usage_events',
    INTERVAL '{retain} days',
    if_not_exists => TRUE
);
",
        chunk = policy.chunk_interval_hours,
        compress = policy.compress_after_days,
        retain = policy.retain_days,
    )
}

/// Hourly and daily rollups of the usage hypertable.
pub const AGGREGATES_DDL: &str = r"
CREATE MATERIALIZED VIEW IF NOT EXISTS analytics.hourly_usage_stats
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('1 hour', event_time) AS hour,
    team,
    service,
    model,
    provider,
    COUNT(*) AS request_count,
    SUM(total_tokens) AS total_tokens,
    AVG(latency_ms) AS avg_latency_ms,
    COUNT(*) FILTER (WHERE status_code >= 400) AS error_count
FROM analytics.usage_events
GROUP BY hour, team, service, model, provider
WITH NO DATA;

CREATE MATERIALIZED VIEW IF NOT EXISTS analytics.daily_usage_stats
WITH (timescaledb.continuous) AS
SELECT
    time_bucket('1 day', event_time) AS day,
    team,
    service,
    model,
    provider,
    COUNT(*) AS request_count,
    SUM(total_tokens) AS total_tokens,
    AVG(latency_ms) AS avg_latency_ms,
    COUNT(*) FILTER (WHERE status_code >= 400) AS error_count
FROM analytics.usage_events
GROUP BY day, team, service, model, provider
WITH NO DATA;

SELECT add_continuous_aggregate_policy(
    'analytics.hourly_usage_stats',
    start_offset => INTERVAL '3 hours',
    end_offset => INTERVAL '1 hour',
    schedule_interval => INTERVAL '30 minutes',
    if_not_exists => TRUE
);

SELECT add_continuous_aggregate_policy(
    'analytics.daily_usage_stats',
    start_offset => INTERVAL '3 days',
    end_offset => INTERVAL '1 day',
    schedule_interval => INTERVAL '1 hour',
    if_not_exists => TRUE
);
";

/// Create tables, policies and rollups.
///
/// Rollups are optional: their failure is logged and startup continues.
///
/// # Errors
///
/// Returns an error if the core tables or policies cannot be created.
pub async fn bootstrap(pool: &PgPool, policy: &RetentionPolicy) -> Result<()> {
    let ddl = tables_ddl(policy);
    sqlx::raw_sql(&ddl).execute(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize TimescaleDB schema");
        e
    })?;
    tracing::info!(
        chunk_interval_hours = policy.chunk_interval_hours,
        compress_after_days = policy.compress_after_days,
        retain_days = policy.retain_days,
        "TimescaleDB schema ready"
    );

    match sqlx::raw_sql(AGGREGATES_DDL).execute(pool).await {
        Ok(_) => tracing::info!("Continuous aggregates ready"),
        Err(e) => tracing::warn!(error = %e, "Failed to create continuous aggregates"),
    }

    Ok(())
}
