//! Service configuration.

use std::cell::RefCell;
use std::str::FromStr;
use std::time::Duration;

use usage_ingest_core::decode::{DEFAULT_MAX_COMPRESSED_BYTES, DEFAULT_MAX_DECOMPRESSED_BYTES};
use usage_ingest_core::{PayloadLimits, DEFAULT_MAX_ITEMS};
use usage_ingest_store::{PoolSettings, RetentionPolicy};

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
}

/// A variable that was set but could not be parsed; its default was used.
///
/// Returned rather than logged because configuration is read before the
/// tracing subscriber exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// Variable name.
    pub variable: &'static str,
    /// Value as found in the environment.
    pub value: String,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        })
    }
}

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8000").
    pub listen_addr: String,

    /// PostgreSQL connection string (required).
    pub database_url: String,

    /// Static bearer token producers must present (required).
    pub analytics_token: String,

    /// Connections kept open while idle (default: 10).
    pub db_pool_size: u32,

    /// Extra connections allowed under load (default: 20).
    pub db_max_overflow: u32,

    /// Connection recycle age in seconds (default: 1800).
    pub db_pool_recycle_seconds: u64,

    /// Wait for a pooled connection, in seconds (default: 30).
    pub db_acquire_timeout_seconds: u64,

    /// Maximum items per bulk request (default: 1000).
    pub max_bulk_size: usize,

    /// Maximum compressed body size in bytes (default: 10 MiB).
    pub max_gzip_size: usize,

    /// Maximum decompressed body size in bytes (default: 64 MiB).
    pub max_decompressed_size: usize,

    /// Maximum request body size in bytes as received (default: 16 MiB).
    pub max_body_bytes: usize,

    /// Request timeout in seconds (default: 30).
    pub request_timeout_seconds: u64,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Hypertable chunk width in hours (default: 24).
    pub chunk_interval_hours: u32,

    /// Compress chunks older than this many days (default: 7).
    pub compression_after_days: u32,

    /// Drop chunks older than this many days (default: 180).
    pub retention_days: u32,

    /// Run schema bootstrap at startup (default: true).
    pub bootstrap_schema: bool,

    /// Log output format (default: text).
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    ///
    /// Also returns one [`ConfigWarning`] per unparseable value.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if `DATABASE_URL` or `ANALYTICS_TOKEN`
    /// is unset or empty.
    pub fn from_env() -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ServiceConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Vec<ConfigWarning>), ConfigError> {
        let defaults = Self::default();
        let env = Env {
            lookup: &lookup,
            warnings: RefCell::new(Vec::new()),
        };

        let config = Self {
            listen_addr: env.string("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            database_url: env.required("DATABASE_URL")?,
            analytics_token: env.required("ANALYTICS_TOKEN")?,
            db_pool_size: env.parse("DB_POOL_SIZE", defaults.db_pool_size),
            db_max_overflow: env.parse("DB_MAX_OVERFLOW", defaults.db_max_overflow),
            db_pool_recycle_seconds: env
                .parse("DB_POOL_RECYCLE_SECONDS", defaults.db_pool_recycle_seconds),
            db_acquire_timeout_seconds: env
                .parse("DB_ACQUIRE_TIMEOUT_SECONDS", defaults.db_acquire_timeout_seconds),
            max_bulk_size: env.parse("MAX_BULK_SIZE", defaults.max_bulk_size),
            max_gzip_size: env.parse("MAX_GZIP_SIZE", defaults.max_gzip_size),
            max_decompressed_size: env
                .parse("MAX_DECOMPRESSED_SIZE", defaults.max_decompressed_size),
            max_body_bytes: env.parse("MAX_BODY_BYTES", defaults.max_body_bytes),
            request_timeout_seconds: env
                .parse("REQUEST_TIMEOUT_SECONDS", defaults.request_timeout_seconds),
            cors_origins: env
                .string("CORS_ORIGINS")
                .unwrap_or_else(|| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            chunk_interval_hours: env.parse("CHUNK_INTERVAL_HOURS", defaults.chunk_interval_hours),
            compression_after_days: env
                .parse("COMPRESSION_AFTER_DAYS", defaults.compression_after_days),
            retention_days: env.parse("RETENTION_DAYS", defaults.retention_days),
            bootstrap_schema: env.parse("BOOTSTRAP_SCHEMA", defaults.bootstrap_schema),
            log_format: env.parse("LOG_FORMAT", defaults.log_format),
        };

        Ok((config, env.warnings.into_inner()))
    }

    /// Connection pool sizing.
    #[must_use]
    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            pool_size: self.db_pool_size,
            max_overflow: self.db_max_overflow,
            acquire_timeout: Duration::from_secs(self.db_acquire_timeout_seconds),
            max_lifetime: Duration::from_secs(self.db_pool_recycle_seconds),
        }
    }

    /// Hypertable chunking, compression and retention.
    #[must_use]
    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            chunk_interval_hours: self.chunk_interval_hours,
            compress_after_days: self.compression_after_days,
            retain_days: self.retention_days,
        }
    }

    /// Byte ceilings for the transport decoder.
    #[must_use]
    pub fn payload_limits(&self) -> PayloadLimits {
        PayloadLimits {
            max_compressed_bytes: self.max_gzip_size,
            max_decompressed_bytes: self.max_decompressed_size,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let pool = PoolSettings::default();
        let retention = RetentionPolicy::default();

        Self {
            listen_addr: "0.0.0.0:8000".into(),
            database_url: String::new(),
            analytics_token: String::new(),
            db_pool_size: pool.pool_size,
            db_max_overflow: pool.max_overflow,
            db_pool_recycle_seconds: pool.max_lifetime.as_secs(),
            db_acquire_timeout_seconds: pool.acquire_timeout.as_secs(),
            max_bulk_size: DEFAULT_MAX_ITEMS,
            max_gzip_size: DEFAULT_MAX_COMPRESSED_BYTES,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED_BYTES,
            max_body_bytes: 16 * 1024 * 1024,
            request_timeout_seconds: 30,
            cors_origins: vec!["*".into()],
            chunk_interval_hours: retention.chunk_interval_hours,
            compression_after_days: retention.compress_after_days,
            retention_days: retention.retain_days,
            bootstrap_schema: true,
            log_format: LogFormat::Text,
        }
    }
}

struct Env<'a, F> {
    lookup: &'a F,
    warnings: RefCell<Vec<ConfigWarning>>,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.string(name).ok_or(ConfigError::Missing(name))
    }

    fn parse<T: FromStr>(&self, name: &'static str, default: T) -> T {
        let Some(raw) = self.string(name) else {
            return default;
        };
        match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                self.warnings.borrow_mut().push(ConfigWarning {
                    variable: name,
                    value: raw,
                });
                default
            }
        }
    }
}
