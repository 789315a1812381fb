//! # Core Configuration Module
//!
//! Provides configuration management for the catalog and playlist stores.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding the datastore and runtime settings. `build()` validates
//! eagerly so that a misconfigured service fails at startup rather than on its
//! first request.
//!
//! ## Usage
//!
//! ```no_run
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_url("sqlite:/var/lib/musicsocial/catalog.db")
//!     .max_connections(16)
//!     .query_timeout(Duration::from_secs(5))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Environment
//!
//! [`CoreConfig::from_env`] reads the following variables, falling back to the
//! builder defaults for anything unset:
//!
//! | Variable | Meaning |
//! |---|---|
//! | `MUSICSOCIAL_DATABASE_URL` | sqlx SQLite URL |
//! | `MUSICSOCIAL_DB_MIN_CONNECTIONS` | pool minimum |
//! | `MUSICSOCIAL_DB_MAX_CONNECTIONS` | pool maximum |
//! | `MUSICSOCIAL_DB_ACQUIRE_TIMEOUT_SECS` | wait for a pooled connection |
//! | `MUSICSOCIAL_QUERY_TIMEOUT_MS` | per-operation deadline (`0` disables) |
//! | `MUSICSOCIAL_DEFAULT_COVER_URL` | placeholder cover for ready tracks |
//! | `MUSICSOCIAL_LOG_FORMAT` | `pretty`, `json` or `compact` |
//! | `MUSICSOCIAL_LOG_LEVEL` | `trace` … `error` |
//! | `MUSICSOCIAL_LOG_FILTER` | full `EnvFilter` directive string |

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use std::str::FromStr;
use std::time::Duration;

/// Cover image used when the transcoder reports no artwork for a track.
pub const DEFAULT_COVER_URL: &str = "/static/covers/default.png";

/// Upper bound for the pool size.
const MAX_POOL_CONNECTIONS: u32 = 256;

/// Core configuration for the catalog and playlist stores.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// sqlx database URL (`sqlite:path/to/file.db` or `sqlite::memory:`)
    pub database_url: String,

    /// Minimum number of pooled connections kept open
    pub min_connections: u32,

    /// Maximum number of pooled connections
    pub max_connections: u32,

    /// Maximum time to wait for a pooled connection
    pub acquire_timeout: Duration,

    /// Deadline applied to each store operation; `None` waits indefinitely
    pub query_timeout: Option<Duration>,

    /// Cover URL written by the ready transition when none is supplied
    pub default_cover_url: String,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// Each `MUSICSOCIAL_*` key that resolves overrides the builder default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();

        if let Some(url) = lookup("MUSICSOCIAL_DATABASE_URL") {
            builder = builder.database_url(url);
        }
        if let Some(min) = lookup("MUSICSOCIAL_DB_MIN_CONNECTIONS") {
            builder = builder.min_connections(parse_var("MUSICSOCIAL_DB_MIN_CONNECTIONS", &min)?);
        }
        if let Some(max) = lookup("MUSICSOCIAL_DB_MAX_CONNECTIONS") {
            builder = builder.max_connections(parse_var("MUSICSOCIAL_DB_MAX_CONNECTIONS", &max)?);
        }
        if let Some(secs) = lookup("MUSICSOCIAL_DB_ACQUIRE_TIMEOUT_SECS") {
            let secs: u64 = parse_var("MUSICSOCIAL_DB_ACQUIRE_TIMEOUT_SECS", &secs)?;
            builder = builder.acquire_timeout(Duration::from_secs(secs));
        }
        if let Some(ms) = lookup("MUSICSOCIAL_QUERY_TIMEOUT_MS") {
            let ms: u64 = parse_var("MUSICSOCIAL_QUERY_TIMEOUT_MS", &ms)?;
            builder = if ms == 0 {
                builder.no_query_timeout()
            } else {
                builder.query_timeout(Duration::from_millis(ms))
            };
        }
        if let Some(cover) = lookup("MUSICSOCIAL_DEFAULT_COVER_URL") {
            builder = builder.default_cover_url(cover);
        }

        let mut logging = LoggingConfig::default();
        if let Some(format) = lookup("MUSICSOCIAL_LOG_FORMAT") {
            logging = logging.with_format(LogFormat::from_str(&format)?);
        }
        if let Some(level) = lookup("MUSICSOCIAL_LOG_LEVEL") {
            logging = logging.with_level(LogLevel::from_str(&level)?);
        }
        if let Some(filter) = lookup("MUSICSOCIAL_LOG_FILTER") {
            logging = logging.with_filter(filter);
        }

        builder.logging(logging).build()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database URL is not empty and uses the SQLite scheme
    /// - Pool bounds are consistent
    /// - Timeouts are non-zero
    /// - Default cover URL is not empty
    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(Error::Config("Database URL cannot be empty".to_string()));
        }

        if !self.database_url.starts_with("sqlite:") {
            return Err(Error::Config(format!(
                "Unsupported database URL scheme (expected sqlite:): {}",
                self.database_url
            )));
        }

        if self.max_connections == 0 {
            return Err(Error::Config(
                "Max connections must be greater than 0".to_string(),
            ));
        }

        if self.max_connections > MAX_POOL_CONNECTIONS {
            return Err(Error::Config(format!(
                "Max connections exceeds maximum of {}",
                MAX_POOL_CONNECTIONS
            )));
        }

        if self.min_connections > self.max_connections {
            return Err(Error::Config(format!(
                "Min connections ({}) exceeds max connections ({})",
                self.min_connections, self.max_connections
            )));
        }

        if self.acquire_timeout.is_zero() {
            return Err(Error::Config(
                "Acquire timeout must be greater than 0".to_string(),
            ));
        }

        if matches!(self.query_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(Error::Config(
                "Query timeout must be greater than 0 (omit it to disable)".to_string(),
            ));
        }

        if self.default_cover_url.trim().is_empty() {
            return Err(Error::Config(
                "Default cover URL cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// True when the configuration points at a private in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Clone)]
pub struct CoreConfigBuilder {
    database_url: String,
    min_connections: u32,
    max_connections: u32,
    acquire_timeout: Duration,
    query_timeout: Option<Duration>,
    default_cover_url: String,
    logging: LoggingConfig,
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self {
            database_url: "sqlite:musicsocial.db".to_string(),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            query_timeout: Some(Duration::from_secs(10)),
            default_cover_url: DEFAULT_COVER_URL.to_string(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CoreConfigBuilder {
    /// Sets the sqlx database URL.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    /// Sets the minimum pool size.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the maximum pool size.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets how long to wait for a pooled connection.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the per-operation deadline.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    /// Disables the per-operation deadline.
    pub fn no_query_timeout(mut self) -> Self {
        self.query_timeout = None;
        self
    }

    /// Sets the placeholder cover URL.
    pub fn default_cover_url(mut self, url: impl Into<String>) -> Self {
        self.default_cover_url = url.into();
        self
    }

    /// Sets the logging configuration.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<CoreConfig> {
        let config = CoreConfig {
            database_url: self.database_url,
            min_connections: self.min_connections,
            max_connections: self.max_connections,
            acquire_timeout: self.acquire_timeout,
            query_timeout: self.query_timeout,
            default_cover_url: self.default_cover_url,
            logging: self.logging,
        };

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {} ({})", key, raw, e)))
}
