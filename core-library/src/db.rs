//! # Connection Pool
//!
//! Every repository shares one `SqlitePool`. Opening a pool:
//!
//! 1. builds connect options (foreign keys on, WAL for file databases)
//! 2. connects with the configured pool bounds
//! 3. applies the embedded migrations
//! 4. pings the database
//!
//! Foreign keys must be on for playlist deletes to cascade to memberships and
//! subscriptions.
//!
//! ```rust,ignore
//! use core_library::db::{create_pool, DatabaseConfig};
//!
//! let pool = create_pool(DatabaseConfig::file("/var/lib/musicsocial/catalog.db")).await?;
//! ```

use crate::{LibraryError, Result};
use core_runtime::config::CoreConfig;
use core_runtime::logging::strip_path;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const IN_MEMORY_URL: &str = "sqlite::memory:";
const STATEMENT_CACHE: usize = 128;
/// Negative values are KiB for SQLite's `cache_size`
const PAGE_CACHE_KIB: &str = "-32000";

/// Pool settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Connections older than this are replaced; `None` keeps them forever
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl DatabaseConfig {
    /// Database file, created on first open
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            url: format!("sqlite:{}", path.as_ref().display()),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
        }
    }

    /// Private in-memory database
    ///
    /// Each connection to `:memory:` sees its own empty database, so the pool
    /// holds exactly one connection and never recycles it.
    pub fn in_memory() -> Self {
        Self {
            url: IN_MEMORY_URL.to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
        }
    }

    pub fn from_core_config(config: &CoreConfig) -> Self {
        let base = if config.is_in_memory() {
            Self::in_memory()
        } else {
            Self {
                url: config.database_url.clone(),
                ..Self::file("")
            }
            .with_connections(config.min_connections, config.max_connections)
        };

        base.with_acquire_timeout(config.acquire_timeout)
    }

    pub fn with_connections(mut self, min: u32, max: u32) -> Self {
        self.min_connections = min;
        self.max_connections = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.url)?
            .foreign_keys(true)
            .create_if_missing(true)
            .statement_cache_capacity(STATEMENT_CACHE)
            .pragma("cache_size", PAGE_CACHE_KIB);

        if self.is_in_memory() {
            return Ok(options);
        }

        Ok(options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .min_connections(self.min_connections)
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .max_lifetime(self.max_lifetime)
            .idle_timeout(self.idle_timeout)
    }
}

/// Open a pool, migrate it and verify it answers
///
/// # Errors
///
/// - `Database` if the URL is malformed or the database cannot be opened
/// - `Migration` if a migration fails
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(
        database = %strip_path(&config.url),
        max_connections = config.max_connections,
        "Opening database"
    );

    let pool = config
        .pool_options()
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| {
            warn!(error = %e, "Could not open database");
            LibraryError::Database(e)
        })?;

    run_migrations(&pool).await?;
    ping(&pool).await?;

    debug!(connections = pool.size(), "Database ready");
    Ok(pool)
}

/// Migrated in-memory pool for tests
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

/// Apply pending migrations embedded from `migrations/`
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        LibraryError::Migration(e.to_string())
    })?;

    info!("Schema up to date");
    Ok(())
}

async fn ping(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
