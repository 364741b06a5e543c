//! # Store Handle
//!
//! Opens the on-device SQLite file and hands out scoped transactions.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Offline Store Handle                               │
//! │                                                                         │
//! │  App Startup                                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbConfig::new(path) ← Configure pool settings + quota                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Database::new(config).await ← Create pool + run migrations             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────┐                            │
//! │  │            SqlitePool                   │                            │
//! │  │  ┌─────┐ ┌─────┐ ┌─────┐ ┌─────┐        │                            │
//! │  │  │Conn1│ │Conn2│ │Conn3│ │Conn4│ ...    │  (max_connections)         │
//! │  │  └─────┘ └─────┘ └─────┘ └─────┘        │                            │
//! │  └─────────────────────────────────────────┘                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.transaction(&[Table::Properties], TxMode::ReadWrite)                │
//! │       │                                                                 │
//! │       ├── db.entities()      → reference data                           │
//! │       ├── db.search_cache()  → TTL-bound search results                 │
//! │       ├── db.actions()       → offline mutation queue                   │
//! │       └── db.maintenance()   → expiry sweeps + stats                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## WAL Mode
//! File-backed stores run in WAL mode so a reader keeps its snapshot while a
//! writer commits, and a sweep batch never blocks UI reads.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use haven_core::{Clock, SystemClock};

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::repository::actions::ActionQueue;
use crate::repository::entity::EntityCache;
use crate::repository::maintenance::Maintenance;
use crate::repository::search_cache::SearchCache;
use crate::store::{StoreTx, Table, TxMode};

/// SQLite default page size, used to turn a byte quota into `max_page_count`.
const PAGE_SIZE_BYTES: u64 = 4096;

const IN_MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// Store configuration.
///
/// ## Example
/// ```rust,ignore
/// let config = DbConfig::new("/path/to/haven.db")
///     .max_connections(4)
///     .max_size_bytes(50 * 1024 * 1024);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 4
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// Pool acquire timeout. The only timeout this layer imposes.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,

    /// Upper bound on the database size. Writes past it fail with
    /// [`DbError::QuotaExceeded`].
    /// Default: unbounded
    pub max_size_bytes: Option<u64>,
}

impl DbConfig {
    /// Creates a configuration for the file at `path`, created on first open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            run_migrations: true,
            max_size_bytes: None,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the pool acquire timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Caps the database size.
    pub fn max_size_bytes(mut self, bytes: u64) -> Self {
        self.max_size_bytes = Some(bytes);
        self
    }

    /// Creates an in-memory configuration (for testing).
    ///
    /// The pool is pinned to a single connection that never idles out,
    /// otherwise the database would vanish with it. Callers must not acquire
    /// a second connection while a [`StoreTx`] is open.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(3600),
            run_migrations: true,
            max_size_bytes: None,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_PATH
    }

    fn max_page_count(&self) -> Option<u64> {
        self.max_size_bytes
            .map(|bytes| (bytes / PAGE_SIZE_BYTES).max(1))
    }
}

// =============================================================================
// Database
// =============================================================================

/// The single owner of the SQLite pool.
///
/// Cloning is cheap; clones share the pool and the clock. Nothing outside
/// this crate sees a raw connection except through [`StoreTx`].
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl Database {
    /// Opens the store.
    ///
    /// ## What This Does
    /// 1. Creates the database file (and its directory) if missing
    /// 2. Configures SQLite: WAL, NORMAL synchronous, optional page quota
    /// 3. Creates the connection pool
    /// 4. Runs migrations (if enabled)
    ///
    /// Every failure here is [`DbError::StoreUnavailable`].
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.database_path.display(),
            "Opening offline store"
        );

        let connect_options = if config.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::StoreUnavailable(e.to_string()))?
                .journal_mode(SqliteJournalMode::Memory)
        } else {
            if let Some(parent) = config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        DbError::StoreUnavailable(format!(
                            "cannot create {}: {}",
                            parent.display(),
                            e
                        ))
                    })?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        let mut connect_options = connect_options.synchronous(SqliteSynchronous::Normal);

        if let Some(pages) = config.max_page_count() {
            debug!(pages, "Applying storage quota");
            connect_options = connect_options.pragma("max_page_count", pages.to_string());
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout));

        if config.is_in_memory() {
            pool_options = pool_options.max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(connect_options)
            .await
            .map_err(|e| DbError::StoreUnavailable(e.to_string()))?;

        info!(
            max_connections = config.max_connections,
            "Store pool created"
        );

        let db = Database {
            pool,
            clock: Arc::new(SystemClock),
        };

        if config.run_migrations {
            db.run_migrations().await?;
        }

        Ok(db)
    }

    /// Replaces the time source (tests drive TTLs with a `ManualClock`).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Applies pending migrations. Idempotent.
    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running store migrations");
        migrations::run_migrations(&self.pool).await?;
        Ok(())
    }

    /// Returns (total, applied) migration counts.
    pub async fn migration_status(&self) -> DbResult<(usize, usize)> {
        migrations::migration_status(&self.pool).await
    }

    /// Begins a transaction limited to `scope` in the given mode.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let mut tx = db.transaction(&[Table::Actions], TxMode::ReadWrite).await?;
    /// sqlx::query("DELETE FROM offline_actions WHERE id = ?1")
    ///     .bind(id)
    ///     .execute(tx.writer(Table::Actions)?)
    ///     .await?;
    /// tx.commit().await?;
    /// ```
    pub async fn transaction(&self, scope: &[Table], mode: TxMode) -> DbResult<StoreTx> {
        let tx = self.pool.begin().await?;
        Ok(StoreTx::new(tx, scope, mode))
    }

    /// Reference data caches.
    pub fn entities(&self) -> EntityCache {
        EntityCache::new(self.clone())
    }

    /// TTL-bound search result cache.
    pub fn search_cache(&self) -> SearchCache {
        SearchCache::new(self.clone())
    }

    /// Offline mutation queue.
    pub fn actions(&self) -> ActionQueue {
        ActionQueue::new(self.clone())
    }

    /// Expiry sweeps and storage stats.
    pub fn maintenance(&self) -> Maintenance {
        Maintenance::new(self.clone())
    }

    /// Closes the pool. Every later operation fails with `StoreUnavailable`.
    pub async fn close(&self) {
        info!("Closing offline store");
        self.pool.close().await;
    }

    /// True when the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .is_ok()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (total, applied) = db.migration_status().await.unwrap();
        assert_eq!(total, applied);
        assert!(total >= 1);
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DbConfig::new("/tmp/haven.db")
            .max_connections(10)
            .min_connections(2)
            .max_size_bytes(8192 * 10);

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_page_count(), Some(20));
        assert!(!config.is_in_memory());
        assert!(DbConfig::in_memory().is_in_memory());
    }

    #[tokio::test]
    async fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("haven.db");

        let first = Database::new(DbConfig::new(&path)).await.unwrap();
        let mut tx = first
            .transaction(&[Table::Regions], TxMode::ReadWrite)
            .await
            .unwrap();
        sqlx::query("INSERT INTO regions (cache_key, payload, cached_at) VALUES ('r1', '{}', 0)")
            .execute(tx.writer(Table::Regions).unwrap())
            .await
            .unwrap();
        tx.commit().await.unwrap();
        first.close().await;

        let second = Database::new(DbConfig::new(&path)).await.unwrap();
        let (total, applied) = second.migration_status().await.unwrap();
        assert_eq!(total, applied);

        let mut tx = second
            .transaction(&[Table::Regions], TxMode::ReadOnly)
            .await
            .unwrap();
        let row = sqlx::query("SELECT COUNT(*) AS n FROM regions")
            .fetch_one(tx.reader(Table::Regions).unwrap())
            .await
            .unwrap();
        let n: i64 = row.try_get("n").unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_scope_is_enforced() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db
            .transaction(&[Table::Properties], TxMode::ReadOnly)
            .await
            .unwrap();

        assert!(tx.reader(Table::Properties).is_ok());
        assert!(matches!(
            tx.writer(Table::Properties),
            Err(DbError::ScopeViolation { mode: TxMode::ReadOnly, .. })
        ));
        assert!(matches!(
            tx.reader(Table::Actions),
            Err(DbError::ScopeViolation { table: Table::Actions, .. })
        ));
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        {
            let mut tx = db
                .transaction(&[Table::Features], TxMode::ReadWrite)
                .await
                .unwrap();
            sqlx::query("INSERT INTO features (cache_key, payload, cached_at) VALUES ('f1', '{}', 0)")
                .execute(tx.writer(Table::Features).unwrap())
                .await
                .unwrap();
        }

        let stats = db.maintenance().get_storage_stats().await.unwrap();
        assert_eq!(stats.features, 0);
    }

    #[tokio::test]
    async fn test_closed_store_is_unavailable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.close().await;

        let err = db
            .transaction(&[Table::Actions], TxMode::ReadOnly)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());
    }
}
