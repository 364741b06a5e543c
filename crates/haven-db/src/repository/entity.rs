//! # Entity Cache
//!
//! Write-through cache for reference data: listings, Ghana regions and the
//! eco-feature catalog. Records never expire on their own; every fresh fetch
//! from the API overwrites them by natural key.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  cache(&[p1, p2, p3])                                                   │
//! │       │                                                                 │
//! │       ├── BEGIN ─► UPSERT p1 ─► COMMIT               written = 1        │
//! │       ├── BEGIN ─► UPSERT p2 ✗ (quota) ─► ROLLBACK   failed = 1         │
//! │       └── BEGIN ─► UPSERT p3 ─► COMMIT               written = 2        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  p1 and p3 visible; p2 logged and dropped                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each record gets its own read-write transaction. SQLite may roll back the
//! whole transaction on SQLITE_FULL, so a shared one could lose records that
//! were already counted as written.
//!
//! Callers get a [`CacheWriteReport`] back, never an error: the API response
//! they are caching has already been shown to the user.
//!
//! ## Offline Search
//! Listings are filtered in memory after a full read of `properties`, using
//! [`SearchFilters::matches`]. The cached catalog is small enough on a
//! device that an index per filter would not pay for itself.

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::Row;
use tracing::{debug, warn};

use haven_core::{EcoFeature, GhanaRegion, Property, SearchFilters};

use super::to_millis;
use crate::error::DbResult;
use crate::pool::Database;
use crate::store::{StoreTx, Table, TxMode};

// =============================================================================
// Cached Entity Trait
// =============================================================================

/// Reference data that lives in one of the entity tables.
pub trait CachedEntity: Serialize + DeserializeOwned + Send + Sync {
    /// Table holding this kind of record.
    const TABLE: Table;

    /// Key the record is upserted under.
    fn natural_key(&self) -> String;
}

impl CachedEntity for Property {
    const TABLE: Table = Table::Properties;

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

impl CachedEntity for GhanaRegion {
    const TABLE: Table = Table::Regions;

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

impl CachedEntity for EcoFeature {
    const TABLE: Table = Table::Features;

    fn natural_key(&self) -> String {
        self.id.clone()
    }
}

/// Outcome of one `cache` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheWriteReport {
    pub written: usize,
    pub failed: usize,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository over the reference-data tables.
#[derive(Debug, Clone)]
pub struct EntityCache {
    db: Database,
}

impl EntityCache {
    pub fn new(db: Database) -> Self {
        EntityCache { db }
    }

    /// Upserts every item by natural key.
    ///
    /// A failure on one item is logged and counted; items before and after
    /// it are still written. `written` only counts committed records.
    pub async fn cache<T: CachedEntity>(&self, items: &[T]) -> CacheWriteReport {
        let table = T::TABLE;
        let cached_at = to_millis(self.db.clock().now());
        let mut report = CacheWriteReport::default();

        for item in items {
            let key = item.natural_key();
            match self.write_one(table, &key, item, cached_at).await {
                Ok(()) => report.written += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!(table = %table, key = %key, error = %e, "Failed to cache record");
                }
            }
        }

        if !items.is_empty() {
            debug!(
                table = %table,
                written = report.written,
                failed = report.failed,
                "Cached reference data"
            );
        }
        report
    }

    /// One record in its own transaction. Rolled back on drop if anything fails.
    async fn write_one<T: Serialize>(
        &self,
        table: Table,
        key: &str,
        item: &T,
        cached_at: i64,
    ) -> DbResult<()> {
        let mut tx = self.db.transaction(&[table], TxMode::ReadWrite).await?;
        upsert(&mut tx, table, key, item, cached_at).await?;
        tx.commit().await
    }

    /// Every cached record of `T`, ordered by key.
    ///
    /// Rows that no longer decode (e.g. written by an older build) are
    /// skipped with a warning.
    pub async fn get_all<T: CachedEntity>(&self) -> DbResult<Vec<T>> {
        let table = T::TABLE;
        let mut tx = self.db.transaction(&[table], TxMode::ReadOnly).await?;

        let sql = format!(
            "SELECT cache_key, payload FROM {} ORDER BY cache_key",
            table.name()
        );
        let rows = sqlx::query(&sql).fetch_all(tx.reader(table)?).await?;
        tx.commit().await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("cache_key")?;
            let payload: String = row.try_get("payload")?;
            match serde_json::from_str::<T>(&payload) {
                Ok(record) => records.push(record),
                Err(e) => warn!(table = %table, key = %key, error = %e, "Skipping undecodable record"),
            }
        }

        Ok(records)
    }

    /// One cached record by natural key.
    pub async fn get<T: CachedEntity>(&self, key: &str) -> DbResult<Option<T>> {
        let table = T::TABLE;
        let mut tx = self.db.transaction(&[table], TxMode::ReadOnly).await?;

        let sql = format!("SELECT payload FROM {} WHERE cache_key = ?1", table.name());
        let payload: Option<String> = sqlx::query_scalar(&sql)
            .bind(key)
            .fetch_optional(tx.reader(table)?)
            .await?;
        tx.commit().await?;

        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Number of cached records of `T`.
    pub async fn count<T: CachedEntity>(&self) -> DbResult<u64> {
        let table = T::TABLE;
        let mut tx = self.db.transaction(&[table], TxMode::ReadOnly).await?;

        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(tx.reader(table)?)
            .await?;
        tx.commit().await?;

        Ok(count.max(0) as u64)
    }

    /// Cached listings matching every present filter.
    pub async fn search_properties_offline(
        &self,
        filters: &SearchFilters,
    ) -> DbResult<Vec<Property>> {
        let all = self.get_all::<Property>().await?;
        let matched = filters.apply(&all);

        debug!(
            cached = all.len(),
            matched = matched.len(),
            "Offline property search"
        );
        Ok(matched)
    }
}

/// Upserts one record by key.
async fn upsert<T: Serialize>(
    tx: &mut StoreTx,
    table: Table,
    key: &str,
    item: &T,
    cached_at: i64,
) -> DbResult<()> {
    let payload = serde_json::to_string(item)?;
    let sql = format!(
        "INSERT INTO {} (cache_key, payload, cached_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(cache_key) DO UPDATE SET
             payload = excluded.payload,
             cached_at = excluded.cached_at",
        table.name()
    );

    sqlx::query(&sql)
        .bind(key)
        .bind(payload)
        .bind(cached_at)
        .execute(tx.writer(table)?)
        .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
