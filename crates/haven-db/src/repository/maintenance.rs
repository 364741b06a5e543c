//! # Cache Maintenance
//!
//! Expiry sweep for TTL-bound tables and on-demand storage statistics.
//!
//! ## Sweep
//! ```text
//!  search_results ordered by cached_at (indexed)
//!  ┌──────┬──────┬──────┬──────┬──────┬──────┬──────────────┐
//!  │ t-50h│ t-40h│ t-30h│ t-26h│ t-25h│ t-2h │ t-1h  ...    │
//!  └──────┴──────┴──────┴──────┴──────┴──────┴──────────────┘
//!  ◄── batch 1 ──►◄── batch 2 ──►◄ b3 ►│◄── fresh, untouched ──►
//!       tx             tx          tx  │
//!                                cutoff = now - 24h
//! ```
//!
//! Each batch is its own short transaction, so a concurrent reader sees a
//! row either before or after its batch, never half a sweep. Running the
//! sweep again right away deletes nothing.

use serde::Serialize;
use tracing::{debug, info};

use haven_core::{search_result_ttl, StorageStats};

use super::to_millis;
use crate::error::DbResult;
use crate::pool::Database;
use crate::store::{Table, TxMode};

/// Keys deleted per sweep transaction.
pub const SWEEP_BATCH_SIZE: u32 = 200;

/// Outcome of one `clear_old_cache` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired search result rows deleted.
    pub search_results_removed: u64,
    /// Transactions committed.
    pub batches: u32,
}

/// Sweeps and stats over the whole store.
#[derive(Debug, Clone)]
pub struct Maintenance {
    db: Database,
    batch_size: u32,
}

impl Maintenance {
    pub fn new(db: Database) -> Self {
        Maintenance {
            db,
            batch_size: SWEEP_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Deletes search results older than their TTL, oldest first.
    pub async fn clear_old_cache(&self) -> DbResult<SweepReport> {
        let cutoff = to_millis(self.db.clock().now()) - search_result_ttl().num_milliseconds();
        let mut report = SweepReport::default();

        loop {
            let mut tx = self
                .db
                .transaction(&[Table::SearchResults], TxMode::ReadWrite)
                .await?;

            let result = sqlx::query(
                r#"
                DELETE FROM search_results
                WHERE query_key IN (
                    SELECT query_key FROM search_results
                    WHERE cached_at < ?1
                    ORDER BY cached_at ASC
                    LIMIT ?2
                )
                "#,
            )
            .bind(cutoff)
            .bind(self.batch_size as i64)
            .execute(tx.writer(Table::SearchResults)?)
            .await?;

            tx.commit().await?;

            let removed = result.rows_affected();
            report.search_results_removed += removed;
            report.batches += 1;
            debug!(removed, batch = report.batches, "Sweep batch committed");

            if removed < self.batch_size as u64 {
                break;
            }
        }

        info!(
            removed = report.search_results_removed,
            batches = report.batches,
            "Expired cache entries cleared"
        );
        Ok(report)
    }

    /// Row counts per table, read from one snapshot.
    pub async fn get_storage_stats(&self) -> DbResult<StorageStats> {
        let mut tx = self.db.transaction(&Table::ALL, TxMode::ReadOnly).await?;
        let mut stats = StorageStats::default();

        for table in Table::ALL {
            let sql = format!("SELECT COUNT(*) FROM {}", table.name());
            let count: i64 = sqlx::query_scalar(&sql)
                .fetch_one(tx.reader(table)?)
                .await?;
            let count = count.max(0) as u64;

            match table {
                Table::Properties => stats.properties = count,
                Table::Regions => stats.regions = count,
                Table::Features => stats.features = count,
                Table::Actions => stats.actions = count,
                Table::SearchResults => stats.search_results = count,
            }
        }

        tx.commit().await?;
        Ok(stats)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use chrono::{Duration, Utc};
    use haven_core::{ActionType, ManualClock, NewOfflineAction, SearchFilters};
    use serde_json::json;
    use std::sync::Arc;

    async fn db_with_clock() -> (Database, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (db, clock)
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired_in_batches() {
        let (db, clock) = db_with_clock().await;
        let cache = db.search_cache();

        for i in 0..5 {
            cache
                .cache_search_results(&format!("old {}", i), &SearchFilters::new(), &[i])
                .await;
        }
        clock.advance(Duration::hours(20));
        let fresh = cache
            .cache_search_results("fresh", &SearchFilters::new(), &[99])
            .await;
        clock.advance(Duration::hours(5));

        let report = db.maintenance().with_batch_size(2).clear_old_cache().await.unwrap();
        assert_eq!(report.search_results_removed, 5);
        assert_eq!(report.batches, 3);

        let kept: Option<Vec<i32>> = cache.get_cached_search_results(&fresh).await;
        assert_eq!(kept, Some(vec![99]));

        let again = db.maintenance().clear_old_cache().await.unwrap();
        assert_eq!(again.search_results_removed, 0);
        assert_eq!(db.maintenance().get_storage_stats().await.unwrap().search_results, 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_entry_at_exact_ttl() {
        let (db, clock) = db_with_clock().await;
        db.search_cache()
            .cache_search_results("edge", &SearchFilters::new(), &[1])
            .await;

        clock.advance(Duration::hours(24));
        let report = db.maintenance().clear_old_cache().await.unwrap();
        assert_eq!(report.search_results_removed, 0);
    }

    #[tokio::test]
    async fn test_storage_stats_counts_every_table() {
        let (db, _clock) = db_with_clock().await;

        db.actions()
            .add_offline_action(NewOfflineAction::new(
                ActionType::SaveProperty,
                "/saved-properties",
                json!({"property_id": "p-1"}),
            ))
            .await
            .unwrap();
        db.search_cache()
            .cache_search_results("q", &SearchFilters::new(), &[1])
            .await;

        let stats = db.maintenance().get_storage_stats().await.unwrap();
        assert_eq!(
            stats,
            StorageStats {
                properties: 0,
                regions: 0,
                features: 0,
                actions: 1,
                search_results: 1,
            }
        );
    }
}
