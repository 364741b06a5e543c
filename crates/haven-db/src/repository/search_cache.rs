//! # Search Result Cache
//!
//! Materialized search results keyed by a normalized query signature
//! ([`QueryKey`]), valid for [`SEARCH_RESULT_TTL_HOURS`] hours.
//!
//! ## Freshness
//! ```text
//!   cached_at                         cached_at + 24h
//!      │◄────────────── fresh ───────────────►│◄──── stale ────►
//!      ▼                                      ▼
//!  ────●──────────────────────────────────────●──────────────────► now
//!                                             │
//!                               now - cached_at == 24h → still fresh
//!                               now - cached_at  > 24h → None
//! ```
//!
//! Stale rows stay on disk until the next maintenance sweep.
//!
//! The whole cache is advisory. A miss, a stale row, a storage error or an
//! undecodable row all read as `None`, and a failed write only logs.
//!
//! [`SEARCH_RESULT_TTL_HOURS`]: haven_core::SEARCH_RESULT_TTL_HOURS

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::Row;
use tracing::{debug, warn};

use haven_core::query_key::canonicalize;
use haven_core::{search_result_ttl, QueryKey, SearchFilters};

use super::to_millis;
use crate::error::DbResult;
use crate::pool::Database;
use crate::store::{Table, TxMode};

/// Repository over `search_results`.
#[derive(Debug, Clone)]
pub struct SearchCache {
    db: Database,
}

impl SearchCache {
    pub fn new(db: Database) -> Self {
        SearchCache { db }
    }

    /// Stores the results of a typed search. Returns the key to read them back.
    pub async fn cache_search_results<T: Serialize>(
        &self,
        query: &str,
        filters: &SearchFilters,
        results: &[T],
    ) -> QueryKey {
        let filters = serde_json::to_value(filters).unwrap_or(Value::Null);
        self.cache_raw(query, &filters, results).await
    }

    /// Stores results for an arbitrary JSON filter object.
    pub async fn cache_raw<T: Serialize>(&self, query: &str, filters: &Value, results: &[T]) -> QueryKey {
        let key = QueryKey::compute(query, filters);

        match self.upsert(&key, query, filters, results).await {
            Ok(()) => debug!(key = %key, count = results.len(), "Cached search results"),
            Err(e) => warn!(key = %key, error = %e, "Failed to cache search results"),
        }

        key
    }

    /// Cached results for `key`, or `None` when missing, stale or unreadable.
    pub async fn get_cached_search_results<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<Vec<T>> {
        match self.lookup(key).await {
            Ok(results) => results,
            Err(e) => {
                warn!(key = %key, error = %e, "Search cache read failed");
                None
            }
        }
    }

    async fn upsert<T: Serialize>(
        &self,
        key: &QueryKey,
        query: &str,
        filters: &Value,
        results: &[T],
    ) -> DbResult<()> {
        let filters = canonicalize(filters).to_string();
        let results = serde_json::to_string(results)?;
        let cached_at = to_millis(self.db.clock().now());

        let mut tx = self
            .db
            .transaction(&[Table::SearchResults], TxMode::ReadWrite)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO search_results (query_key, query, filters, results, cached_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(query_key) DO UPDATE SET
                query = excluded.query,
                filters = excluded.filters,
                results = excluded.results,
                cached_at = excluded.cached_at
            "#,
        )
        .bind(key.as_str())
        .bind(query)
        .bind(filters)
        .bind(results)
        .bind(cached_at)
        .execute(tx.writer(Table::SearchResults)?)
        .await?;

        tx.commit().await
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &QueryKey) -> DbResult<Option<Vec<T>>> {
        let mut tx = self
            .db
            .transaction(&[Table::SearchResults], TxMode::ReadOnly)
            .await?;

        let row = sqlx::query("SELECT results, cached_at FROM search_results WHERE query_key = ?1")
            .bind(key.as_str())
            .fetch_optional(tx.reader(Table::SearchResults)?)
            .await?;
        tx.commit().await?;

        let Some(row) = row else {
            debug!(key = %key, "Search cache miss");
            return Ok(None);
        };

        let cached_at: i64 = row.try_get("cached_at")?;
        let age_millis = to_millis(self.db.clock().now()) - cached_at;
        if age_millis > search_result_ttl().num_milliseconds() {
            debug!(key = %key, age_millis, "Search cache entry stale");
            return Ok(None);
        }

        let results: String = row.try_get("results")?;
        Ok(Some(serde_json::from_str(&results)?))
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
    use haven_core::{ListingType, ManualClock};
    use serde_json::json;
    use std::sync::Arc;

    async fn cache_with_clock() -> (SearchCache, ManualClock) {
        let clock = ManualClock::new(Utc::now());
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        (db.search_cache(), clock)
    }

    #[tokio::test]
    async fn test_round_trip_within_ttl() {
        let (cache, _clock) = cache_with_clock().await;
        let filters = SearchFilters::new().listing_type(ListingType::Rent);

        let key = cache
            .cache_search_results("flats", &filters, &["p-1", "p-2"])
            .await;

        let results: Vec<String> = cache.get_cached_search_results(&key).await.unwrap();
        assert_eq!(results, vec!["p-1", "p-2"]);
    }

    #[tokio::test]
    async fn test_ttl_boundary() {
        let (cache, clock) = cache_with_clock().await;
        let key = cache
            .cache_search_results("solar", &SearchFilters::new(), &[1, 2, 3])
            .await;

        clock.advance(Duration::hours(24));
        let at_limit: Option<Vec<i32>> = cache.get_cached_search_results(&key).await;
        assert_eq!(at_limit, Some(vec![1, 2, 3]));

        clock.advance(Duration::milliseconds(1));
        let past_limit: Option<Vec<i32>> = cache.get_cached_search_results(&key).await;
        assert_eq!(past_limit, None);
    }

    #[tokio::test]
    async fn test_equal_filters_share_a_row() {
        let (cache, _clock) = cache_with_clock().await;
        let first = json!({"region": "Ashanti", "eco_features": ["Solar", "LED Lighting"]});
        let second = json!({"eco_features": ["LED Lighting", "Solar"], "region": "Ashanti"});

        let key = cache.cache_raw("homes", &first, &["old"]).await;
        let same = cache.cache_raw("  Homes ", &second, &["new"]).await;
        assert_eq!(key, same);

        let results: Vec<String> = cache.get_cached_search_results(&key).await.unwrap();
        assert_eq!(results, vec!["new"]);

        let stats = cache.db.maintenance().get_storage_stats().await.unwrap();
        assert_eq!(stats.search_results, 1);
    }

    #[tokio::test]
    async fn test_unknown_key_is_none() {
        let (cache, _clock) = cache_with_clock().await;
        let missing: Option<Vec<String>> = cache
            .get_cached_search_results(&QueryKey::from_raw("does-not-exist"))
            .await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_results_are_none() {
        let (cache, _clock) = cache_with_clock().await;
        let key = cache
            .cache_search_results("beds", &SearchFilters::new(), &["not a number"])
            .await;

        let wrong_shape: Option<Vec<u32>> = cache.get_cached_search_results(&key).await;
        assert!(wrong_shape.is_none());
    }

    #[tokio::test]
    async fn test_closed_store_reads_as_miss() {
        let (cache, _clock) = cache_with_clock().await;
        let key = cache
            .cache_search_results("beds", &SearchFilters::new(), &[1])
            .await;
        cache.db.close().await;

        let results: Option<Vec<i32>> = cache.get_cached_search_results(&key).await;
        assert!(results.is_none());
    }
}
