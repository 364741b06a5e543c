//! # Offline Store Facade
//!
//! The surface UI code calls. Opens the store lazily on first use and keeps
//! the outcome for the rest of the session.
//!
//! ## Initialization States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Uninitialized ──init()──► Ready(Database)                             │
//! │         │                        │                                      │
//! │         │                        └── every later init() returns it      │
//! │         │                                                               │
//! │         └────────init()──► Unavailable(reason)                          │
//! │                                  │                                      │
//! │                                  └── every later call fails with        │
//! │                                      StoreUnavailable; no auto retry    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy per Operation
//!
//! | Operation                     | On storage failure            |
//! |-------------------------------|-------------------------------|
//! | `cache_*`                     | logged, counted in the report |
//! | `cache_search_results`        | logged                        |
//! | `get_cached_search_results`   | `None`                        |
//! | queue / search / maintenance  | `Err(DbError)`                |

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{error, warn};

use haven_core::{
    Clock, EcoFeature, GhanaRegion, NewOfflineAction, OfflineAction, Property, QueryKey,
    SearchFilters, StorageStats, SystemClock,
};

use crate::error::{DbError, DbResult};
use crate::pool::{Database, DbConfig};
use crate::repository::entity::{CacheWriteReport, CachedEntity};
use crate::repository::maintenance::SweepReport;

/// Lazily opened offline store.
#[derive(Debug)]
pub struct OfflineStore {
    config: DbConfig,
    clock: Arc<dyn Clock>,
    state: OnceCell<Result<Database, String>>,
}

impl OfflineStore {
    pub fn new(config: DbConfig) -> Self {
        OfflineStore {
            config,
            clock: Arc::new(SystemClock),
            state: OnceCell::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Opens the store on the first call; later calls return the same
    /// handle, or the same failure.
    pub async fn init(&self) -> DbResult<&Database> {
        let state = self
            .state
            .get_or_init(|| async {
                match Database::new(self.config.clone()).await {
                    Ok(db) => Ok(db.with_clock(Arc::clone(&self.clock))),
                    Err(e) => {
                        error!(error = %e, "Offline store unavailable, offline features disabled");
                        Err(match e {
                            DbError::StoreUnavailable(reason) => reason,
                            other => other.to_string(),
                        })
                    }
                }
            })
            .await;

        match state {
            Ok(db) => Ok(db),
            Err(reason) => Err(DbError::StoreUnavailable(reason.clone())),
        }
    }

    /// The open store, if `init` has succeeded.
    pub fn database(&self) -> Option<&Database> {
        self.state.get().and_then(|state| state.as_ref().ok())
    }

    // =========================================================================
    // Entity Cache
    // =========================================================================

    pub async fn cache_properties(&self, properties: &[Property]) -> CacheWriteReport {
        self.cache(properties).await
    }

    pub async fn cache_ghana_regions(&self, regions: &[GhanaRegion]) -> CacheWriteReport {
        self.cache(regions).await
    }

    pub async fn cache_eco_features(&self, features: &[EcoFeature]) -> CacheWriteReport {
        self.cache(features).await
    }

    async fn cache<T: CachedEntity>(&self, items: &[T]) -> CacheWriteReport {
        match self.init().await {
            Ok(db) => db.entities().cache(items).await,
            Err(e) => {
                warn!(table = %T::TABLE, error = %e, "Offline store unavailable, not caching");
                CacheWriteReport {
                    written: 0,
                    failed: items.len(),
                }
            }
        }
    }

    pub async fn search_properties_offline(
        &self,
        filters: &SearchFilters,
    ) -> DbResult<Vec<Property>> {
        self.init()
            .await?
            .entities()
            .search_properties_offline(filters)
            .await
    }

    // =========================================================================
    // Search Result Cache
    // =========================================================================

    /// Caches a search's results. The returned key is computed even when the
    /// store is unavailable, so the UI can always ask for it later.
    pub async fn cache_search_results<T: Serialize>(
        &self,
        query: &str,
        filters: &SearchFilters,
        results: &[T],
    ) -> QueryKey {
        match self.init().await {
            Ok(db) => {
                db.search_cache()
                    .cache_search_results(query, filters, results)
                    .await
            }
            Err(e) => {
                warn!(error = %e, "Offline store unavailable, not caching search results");
                QueryKey::for_search(query, filters)
            }
        }
    }

    pub async fn get_cached_search_results<T: DeserializeOwned>(
        &self,
        key: &QueryKey,
    ) -> Option<Vec<T>> {
        let db = self.init().await.ok()?;
        db.search_cache().get_cached_search_results(key).await
    }

    // =========================================================================
    // Offline Action Queue
    // =========================================================================

    pub async fn add_offline_action(&self, action: NewOfflineAction) -> DbResult<OfflineAction> {
        self.init().await?.actions().add_offline_action(action).await
    }

    pub async fn get_pending_actions(&self) -> DbResult<Vec<OfflineAction>> {
        self.init().await?.actions().get_pending_actions().await
    }

    pub async fn remove_action(&self, id: i64) -> DbResult<()> {
        self.init().await?.actions().remove_action(id).await
    }

    pub async fn increment_retry(&self, id: i64, error: &str) -> DbResult<OfflineAction> {
        self.init().await?.actions().increment_retry(id, error).await
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    pub async fn clear_old_cache(&self) -> DbResult<SweepReport> {
        self.init().await?.maintenance().clear_old_cache().await
    }

    pub async fn get_storage_stats(&self) -> DbResult<StorageStats> {
        self.init().await?.maintenance().get_storage_stats().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
