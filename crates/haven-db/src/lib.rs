//! # haven-db: Offline Store for the Haven Client
//!
//! Owns the on-device SQLite database: reference data caches, the search
//! result cache, the offline action queue and their maintenance.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Haven Offline Data Flow                          │
//! │                                                                         │
//! │  UI: listings page, inquiry form, saved searches                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     haven-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ OfflineStore  │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │  (lazy init)  │    │               │    │  (embedded)  │  │   │
//! │  │   │       │       │    │ EntityCache   │    │ 001_offline_ │  │   │
//! │  │   │   Database    │◄───│ SearchCache   │    │   cache.sql  │  │   │
//! │  │   │   StoreTx     │    │ ActionQueue   │    │              │  │   │
//! │  │   │               │    │ Maintenance   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ~/.local/share/marketplace/haven.db (platform data dir)       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`offline`] - Lazily initialized facade used by UI code
//! - [`pool`] - Store handle and configuration
//! - [`store`] - Table-scoped transactions
//! - [`repository`] - Entity cache, search cache, action queue, maintenance
//! - [`migrations`] - Embedded schema migrations
//! - [`error`] - Store error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use haven_db::{DbConfig, OfflineStore};
//! use haven_core::{ListingType, SearchFilters};
//!
//! let store = OfflineStore::new(DbConfig::new("path/to/haven.db"));
//! store.init().await?;
//!
//! store.cache_properties(&listings_from_api).await;
//! let rentals = store
//!     .search_properties_offline(&SearchFilters::new().listing_type(ListingType::Rent))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod offline;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use offline::OfflineStore;
pub use pool::{Database, DbConfig};
pub use store::{StoreTx, Table, TxMode};

// Repository re-exports for convenience
pub use repository::actions::ActionQueue;
pub use repository::entity::{CacheWriteReport, CachedEntity, EntityCache};
pub use repository::maintenance::{Maintenance, SweepReport, SWEEP_BATCH_SIZE};
pub use repository::search_cache::SearchCache;
