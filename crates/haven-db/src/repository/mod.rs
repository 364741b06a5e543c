//! # Repository Module
//!
//! Typed access to each part of the offline store.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Database                                                               │
//! │  ├── entities()      → EntityCache   properties / regions / features    │
//! │  ├── search_cache()  → SearchCache   search_results (24h TTL)           │
//! │  ├── actions()       → ActionQueue   offline_actions (FIFO)             │
//! │  └── maintenance()   → Maintenance   expiry sweep + row counts          │
//! │       │                                                                 │
//! │       │  every call opens its own StoreTx, scoped to its tables         │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`EntityCache`](entity::EntityCache) - Write-through reference data
//! - [`SearchCache`](search_cache::SearchCache) - Materialized search results
//! - [`ActionQueue`](actions::ActionQueue) - Durable mutation queue
//! - [`Maintenance`](maintenance::Maintenance) - Sweeps and stats

pub mod actions;
pub mod entity;
pub mod maintenance;
pub mod search_cache;

use chrono::{DateTime, Utc};

use crate::error::{DbError, DbResult};

/// Timestamps are stored as Unix milliseconds.
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> DbResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| DbError::Serialization(format!("timestamp out of range: {}", millis)))
}

/// `at` truncated to the precision the store keeps.
pub(crate) fn stored_precision(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at)
}
