//! # haven-core: Pure Domain Layer for the Haven Offline Client
//!
//! Types and rules shared by the offline store (`haven-db`) and the sync
//! services (`haven-sync`). Nothing in here touches the disk or the network.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Haven Offline Layer                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web UI (pages, forms)                        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ haven-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  filters  │  │ query_key │  │   retry   │  │   │
//! │  │   │ Property  │  │  Search   │  │  SHA-256  │  │  backoff  │  │   │
//! │  │   │ Action    │  │  Filters  │  │  signature│  │  ceiling  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            haven-db (SQLite) / haven-sync (tokio)               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Cached reference data and queued actions
//! - [`filters`] - Offline search predicate
//! - [`query_key`] - Stable search cache keys
//! - [`retry`] - Backoff curve and retry ceiling for replays
//! - [`clock`] - Injectable time source
//! - [`validation`] - Checks applied before queueing
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use haven_core::{ListingType, QueryKey, SearchFilters};
//!
//! let filters = SearchFilters::new()
//!     .listing_type(ListingType::Sale)
//!     .green_score_min(70);
//!
//! // Same filters, same key, regardless of how the UI built them
//! let key = QueryKey::for_search("solar homes", &filters);
//! assert_eq!(key.as_str().len(), 64);
//! ```

pub mod clock;
pub mod error;
pub mod filters;
pub mod query_key;
pub mod retry;
pub mod types;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use filters::SearchFilters;
pub use query_key::QueryKey;
pub use retry::RetryPolicy;
pub use types::*;

/// Freshness window of cached search results.
pub const SEARCH_RESULT_TTL_HOURS: i64 = 24;

/// Returns the search result TTL as a chrono duration.
pub fn search_result_ttl() -> chrono::Duration {
    chrono::Duration::hours(SEARCH_RESULT_TTL_HOURS)
}
