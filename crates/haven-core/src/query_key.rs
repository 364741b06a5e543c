//! # Search Cache Keys
//!
//! Stable signature of a search: normalized query text plus a canonical form
//! of the filter set, hashed with SHA-256.
//!
//! ```text
//! "  Solar  HOMES " + {"region":"Ashanti","eco_features":["Solar","LED"]}
//!        │                                   │
//!        ▼                                   ▼
//!   "solar homes"          {"eco_features":["LED","Solar"],"region":"Ashanti"}
//!        │                                   │
//!        └────────────── sha256 ─────────────┘
//!                          │
//!                          ▼
//!                 QueryKey("9f2c…")  (64 hex chars)
//! ```
//!
//! Two filter sets with the same key/value pairs produce the same key no
//! matter which order their properties were inserted in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use ts_rs::TS;

use crate::filters::SearchFilters;

/// Hex-encoded SHA-256 signature of a normalized search.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QueryKey(String);

impl QueryKey {
    /// Computes the key for a query and an arbitrary JSON filter set.
    pub fn compute(query: &str, filters: &Value) -> Self {
        let canonical = canonicalize(filters);
        let mut hasher = Sha256::new();
        hasher.update(normalize_query(query).as_bytes());
        hasher.update([0u8]);
        hasher.update(canonical.to_string().as_bytes());
        QueryKey(format!("{:x}", hasher.finalize()))
    }

    /// Computes the key for typed search filters.
    pub fn for_search(query: &str, filters: &SearchFilters) -> Self {
        let value = serde_json::to_value(filters).unwrap_or(Value::Null);
        Self::compute(query, &value)
    }

    /// Wraps a key previously handed out to the UI.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        QueryKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trims, lower-cases and collapses internal whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Produces an order-independent JSON form of a filter set.
///
/// Object keys are sorted, `null` members are dropped, and arrays made only
/// of strings are sorted and de-duplicated (they are sets, e.g. eco features).
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) if items.iter().all(Value::is_string) => {
            let mut strings: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            strings.sort_unstable();
            strings.dedup();
            Value::Array(strings.into_iter().map(|s| Value::String(s.to_string())).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
