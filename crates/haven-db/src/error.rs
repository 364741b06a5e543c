//! # Store Error Types
//!
//! Error types for offline store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Classified by what the caller should do       │
//! │       │                                                                 │
//! │       ├── StoreUnavailable   → UI falls back to network-only mode       │
//! │       ├── QuotaExceeded      → this write dropped, siblings continue    │
//! │       ├── TransactionAborted → this operation failed, retry is up to   │
//! │       │                        the caller                               │
//! │       └── NotFound / ScopeViolation / Serialization                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::store::{Table, TxMode};

/// SQLite primary result code for "database or disk is full".
const SQLITE_FULL: &str = "13";

/// Offline store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// The store cannot be opened or its schema upgraded.
    ///
    /// ## When This Occurs
    /// - Data directory not writable
    /// - Database file corrupt or locked by another process
    /// - Migration failed
    ///
    /// Permanent for the session: offline features are disabled.
    #[error("Offline store unavailable: {0}")]
    StoreUnavailable(String),

    /// A write was rejected because the store is full.
    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A read or write failed mid-flight; nothing from it is visible.
    #[error("Transaction aborted: {0}")]
    TransactionAborted(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A transaction touched a table outside its scope, or wrote in read-only mode.
    #[error("Table '{table}' is not writable/readable in this {mode} transaction")]
    ScopeViolation { table: Table, mode: TxMode },

    /// A payload could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Input rejected by domain validation before touching the store.
    #[error("Invalid input: {0}")]
    Invalid(#[from] haven_core::CoreError),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// True when the failure disables the offline layer for the session.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DbError::StoreUnavailable(_))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// SQLITE_FULL / "disk is full"          → DbError::QuotaExceeded
/// PoolClosed / Io / Configuration / Tls → DbError::StoreUnavailable
/// RowNotFound                           → DbError::NotFound
/// Other                                 → DbError::TransactionAborted
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),

            sqlx::Error::Database(db_err) => {
                let is_full = db_err.code().as_deref() == Some(SQLITE_FULL)
                    || db_err.message().contains("database or disk is full");
                if is_full {
                    DbError::QuotaExceeded(db_err.message().to_string())
                } else {
                    DbError::TransactionAborted(db_err.message().to_string())
                }
            }

            sqlx::Error::PoolClosed => DbError::StoreUnavailable("Store is closed".to_string()),

            sqlx::Error::Io(_) | sqlx::Error::Configuration(_) | sqlx::Error::Tls(_) => {
                DbError::StoreUnavailable(err.to_string())
            }

            _ => DbError::TransactionAborted(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::StoreUnavailable(format!("schema upgrade failed: {}", err))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_closed_is_unavailable() {
        let err: DbError = sqlx::Error::PoolClosed.into();
        assert!(err.is_unavailable());
    }

    #[test]
    fn test_timeout_is_aborted() {
        let err: DbError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, DbError::TransactionAborted(_)));
    }

    #[test]
    fn test_scope_violation_message() {
        let err = DbError::ScopeViolation {
            table: Table::Actions,
            mode: TxMode::ReadOnly,
        };
        assert!(err.to_string().contains("offline_actions"));
        assert!(err.to_string().contains("read-only"));
    }
}
