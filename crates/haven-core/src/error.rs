//! # Error Types
//!
//! Domain-specific error types for haven-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  haven-core errors (this file)                                         │
//! │  └── CoreError        - Invalid domain input                           │
//! │                                                                         │
//! │  haven-db errors (separate crate)                                      │
//! │  └── DbError          - StoreUnavailable, QuotaExceeded, ...           │
//! │                                                                         │
//! │  haven-sync errors (separate crate)                                    │
//! │  └── SyncError        - ReplayFailed, config, transport                │
//! │                                                                         │
//! │  Flow: CoreError → DbError → SyncError → UI indicator                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Domain errors raised by pure validation and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// Persisted action type is not one we know how to replay.
    #[error("Unknown action type: {0}")]
    UnknownActionType(String),

    /// Action endpoint is not a relative API path.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// Filter value is out of range.
    #[error("Invalid filter {field}: {reason}")]
    InvalidFilter { field: String, reason: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidEndpoint {
            endpoint: "inquiries".to_string(),
            reason: "must start with '/'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid endpoint 'inquiries': must start with '/'"
        );
    }
}
