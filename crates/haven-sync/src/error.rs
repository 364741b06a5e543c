//! # Sync Error Types
//!
//! Error types for connectivity, replay and configuration.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Replay      │  │     Store               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Http           │  │  Database(DbError)      │ │
//! │  │  InvalidUrl     │  │  ReplayFailed   │  │                         │ │
//! │  │  ConfigLoad/Save│  │  MaxRetries...  │  │                         │ │
//! │  │                 │  │  Offline        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use haven_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Every failure the sync layer can report.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API base URL.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Replay Errors
    // =========================================================================
    /// The request never produced a response (DNS, connect, timeout).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The API answered with a non-success status.
    #[error("Replay rejected with HTTP {status}: {message}")]
    ReplayFailed { status: u16, message: String },

    /// An action used up its attempts and will not be replayed again.
    #[error("Max retries exceeded for offline action {id}: {last_error}")]
    MaxRetriesExceeded { id: i64, last_error: String },

    /// A replay was requested while the device is offline.
    #[error("Device is offline")]
    Offline,

    // =========================================================================
    // Store Errors
    // =========================================================================
    /// Offline store failure.
    #[error("Offline store error: {0}")]
    Database(#[from] DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal sync error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SyncError::ReplayFailed {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => SyncError::Http(err.to_string()),
        }
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if trying the same thing again later may succeed.
    ///
    /// ## Retryable
    /// - No response at all (network down, timeout)
    /// - 408, 429 and 5xx responses
    /// - Aborted store transactions
    ///
    /// ## Non-Retryable
    /// - Other 4xx responses (the payload itself is rejected)
    /// - Configuration errors, exhausted actions, unavailable store
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Http(_) | SyncError::Offline => true,
            SyncError::ReplayFailed { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            SyncError::Database(DbError::TransactionAborted(_)) => true,
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Http("connection refused".into()).is_retryable());
        assert!(SyncError::Offline.is_retryable());
        assert!(SyncError::ReplayFailed { status: 503, message: "busy".into() }.is_retryable());
        assert!(SyncError::ReplayFailed { status: 429, message: "slow down".into() }.is_retryable());

        assert!(!SyncError::ReplayFailed { status: 422, message: "bad payload".into() }.is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::Database(DbError::StoreUnavailable("gone".into())).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::MaxRetriesExceeded {
            id: 7,
            last_error: "HTTP 500".into(),
        };
        assert!(err.to_string().contains('7'));
        assert!(err.to_string().contains("HTTP 500"));
        assert!(SyncError::InvalidUrl("x".into()).is_config_error());
    }
}
