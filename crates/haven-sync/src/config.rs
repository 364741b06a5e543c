//! # Sync Configuration
//!
//! Configuration for the offline store, the replay worker and the
//! connectivity probe.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     HAVEN_API_BASE_URL=https://api.example.com                          │
//! │     HAVEN_DB_PATH=/tmp/haven.db                                         │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     ~/.config/marketplace/haven.toml (Linux)                            │
//! │     ~/Library/Application Support/com.haven.marketplace/haven.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! │     localhost API, platform data dir, 8 retries                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [client]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//!
//! [store]
//! path = "/path/to/haven.db"
//! max_size_mb = 50
//!
//! [api]
//! base_url = "https://api.example.com"
//! request_timeout_secs = 15
//!
//! [replay]
//! max_retries = 8
//! initial_backoff_ms = 1000
//! max_backoff_secs = 300
//! poll_interval_secs = 30
//!
//! [connectivity]
//! probe_enabled = true
//! probe_interval_secs = 20
//!
//! [maintenance]
//! sweep_interval_secs = 3600
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use haven_core::RetryPolicy;
use haven_db::DbConfig;

use crate::error::{SyncError, SyncResult};

const CONFIG_FILE_NAME: &str = "haven.toml";
const DB_FILE_NAME: &str = "haven.db";

// =============================================================================
// Client
// =============================================================================

/// Identity of this installation, sent with every replayed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Generated on first run if not provided.
    pub id: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            id: Uuid::new_v4().to_string(),
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Where the offline store lives and how large it may grow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Database file. Default: `haven.db` in the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Size quota in megabytes. Default: unbounded.
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl StoreSettings {
    /// The configured path, or the platform default.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(|| {
            directories::ProjectDirs::from("com", "haven", "marketplace")
                .map(|dirs| dirs.data_dir().join(DB_FILE_NAME))
        })
    }

    /// Store configuration for [`haven_db::OfflineStore`].
    pub fn db_config(&self) -> SyncResult<DbConfig> {
        let path = self
            .resolved_path()
            .ok_or_else(|| SyncError::InvalidConfig("no data directory for the offline store".into()))?;

        let mut config = DbConfig::new(path);
        if let Some(mb) = self.max_size_mb {
            config = config.max_size_bytes(mb.saturating_mul(1024 * 1024));
        }
        Ok(config)
    }
}

// =============================================================================
// API
// =============================================================================

/// Remote marketplace API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL every queued endpoint is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout() -> u64 {
    15
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Replay
// =============================================================================

/// Retry ceiling and pacing for draining the action queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySettings {
    /// Failed attempts after which an action is no longer replayed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after the first failure (milliseconds).
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for a single delay (seconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// How often the queue is re-checked while online and idle (seconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_max_retries() -> u32 {
    haven_core::retry::DEFAULT_MAX_RETRIES
}
fn default_initial_backoff() -> u64 {
    haven_core::retry::DEFAULT_INITIAL_BACKOFF.as_millis() as u64
}
fn default_max_backoff() -> u64 {
    haven_core::retry::DEFAULT_MAX_BACKOFF.as_secs()
}
fn default_poll_interval() -> u64 {
    30
}

impl Default for ReplaySettings {
    fn default() -> Self {
        ReplaySettings {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl ReplaySettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_secs(self.max_backoff_secs),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// =============================================================================
// Connectivity
// =============================================================================

/// Reachability probe settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivitySettings {
    /// Probe the API base URL instead of relying only on platform signals.
    #[serde(default = "default_true")]
    pub probe_enabled: bool,

    /// Interval between probes (seconds).
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,

    /// Timeout of a single probe (seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_probe_interval() -> u64 {
    20
}
fn default_probe_timeout() -> u64 {
    5
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        ConnectivitySettings {
            probe_enabled: true,
            probe_interval_secs: default_probe_interval(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

// =============================================================================
// Maintenance
// =============================================================================

/// Background sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    /// Interval between expiry sweeps (seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_sweep_interval() -> u64 {
    3600
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        MaintenanceSettings {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

// =============================================================================
// Main Sync Configuration
// =============================================================================

/// Complete configuration of the offline layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub replay: ReplaySettings,

    #[serde(default)]
    pub connectivity: ConnectivitySettings,

    #[serde(default)]
    pub maintenance: MaintenanceSettings,
}

impl SyncConfig {
    /// Creates a new config with defaults and a generated client ID.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (haven.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.client.id.is_empty() {
            return Err(SyncError::InvalidConfig("client.id must not be empty".into()));
        }

        let base = url::Url::parse(&self.api.base_url)?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.replay.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "replay.max_retries must be greater than 0".into(),
            ));
        }

        if Duration::from_millis(self.replay.initial_backoff_ms)
            > Duration::from_secs(self.replay.max_backoff_secs)
        {
            return Err(SyncError::InvalidConfig(
                "replay.initial_backoff_ms must not exceed replay.max_backoff_secs".into(),
            ));
        }

        if self.replay.poll_interval_secs == 0
            || self.connectivity.probe_interval_secs == 0
            || self.maintenance.sweep_interval_secs == 0
        {
            return Err(SyncError::InvalidConfig("intervals must be greater than 0".into()));
        }

        if self.store.max_size_mb == Some(0) {
            return Err(SyncError::InvalidConfig(
                "store.max_size_mb must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies `HAVEN_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(id) = var("HAVEN_CLIENT_ID") {
            debug!(client_id = %id, "Overriding client ID from environment");
            self.client.id = id;
        }

        if let Some(path) = var("HAVEN_DB_PATH") {
            debug!(path = %path, "Overriding store path from environment");
            self.store.path = Some(PathBuf::from(path));
        }

        if let Some(url) = var("HAVEN_API_BASE_URL") {
            debug!(url = %url, "Overriding API base URL from environment");
            self.api.base_url = url;
        }

        if let Some(retries) = var("HAVEN_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(n) => self.replay.max_retries = n,
                Err(_) => warn!(value = %retries, "Ignoring invalid HAVEN_MAX_RETRIES"),
            }
        }

        if let Some(enabled) = var("HAVEN_PROBE_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.connectivity.probe_enabled = true,
                "0" | "false" | "no" => self.connectivity.probe_enabled = false,
                _ => warn!(value = %enabled, "Ignoring invalid HAVEN_PROBE_ENABLED"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "haven", "marketplace")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn client_id(&self) -> &str {
        &self.client.id
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.replay.retry_policy()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert!(!config.client.id.is_empty());
        assert_eq!(config.replay.max_retries, 8);
        assert_eq!(config.retry_policy().initial_backoff, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = SyncConfig::default();

        config.api.base_url = "ftp://files.example.com".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidUrl(_))));

        config.api.base_url = "https://api.example.com/v1".to_string();
        assert!(config.validate().is_ok());

        config.replay.max_retries = 0;
        assert!(config.validate().is_err());

        config.replay.max_retries = 3;
        config.replay.initial_backoff_ms = 10_000;
        config.replay.max_backoff_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example.com"

            [replay]
            max_retries = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://api.example.com");
        assert_eq!(config.api.request_timeout_secs, 15);
        assert_eq!(config.replay.max_retries, 3);
        assert_eq!(config.replay.poll_interval_secs, 30);
        assert!(config.connectivity.probe_enabled);
        assert!(config.store.path.is_none());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HAVEN_DB_PATH", "/tmp/override.db"),
            ("HAVEN_API_BASE_URL", "https://staging.example.com"),
            ("HAVEN_MAX_RETRIES", "not-a-number"),
            ("HAVEN_PROBE_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let mut config = SyncConfig::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/override.db")));
        assert_eq!(config.api.base_url, "https://staging.example.com");
        assert_eq!(config.replay.max_retries, 8);
        assert!(!config.connectivity.probe_enabled);
    }

    #[test]
    fn test_huge_store_quota_saturates() {
        let mut config = SyncConfig::default();
        config.store.path = Some(PathBuf::from("/tmp/haven.db"));
        config.store.max_size_mb = Some(u64::MAX);
        assert!(config.validate().is_ok());

        let db_config = config.store.db_config().unwrap();
        assert_eq!(db_config.max_size_bytes, Some(u64::MAX));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join(CONFIG_FILE_NAME);

        let mut config = SyncConfig::default();
        config.store.max_size_mb = Some(25);
        config.save(Some(path.clone())).unwrap();

        let loaded = SyncConfig::load(Some(path)).unwrap();
        assert_eq!(loaded.store.max_size_mb, Some(25));
        assert_eq!(
            loaded.store.db_config().unwrap().max_size_bytes,
            Some(25 * 1024 * 1024)
        );
    }
}
