//! # Sync Agent
//!
//! Main orchestrator of the offline layer. Opens the store and runs the
//! background services that keep it in step with the API.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncAgent                                │  │
//! │  │                                                                  │  │
//! │  │  • Opens the OfflineStore                                        │  │
//! │  │  • Spawns and stops the background services                      │  │
//! │  │  • Queues actions and nudges the replay worker                   │  │
//! │  │  • Reports SyncStatus for the UI indicator                       │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  HttpProbe     │  │ ReplayWorker   │  │ MaintenanceSweeper     │    │
//! │  │  (optional)    │  │                │  │                        │    │
//! │  │                │  │ Drains the     │  │ Removes expired        │    │
//! │  │ Feeds the      │  │ action queue   │  │ search results         │    │
//! │  │ monitor        │  │ when online    │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use haven_core::{NewOfflineAction, OfflineAction};
use haven_db::OfflineStore;

use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityMonitor, HttpProbe, ProbeHandle};
use crate::error::{SyncError, SyncResult};
use crate::maintenance::{MaintenanceSweeper, SweeperHandle};
use crate::replay::{ActionReplayer, HttpReplayer, ReplayHandle, ReplayWorker};

// =============================================================================
// Sync Status
// =============================================================================

/// Snapshot for the UI's sync indicator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    /// Current connectivity.
    pub online: bool,

    /// Actions still waiting to be replayed.
    pub pending: u64,

    /// Actions that reached the retry ceiling and will not be replayed.
    pub failed: u64,

    /// Error of the oldest action that has failed at least once.
    pub last_error: Option<String>,
}

// =============================================================================
// Sync Agent
// =============================================================================

/// Owns the offline store and its background services.
pub struct SyncAgent {
    config: Arc<SyncConfig>,
    store: Arc<OfflineStore>,
    connectivity: ConnectivityMonitor,
    replayer: Arc<dyn ActionReplayer>,

    replay_handle: Option<ReplayHandle>,
    sweeper_handle: Option<SweeperHandle>,
    probe_handle: Option<ProbeHandle>,
}

impl SyncAgent {
    /// Creates an agent with the HTTP replayer, the configured store and
    /// the process-wide connectivity monitor.
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        SyncAgentBuilder::new(config).build()
    }

    pub fn store(&self) -> &Arc<OfflineStore> {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn is_running(&self) -> bool {
        self.replay_handle.is_some()
    }

    /// Opens the store and spawns the background services.
    ///
    /// Calling this on a running agent does nothing.
    pub async fn start(&mut self) -> SyncResult<()> {
        if self.is_running() {
            return Ok(());
        }

        self.config.validate()?;
        let db = self.store.init().await?.clone();

        info!(
            client_id = %self.config.client_id(),
            api = %self.config.api.base_url,
            online = self.connectivity.is_online(),
            "Starting sync agent"
        );

        let (worker, replay_handle) = ReplayWorker::new(
            db.clone(),
            Arc::clone(&self.replayer),
            self.connectivity.clone(),
            self.config.retry_policy(),
            self.config.replay.poll_interval(),
        );
        tokio::spawn(worker.run());
        self.replay_handle = Some(replay_handle);

        let (sweeper, sweeper_handle) = MaintenanceSweeper::new(
            db,
            Duration::from_secs(self.config.maintenance.sweep_interval_secs),
        );
        tokio::spawn(sweeper.run());
        self.sweeper_handle = Some(sweeper_handle);

        if self.config.connectivity.probe_enabled {
            let probe = HttpProbe::from_settings(&self.config.api, &self.config.connectivity)?;
            self.probe_handle = Some(probe.spawn(self.connectivity.clone()));
        }

        info!("Sync agent started");
        Ok(())
    }

    /// Queues a mutation and asks the worker to try it right away.
    pub async fn queue_action(&self, action: NewOfflineAction) -> SyncResult<OfflineAction> {
        let queued = self.store.add_offline_action(action).await?;
        if let Some(ref handle) = self.replay_handle {
            handle.trigger();
        }
        Ok(queued)
    }

    /// Returns the current sync status.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let policy = self.config.retry_policy();
        let actions = self.store.get_pending_actions().await?;

        let failed = actions.iter().filter(|a| policy.is_exhausted(a)).count() as u64;
        let last_error = actions.iter().find_map(|a| a.last_error.clone());

        Ok(SyncStatus {
            online: self.connectivity.is_online(),
            pending: actions.len() as u64 - failed,
            failed,
            last_error,
        })
    }

    /// Stops the background services. The store stays open.
    pub async fn shutdown(&mut self) -> SyncResult<()> {
        info!("Shutting down sync agent");

        if let Some(handle) = self.probe_handle.take() {
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "Probe shutdown failed");
            }
        }

        if let Some(handle) = self.sweeper_handle.take() {
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "Sweeper shutdown failed");
            }
        }

        if let Some(handle) = self.replay_handle.take() {
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "Replay worker shutdown failed");
            }
        }

        info!("Sync agent stopped");
        Ok(())
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating SyncAgent with options.
pub struct SyncAgentBuilder {
    config: SyncConfig,
    store: Option<Arc<OfflineStore>>,
    connectivity: Option<ConnectivityMonitor>,
    replayer: Option<Arc<dyn ActionReplayer>>,
}

impl SyncAgentBuilder {
    /// Creates a new builder with the given config.
    pub fn new(config: SyncConfig) -> Self {
        SyncAgentBuilder {
            config,
            store: None,
            connectivity: None,
            replayer: None,
        }
    }

    /// Shares an existing store instead of opening the configured one.
    pub fn with_store(mut self, store: Arc<OfflineStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses a dedicated monitor instead of the process-wide one.
    pub fn with_connectivity(mut self, connectivity: ConnectivityMonitor) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Replaces the HTTP replayer.
    pub fn with_replayer(mut self, replayer: Arc<dyn ActionReplayer>) -> Self {
        self.replayer = Some(replayer);
        self
    }

    /// Builds the SyncAgent.
    pub fn build(self) -> SyncResult<SyncAgent> {
        let store = match self.store {
            Some(store) => store,
            None => Arc::new(OfflineStore::new(self.config.store.db_config()?)),
        };

        let replayer: Arc<dyn ActionReplayer> = match self.replayer {
            Some(replayer) => replayer,
            None => Arc::new(HttpReplayer::new(&self.config.api, self.config.client_id())?),
        };

        let connectivity = self
            .connectivity
            .unwrap_or_else(|| ConnectivityMonitor::global().clone());

        if self.config.client_id().is_empty() {
            return Err(SyncError::InvalidConfig("client.id must not be empty".into()));
        }

        Ok(SyncAgent {
            config: Arc::new(self.config),
            store,
            connectivity,
            replayer,
            replay_handle: None,
            sweeper_handle: None,
            probe_handle: None,
        })
    }
}
