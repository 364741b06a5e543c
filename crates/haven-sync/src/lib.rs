//! # haven-sync: Connectivity and Replay for the Haven Offline Client
//!
//! Decides when the device is online and drains the offline action queue
//! against the marketplace API once it is.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Agent Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      SyncAgent (Main Orchestrator)               │  │
//! │  │                                                                  │  │
//! │  │  Opens the OfflineStore, spawns the services below as tasks      │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ Connectivity   │  │ ReplayWorker   │  │ MaintenanceSweeper     │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Online/Offline │─►│ FIFO drain     │  │ clear_old_cache on an  │    │
//! │  │ watch channel  │  │ retry ceiling  │  │ interval               │    │
//! │  │ + HttpProbe    │  │ + backoff      │  │                        │    │
//! │  └────────────────┘  └───────┬────────┘  └────────────────────────┘    │
//! │                              │                                          │
//! │                              ▼                                          │
//! │                   HttpReplayer (reqwest) ──► marketplace API           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - Main `SyncAgent` orchestrator
//! - [`config`] - TOML + environment configuration
//! - [`connectivity`] - Connectivity state machine and reachability probe
//! - [`replay`] - Action replayer and queue drain worker
//! - [`maintenance`] - Periodic cache sweep
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use haven_sync::{SyncAgent, SyncConfig};
//!
//! let config = SyncConfig::load_or_default(None);
//! let mut agent = SyncAgent::new(config)?;
//! agent.start().await?;
//!
//! // UI code keeps using the store directly
//! let listings = agent.store().search_properties_offline(&filters).await?;
//!
//! // Mutations made offline are queued and replayed later
//! agent.queue_action(inquiry).await?;
//!
//! let status = agent.status().await?;
//! println!("online: {}, pending: {}", status.online, status.pending);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod maintenance;
pub mod replay;

// =============================================================================
// Re-exports
// =============================================================================

pub use agent::{SyncAgent, SyncAgentBuilder, SyncStatus};
pub use config::SyncConfig;
pub use connectivity::{
    is_online, wait_for_online, Connectivity, ConnectivityMonitor, ConnectivityState, HttpProbe,
    ProbeHandle,
};
pub use error::{SyncError, SyncResult};
pub use maintenance::{MaintenanceSweeper, SweeperHandle};
pub use replay::{ActionReplayer, DrainReport, HttpReplayer, ReplayHandle, ReplayWorker};
