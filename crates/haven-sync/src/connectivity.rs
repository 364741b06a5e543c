//! # Connectivity Monitor
//!
//! Tracks whether the marketplace API is reachable and lets tasks suspend
//! until it is.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Connectivity State Machine                         │
//! │                                                                         │
//! │              report(false)                                              │
//! │   ┌────────┐ ─────────────────────────► ┌─────────┐                     │
//! │   │ Online │                            │ Offline │                     │
//! │   └────────┘ ◄───────────────────────── └─────────┘                     │
//! │              report(true)                                               │
//! │              online_transitions += 1                                    │
//! │                                                                         │
//! │  SOURCES OF report():                                                   │
//! │  • Platform signals (network change callbacks in the host app)          │
//! │  • HttpProbe (periodic HEAD request against the API base URL)           │
//! │                                                                         │
//! │  WAITERS:                                                               │
//! │  • wait_for_online()    resolves now if online, else on next Online     │
//! │  • wait_for_reconnect() resolves on the next transition into Online     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The state lives in a `tokio::sync::watch` channel. A watch channel only
//! keeps the latest value, so a short Online blip between two Offline
//! reports could be missed by a slow waiter. Waiters therefore compare the
//! `online_transitions` counter instead of the current state: once it has
//! moved, the device was online at least once since the waiter subscribed.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::{ApiSettings, ConnectivitySettings};
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Connectivity
// =============================================================================

/// Whether the device can currently reach the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connectivity {
    Online,
    Offline,
}

impl Connectivity {
    pub fn is_online(self) -> bool {
        self == Connectivity::Online
    }
}

impl From<bool> for Connectivity {
    fn from(online: bool) -> Self {
        if online {
            Connectivity::Online
        } else {
            Connectivity::Offline
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Online => write!(f, "online"),
            Connectivity::Offline => write!(f, "offline"),
        }
    }
}

/// Value carried by the watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub connectivity: Connectivity,
    /// Number of Offline to Online transitions since the monitor was created.
    pub online_transitions: u64,
}

// =============================================================================
// Connectivity Monitor
// =============================================================================

static GLOBAL: OnceLock<ConnectivityMonitor> = OnceLock::new();

/// Shared connectivity state. Clones observe and drive the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        ConnectivityMonitor::new(Connectivity::Online)
    }
}

impl ConnectivityMonitor {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState {
            connectivity: initial,
            online_transitions: 0,
        });
        ConnectivityMonitor { tx: Arc::new(tx) }
    }

    /// Process-wide monitor. Starts Online until a signal says otherwise.
    pub fn global() -> &'static ConnectivityMonitor {
        GLOBAL.get_or_init(ConnectivityMonitor::default)
    }

    /// Feeds a platform or probe signal into the state machine.
    ///
    /// Reports that do not change the state are ignored and wake nobody.
    pub fn report(&self, online: bool) {
        let next = Connectivity::from(online);
        let changed = self.tx.send_if_modified(|state| {
            if state.connectivity == next {
                return false;
            }
            state.connectivity = next;
            if next.is_online() {
                state.online_transitions += 1;
            }
            true
        });

        if changed {
            info!(state = %next, "Connectivity changed");
        }
    }

    pub fn current(&self) -> Connectivity {
        self.tx.borrow().connectivity
    }

    pub fn is_online(&self) -> bool {
        self.current().is_online()
    }

    /// Receiver for callers that want every state change.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Resolves immediately when online, otherwise at the next transition
    /// into Online.
    ///
    /// The state is captured when this is called, not when the future is
    /// first polled, so a transition in between is not lost.
    pub fn wait_for_online(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let start = *rx.borrow_and_update();
        async move {
            if start.connectivity.is_online() {
                return;
            }
            wait_past(rx, start.online_transitions).await;
        }
    }

    /// Resolves at the next transition into Online, even if online now.
    pub fn wait_for_reconnect(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let start = *rx.borrow_and_update();
        wait_past(rx, start.online_transitions)
    }
}

async fn wait_past(mut rx: watch::Receiver<ConnectivityState>, transitions: u64) {
    let closed = rx
        .wait_for(|state| state.online_transitions > transitions)
        .await
        .is_err();
    if closed {
        // Monitor dropped, nothing can bring us online anymore.
        std::future::pending::<()>().await;
    }
}

/// Reads the process-wide monitor.
pub fn is_online() -> bool {
    ConnectivityMonitor::global().is_online()
}

/// Waits on the process-wide monitor.
pub fn wait_for_online() -> impl Future<Output = ()> + Send + 'static {
    ConnectivityMonitor::global().wait_for_online()
}

// =============================================================================
// HTTP Probe
// =============================================================================

/// Periodically checks that the API host answers at all.
///
/// Any HTTP response counts as reachable, including 4xx and 5xx: the
/// question is whether requests get through, not whether they succeed.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: url::Url,
    interval: Duration,
}

/// Handle for stopping a running probe.
#[derive(Debug, Clone)]
pub struct ProbeHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ProbeHandle {
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Probe already stopped".into()))
    }
}

impl HttpProbe {
    pub fn new(url: url::Url, interval: Duration, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build probe client: {}", e)))?;

        Ok(HttpProbe {
            client,
            url,
            interval,
        })
    }

    pub fn from_settings(api: &ApiSettings, settings: &ConnectivitySettings) -> SyncResult<Self> {
        HttpProbe::new(
            url::Url::parse(&api.base_url)?,
            Duration::from_secs(settings.probe_interval_secs),
            Duration::from_secs(settings.probe_timeout_secs),
        )
    }

    /// Single reachability check.
    pub async fn check(&self) -> bool {
        match self.client.head(self.url.clone()).send().await {
            Ok(response) => {
                debug!(status = %response.status(), "Probe answered");
                true
            }
            Err(e) => {
                debug!(error = %e, "Probe failed");
                false
            }
        }
    }

    /// Runs the probe on its own task, reporting into `monitor`.
    pub fn spawn(self, monitor: ConnectivityMonitor) -> ProbeHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(url = %self.url, interval = ?self.interval, "Connectivity probe started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let reachable = self.check().await;
                        if !reachable && monitor.is_online() {
                            warn!(url = %self.url, "API unreachable");
                        }
                        monitor.report(reachable);
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }

            info!("Connectivity probe stopped");
        });

        ProbeHandle { shutdown_tx }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const SHORT: Duration = Duration::from_millis(50);

    #[test]
    fn test_report_ignores_repeats() {
        let monitor = ConnectivityMonitor::new(Connectivity::Offline);
        let mut rx = monitor.subscribe();

        monitor.report(false);
        assert!(!rx.has_changed().unwrap());

        monitor.report(true);
        monitor.report(true);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().online_transitions, 1);

        monitor.report(false);
        monitor.report(true);
        assert_eq!(rx.borrow_and_update().online_transitions, 2);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_wait_for_online_resolves_immediately_when_online() {
        let monitor = ConnectivityMonitor::new(Connectivity::Online);
        assert!(timeout(SHORT, monitor.wait_for_online()).await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_online_waits_for_transition() {
        let monitor = ConnectivityMonitor::new(Connectivity::Offline);

        let waiter = tokio::spawn(monitor.wait_for_online());
        tokio::time::sleep(SHORT).await;
        assert!(!waiter.is_finished());

        // A repeated offline signal is not a transition
        monitor.report(false);
        tokio::time::sleep(SHORT).await;
        assert!(!waiter.is_finished());

        monitor.report(true);
        assert!(timeout(Duration::from_secs(1), waiter).await.is_ok());
    }

    #[tokio::test]
    async fn test_short_online_blip_is_not_missed() {
        let monitor = ConnectivityMonitor::new(Connectivity::Offline);
        let waiter = monitor.wait_for_online();

        monitor.report(true);
        monitor.report(false);

        assert!(timeout(Duration::from_secs(1), waiter).await.is_ok());
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_wait_for_reconnect_ignores_current_state() {
        let monitor = ConnectivityMonitor::new(Connectivity::Online);

        assert!(timeout(SHORT, monitor.wait_for_reconnect()).await.is_err());

        let waiter = monitor.wait_for_reconnect();
        monitor.report(false);
        monitor.report(true);
        assert!(timeout(Duration::from_secs(1), waiter).await.is_ok());
    }

    #[test]
    fn test_global_defaults_online() {
        assert!(std::ptr::eq(ConnectivityMonitor::global(), ConnectivityMonitor::global()));
        assert!(is_online());
        assert_eq!(Connectivity::from(false), Connectivity::Offline);
        assert_eq!(Connectivity::Offline.to_string(), "offline");
    }

    #[tokio::test]
    async fn test_probe_marks_unreachable_host_offline() {
        let monitor = ConnectivityMonitor::new(Connectivity::Online);
        let mut rx = monitor.subscribe();

        let probe = HttpProbe::new(
            url::Url::parse("http://127.0.0.1:1/").unwrap(),
            SHORT,
            Duration::from_secs(1),
        )
        .unwrap();
        let handle = probe.spawn(monitor.clone());

        let went_offline = timeout(
            Duration::from_secs(5),
            rx.wait_for(|state| !state.connectivity.is_online()),
        )
        .await
        .map(|res| res.is_ok());
        assert!(matches!(went_offline, Ok(true)));

        handle.shutdown().await.unwrap();
    }
}
