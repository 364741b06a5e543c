//! # Replay Worker
//!
//! Drains the offline action queue against the marketplace API once the
//! device is online.
//!
//! ## Replay Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Replay Worker Flow                                │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  offline_actions (FIFO)                         │   │
//! │  │                                                                 │   │
//! │  │  id | action_type   | endpoint     | retry_count | last_attempt │   │
//! │  │  ───┼───────────────┼──────────────┼─────────────┼───────────── │   │
//! │  │  1  │ send_inquiry  │ /inquiries   │ 8 (max)     │ 10:02        │   │
//! │  │  2  │ save_property │ /saved/p-3   │ 1           │ 10:04        │   │
//! │  │  3  │ save_search   │ /searches    │ 0           │ NULL         │   │
//! │  └────────────────────────────┬────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    drain_once()                                 │   │
//! │  │                                                                 │   │
//! │  │  offline?            → nothing to do                            │   │
//! │  │  #1 exhausted        → skip, report as permanently failed       │   │
//! │  │  #2 backoff pending  → stop, remember next due time             │   │
//! │  │  success             → remove_action                            │   │
//! │  │  failure             → increment_retry, stop the pass           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  A failure stops the pass so a later action never reaches the API       │
//! │  ahead of an earlier one it may depend on.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use haven_core::{OfflineAction, RetryPolicy};
use haven_db::{Database, DbError};

use crate::config::ApiSettings;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};

/// Header carrying the installation id.
pub const CLIENT_ID_HEADER: &str = "X-Haven-Client-Id";

/// Header carrying the queue id, so the API can drop duplicate deliveries.
pub const ACTION_ID_HEADER: &str = "X-Haven-Action-Id";

// =============================================================================
// Replayer
// =============================================================================

/// Sends one queued action to the API.
#[async_trait]
pub trait ActionReplayer: Send + Sync {
    /// `Ok` only once the API confirmed the mutation.
    async fn replay(&self, action: &OfflineAction) -> SyncResult<()>;
}

/// Replays actions over HTTP, payload sent verbatim as JSON.
#[derive(Debug, Clone)]
pub struct HttpReplayer {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
}

impl HttpReplayer {
    pub fn new(api: &ApiSettings, client_id: impl Into<String>) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(api.request_timeout())
            .build()
            .map_err(|e| SyncError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(HttpReplayer {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            client_id: client_id.into(),
        })
    }

    /// Absolute URL for an endpoint relative to the base URL.
    pub fn url_for(&self, endpoint: &str) -> SyncResult<url::Url> {
        let url = if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        };
        Ok(url::Url::parse(&url)?)
    }
}

#[async_trait]
impl ActionReplayer for HttpReplayer {
    async fn replay(&self, action: &OfflineAction) -> SyncResult<()> {
        let url = self.url_for(&action.endpoint)?;
        let method = reqwest::Method::from_bytes(action.action_type.http_method().as_bytes())
            .map_err(|e| SyncError::Internal(format!("Invalid HTTP method: {}", e)))?;

        debug!(id = action.id, %method, %url, "Replaying action");

        let response = self
            .client
            .request(method, url)
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(ACTION_ID_HEADER, action.id.to_string())
            .json(&action.payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(SyncError::ReplayFailed {
            status: status.as_u16(),
            message,
        })
    }
}

// =============================================================================
// Drain Report
// =============================================================================

/// Outcome of one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Actions confirmed and removed.
    pub replayed: u32,
    /// Failed attempts in this pass (0 or 1, a failure ends the pass).
    pub failed: u32,
    /// Actions skipped because they reached the retry ceiling.
    pub exhausted: u32,
    /// When the first action still waiting on backoff becomes due.
    pub next_due: Option<DateTime<Utc>>,
}

// =============================================================================
// Replay Worker
// =============================================================================

/// Handle for controlling a running replay worker.
#[derive(Debug, Clone)]
pub struct ReplayHandle {
    trigger_tx: mpsc::Sender<()>,
    shutdown_tx: mpsc::Sender<()>,
}

impl ReplayHandle {
    /// Asks the worker to drain now, e.g. right after queueing an action.
    pub fn trigger(&self) {
        // A full channel means a drain is already pending.
        let _ = self.trigger_tx.try_send(());
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Replay worker already stopped".into()))
    }
}

/// Background task draining the action queue.
pub struct ReplayWorker {
    db: Database,
    replayer: Arc<dyn ActionReplayer>,
    connectivity: ConnectivityMonitor,
    policy: RetryPolicy,
    poll_interval: Duration,
    trigger_rx: mpsc::Receiver<()>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl ReplayWorker {
    /// Creates a new worker and returns a handle.
    pub fn new(
        db: Database,
        replayer: Arc<dyn ActionReplayer>,
        connectivity: ConnectivityMonitor,
        policy: RetryPolicy,
        poll_interval: Duration,
    ) -> (Self, ReplayHandle) {
        let (trigger_tx, trigger_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let worker = ReplayWorker {
            db,
            replayer,
            connectivity,
            policy,
            poll_interval,
            trigger_rx,
            shutdown_rx,
        };

        (worker, ReplayHandle { trigger_tx, shutdown_tx })
    }

    /// One pass over the queue in FIFO order.
    pub async fn drain_once(&self) -> SyncResult<DrainReport> {
        let mut report = DrainReport::default();

        if !self.connectivity.is_online() {
            debug!("Offline, skipping replay");
            return Ok(report);
        }

        let queue = self.db.actions();
        let pending = queue.get_pending_actions().await?;
        if pending.is_empty() {
            return Ok(report);
        }

        debug!(count = pending.len(), "Draining offline actions");

        for action in pending {
            if self.policy.is_exhausted(&action) {
                report.exhausted += 1;
                continue;
            }

            let now = self.db.clock().now();
            if !self.policy.is_due(&action, now) {
                report.next_due = Some(self.policy.next_attempt_at(&action));
                break;
            }

            match self.replayer.replay(&action).await {
                Ok(()) => {
                    match queue.remove_action(action.id).await {
                        // Removed by someone else in the meantime
                        Ok(()) | Err(DbError::NotFound { .. }) => {}
                        Err(e) => return Err(e.into()),
                    }
                    report.replayed += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    let updated = queue.increment_retry(action.id, &e.to_string()).await?;

                    if self.policy.is_exhausted(&updated) {
                        let exceeded = SyncError::MaxRetriesExceeded {
                            id: updated.id,
                            last_error: e.to_string(),
                        };
                        error!(
                            action_type = %updated.action_type,
                            endpoint = %updated.endpoint,
                            "{}",
                            exceeded
                        );
                        report.exhausted += 1;
                    } else {
                        report.next_due = Some(self.policy.next_attempt_at(&updated));
                    }
                    break;
                }
            }
        }

        if report.replayed > 0 || report.failed > 0 {
            info!(
                replayed = report.replayed,
                failed = report.failed,
                exhausted = report.exhausted,
                "Replay pass finished"
            );
        }

        Ok(report)
    }

    /// Runs the worker loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!("Replay worker starting");
        let mut backoff = self.create_backoff();

        loop {
            tokio::select! {
                _ = self.connectivity.wait_for_online() => {}
                _ = self.shutdown_rx.recv() => break,
            }

            let wait = match self.drain_once().await {
                Ok(report) if report.failed == 0 => {
                    backoff.reset();
                    self.until_due(report.next_due)
                }
                Ok(report) => {
                    let pause = backoff.next_backoff().unwrap_or(self.poll_interval);
                    pause.max(self.until_due(report.next_due))
                }
                Err(e) => {
                    error!(error = %e, "Replay pass failed");
                    backoff.next_backoff().unwrap_or(self.poll_interval)
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.connectivity.wait_for_reconnect() => {
                    debug!("Reconnected, draining now");
                }
                Some(()) = self.trigger_rx.recv() => {}
                _ = self.shutdown_rx.recv() => break,
            }
        }

        info!("Replay worker stopped");
    }

    /// Time until `next_due`, never longer than the poll interval.
    fn until_due(&self, next_due: Option<DateTime<Utc>>) -> Duration {
        match next_due {
            Some(due) => (due - self.db.clock().now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.poll_interval),
            None => self.poll_interval,
        }
    }

    /// Pause between passes that keep failing.
    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.policy.initial_backoff,
            max_interval: self.policy.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use haven_core::{ActionType, ManualClock, NewOfflineAction};
    use haven_db::DbConfig;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::connectivity::Connectivity;

    /// Replays with canned outcomes, succeeding once the script runs out.
    #[derive(Default)]
    struct ScriptedReplayer {
        outcomes: Mutex<VecDeque<SyncResult<()>>>,
        calls: Mutex<Vec<i64>>,
    }

    impl ScriptedReplayer {
        fn failing(times: usize) -> Self {
            let replayer = ScriptedReplayer::default();
            for _ in 0..times {
                replayer.outcomes.lock().unwrap().push_back(Err(SyncError::ReplayFailed {
                    status: 503,
                    message: "maintenance".into(),
                }));
            }
            replayer
        }

        fn calls(&self) -> Vec<i64> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ActionReplayer for ScriptedReplayer {
        async fn replay(&self, action: &OfflineAction) -> SyncResult<()> {
            self.calls.lock().unwrap().push(action.id);
            self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()))
        }
    }

    struct Fixture {
        db: Database,
        clock: ManualClock,
        monitor: ConnectivityMonitor,
    }

    async fn fixture() -> Fixture {
        let clock = ManualClock::new(Utc::now());
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));
        Fixture {
            db,
            clock,
            monitor: ConnectivityMonitor::new(Connectivity::Online),
        }
    }

    fn worker(
        fx: &Fixture,
        replayer: Arc<ScriptedReplayer>,
        policy: RetryPolicy,
    ) -> (ReplayWorker, ReplayHandle) {
        ReplayWorker::new(
            fx.db.clone(),
            replayer,
            fx.monitor.clone(),
            policy,
            Duration::from_secs(30),
        )
    }

    async fn enqueue(db: &Database, n: usize) -> Vec<i64> {
        let mut ids = Vec::new();
        for i in 0..n {
            let action = db
                .actions()
                .add_offline_action(NewOfflineAction::new(
                    ActionType::SendInquiry,
                    "/inquiries",
                    json!({"property_id": format!("p-{}", i), "message": "Still available?"}),
                ))
                .await
                .unwrap();
            ids.push(action.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_drain_replays_in_fifo_order() {
        let fx = fixture().await;
        let ids = enqueue(&fx.db, 3).await;
        let replayer = Arc::new(ScriptedReplayer::default());
        let (worker, _handle) = worker(&fx, replayer.clone(), RetryPolicy::default());

        let report = worker.drain_once().await.unwrap();

        assert_eq!(report.replayed, 3);
        assert_eq!(replayer.calls(), ids);
        assert_eq!(fx.db.actions().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_stops_the_pass() {
        let fx = fixture().await;
        let ids = enqueue(&fx.db, 3).await;
        let replayer = Arc::new(ScriptedReplayer::failing(1));
        let (worker, _handle) = worker(&fx, replayer.clone(), RetryPolicy::default());

        let report = worker.drain_once().await.unwrap();

        assert_eq!(report.replayed, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(replayer.calls(), vec![ids[0]]);

        let head = fx.db.actions().get(ids[0]).await.unwrap();
        assert_eq!(head.retry_count, 1);
        assert!(head.last_error.unwrap().contains("503"));
        assert_eq!(report.next_due, Some(head.last_attempt_at.unwrap() + ChronoDuration::seconds(1)));
        assert_eq!(fx.db.actions().count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_three_failed_replays_keep_the_action() {
        let fx = fixture().await;
        let ids = enqueue(&fx.db, 1).await;
        let replayer = Arc::new(ScriptedReplayer::failing(3));
        let (worker, _handle) = worker(&fx, replayer.clone(), RetryPolicy::immediate(8));

        for _ in 0..3 {
            let report = worker.drain_once().await.unwrap();
            assert_eq!(report.failed, 1);
        }

        let action = fx.db.actions().get(ids[0]).await.unwrap();
        assert_eq!(action.retry_count, 3);
        assert_eq!(fx.db.actions().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_backoff_defers_next_attempt() {
        let fx = fixture().await;
        enqueue(&fx.db, 1).await;
        let replayer = Arc::new(ScriptedReplayer::failing(1));
        let (worker, _handle) = worker(&fx, replayer.clone(), RetryPolicy::default());

        worker.drain_once().await.unwrap();

        // Not due yet: nothing is attempted
        let report = worker.drain_once().await.unwrap();
        assert_eq!(report.failed + report.replayed, 0);
        assert!(report.next_due.is_some());
        assert_eq!(replayer.calls().len(), 1);

        fx.clock.advance(ChronoDuration::seconds(1));
        let report = worker.drain_once().await.unwrap();
        assert_eq!(report.replayed, 1);
        assert_eq!(replayer.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_action_is_skipped() {
        let fx = fixture().await;
        let ids = enqueue(&fx.db, 2).await;
        let replayer = Arc::new(ScriptedReplayer::failing(2));
        let (worker, _handle) = worker(&fx, replayer.clone(), RetryPolicy::immediate(2));

        worker.drain_once().await.unwrap();
        let report = worker.drain_once().await.unwrap();
        assert_eq!(report.exhausted, 1);

        // The exhausted head stays queued, the next action goes through
        let report = worker.drain_once().await.unwrap();
        assert_eq!(report.exhausted, 1);
        assert_eq!(report.replayed, 1);
        assert_eq!(replayer.calls(), vec![ids[0], ids[0], ids[1]]);

        let pending = fx.db.actions().get_pending_actions().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[0]);
        assert_eq!(pending[0].retry_count, 2);
    }

    #[tokio::test]
    async fn test_offline_does_nothing() {
        let fx = fixture().await;
        enqueue(&fx.db, 2).await;
        fx.monitor.report(false);
        let replayer = Arc::new(ScriptedReplayer::default());
        let (worker, _handle) = worker(&fx, replayer.clone(), RetryPolicy::default());

        let report = worker.drain_once().await.unwrap();

        assert_eq!(report, DrainReport::default());
        assert!(replayer.calls().is_empty());
        assert_eq!(fx.db.actions().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_run_replays_after_reconnect() {
        let fx = fixture().await;
        fx.monitor.report(false);
        enqueue(&fx.db, 2).await;
        let replayer = Arc::new(ScriptedReplayer::default());
        let (worker, handle) = worker(&fx, replayer.clone(), RetryPolicy::default());

        let task = tokio::spawn(worker.run());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(replayer.calls().is_empty());

        fx.monitor.report(true);

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while fx.db.actions().count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(drained.is_ok());
        assert_eq!(replayer.calls().len(), 2);

        handle.shutdown().await.unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(5), task).await.is_ok());
    }

    #[tokio::test]
    async fn test_trigger_wakes_idle_worker() {
        let fx = fixture().await;
        let replayer = Arc::new(ScriptedReplayer::default());
        let (worker, handle) = worker(&fx, replayer.clone(), RetryPolicy::default());
        let task = tokio::spawn(worker.run());

        // Worker idles on the 30s poll interval after an empty pass
        tokio::time::sleep(Duration::from_millis(50)).await;
        enqueue(&fx.db, 1).await;
        handle.trigger();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while replayer.calls().is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(drained.is_ok());

        handle.shutdown().await.unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(5), task).await.is_ok());
    }

    #[test]
    fn test_replayer_url_join() {
        let api = ApiSettings {
            base_url: "https://api.example.com/v1/".to_string(),
            request_timeout_secs: 5,
        };
        let replayer = HttpReplayer::new(&api, "client-1").unwrap();

        assert_eq!(
            replayer.url_for("/inquiries").unwrap().as_str(),
            "https://api.example.com/v1/inquiries"
        );
        assert_eq!(
            replayer.url_for("saved/p-3").unwrap().as_str(),
            "https://api.example.com/v1/saved/p-3"
        );
        assert_eq!(
            replayer.url_for("/searches?next=https://x").unwrap().as_str(),
            "https://api.example.com/v1/searches?next=https://x"
        );
    }

    #[tokio::test]
    async fn test_http_replayer_unreachable_is_retryable() {
        let fx = fixture().await;
        let ids = enqueue(&fx.db, 1).await;
        let api = ApiSettings {
            base_url: "http://127.0.0.1:1".to_string(),
            request_timeout_secs: 2,
        };
        let replayer = HttpReplayer::new(&api, "client-1").unwrap();
        let action = fx.db.actions().get(ids[0]).await.unwrap();

        let err = replayer.replay(&action).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
