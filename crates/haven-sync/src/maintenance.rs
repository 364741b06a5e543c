//! # Maintenance Sweeper
//!
//! Runs the store's expiry sweep on a fixed interval so stale search
//! results do not pile up between app launches.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use haven_db::{Database, SweepReport};

use crate::error::{SyncError, SyncResult};

/// Handle for stopping a running sweeper.
#[derive(Debug, Clone)]
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SweeperHandle {
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Sweeper already stopped".into()))
    }
}

/// Periodic `clear_old_cache` task.
pub struct MaintenanceSweeper {
    db: Database,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

impl MaintenanceSweeper {
    pub fn new(db: Database, interval: Duration) -> (Self, SweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            MaintenanceSweeper {
                db,
                interval,
                shutdown_rx,
            },
            SweeperHandle { shutdown_tx },
        )
    }

    /// One sweep. Failures are logged, the next tick tries again.
    pub async fn sweep(&self) -> Option<SweepReport> {
        match self.db.maintenance().clear_old_cache().await {
            Ok(report) => {
                if report.search_results_removed > 0 {
                    info!(
                        removed = report.search_results_removed,
                        batches = report.batches,
                        "Expired search results removed"
                    );
                } else {
                    debug!("Nothing to sweep");
                }
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Cache sweep failed");
                None
            }
        }
    }

    /// Runs the sweeper loop. The first sweep happens immediately.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep().await;
                }
                _ = self.shutdown_rx.recv() => break,
            }
        }

        info!("Maintenance sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use haven_core::{ManualClock, Property, SearchFilters};
    use haven_db::DbConfig;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_run_sweeps_expired_results() {
        let clock = ManualClock::new(Utc::now());
        let db = Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .with_clock(Arc::new(clock.clone()));

        let results: Vec<Property> = Vec::new();
        db.search_cache()
            .cache_search_results("old query", &SearchFilters::new(), &results)
            .await;
        clock.advance(ChronoDuration::hours(25));

        let (sweeper, handle) = MaintenanceSweeper::new(db.clone(), Duration::from_secs(3600));
        let task = tokio::spawn(sweeper.run());

        let swept = tokio::time::timeout(Duration::from_secs(5), async {
            while db.maintenance().get_storage_stats().await.unwrap().search_results > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(swept.is_ok());

        handle.shutdown().await.unwrap();
        assert!(tokio::time::timeout(Duration::from_secs(5), task).await.is_ok());
    }
}
