//! Background cache pruning
//!
//! Periodically deletes cache entries older than a retention age. The
//! retention age is at least the freshness window and defaults to a week, so
//! expired entries stay on disk as a stale fallback while upstream is down.
//! The sweep runs on its own tokio task, independent of request handling, and
//! never reports failures to anything but the log.

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheManager, PruneReport};

/// Default retention age for cache entries
pub const DEFAULT_PRUNE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Configuration for the prune sweep
#[derive(Debug, Clone)]
pub struct PruneConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Entries older than this are deleted
    pub max_age: Duration,
    /// Whether the sweep runs at all
    pub enabled: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600), // 1 hour
            max_age: DEFAULT_PRUNE_MAX_AGE,
            enabled: true,
        }
    }
}

/// Handle for controlling the background prune task
pub struct PruneHandle {
    /// Most recent sweep result, `None` until the first sweep finishes
    reports: watch::Receiver<Option<PruneReport>>,
    /// Channel to signal shutdown
    shutdown_tx: mpsc::Sender<()>,
    task: Option<JoinHandle<()>>,
}

impl PruneHandle {
    /// Spawns the prune task
    ///
    /// The first sweep runs immediately, then once per `config.interval`.
    /// With `enabled = false` or a zero interval no task is spawned.
    pub fn spawn(cache: CacheManager, config: PruneConfig) -> Self {
        let (report_tx, report_rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task = if config.enabled && !config.interval.is_zero() {
            info!(
                dir = %cache.dir().display(),
                interval_secs = config.interval.as_secs(),
                max_age_secs = config.max_age.as_secs(),
                "starting cache prune task"
            );
            Some(tokio::spawn(async move {
                let mut interval = tokio::time::interval(config.interval);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            if let Some(report) = sweep(&cache, config.max_age).await {
                                let _ = report_tx.send(Some(report));
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            debug!("cache prune task stopping");
                            break;
                        }
                    }
                }
            }))
        } else {
            None
        };

        Self {
            reports: report_rx,
            shutdown_tx,
            task,
        }
    }

    /// Whether a background task is running
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Result of the most recent completed sweep
    pub fn last_report(&self) -> Option<PruneReport> {
        *self.reports.borrow()
    }

    /// Receiver notified after every completed sweep
    pub fn subscribe(&self) -> watch::Receiver<Option<PruneReport>> {
        self.reports.clone()
    }

    /// Stops the background task and waits for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Runs one sweep off the async executor, logging instead of failing
async fn sweep(cache: &CacheManager, max_age: Duration) -> Option<PruneReport> {
    let cache = cache.clone();
    match tokio::task::spawn_blocking(move || cache.prune(max_age)).await {
        Ok(Ok(report)) => {
            if report.removed > 0 || report.failed > 0 {
                info!(
                    scanned = report.scanned,
                    removed = report.removed,
                    failed = report.failed,
                    "pruned cache"
                );
            }
            Some(report)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "cache prune failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "cache prune task panicked");
            None
        }
    }
}
