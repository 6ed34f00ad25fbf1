//! Background refresh scheduling
//!
//! One task drives two independent timers: a short one that checks whether
//! a newer READY digest exists, and a long one that rebuilds the whole
//! snapshot (dropping lazily filled entries). Failures are logged by the
//! cache and never stop the loop.

use super::{DigestCache, RefreshTrigger};
use crate::config::RefreshConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

pub struct RefreshScheduler {
    cache: Arc<DigestCache>,
    pointer_every: Duration,
    full_every: Duration,
    warm_on_start: bool,
}

/// Control handle for a running scheduler
pub struct RefreshHandle {
    reset: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(cache: Arc<DigestCache>, config: &RefreshConfig) -> Self {
        Self {
            cache,
            pointer_every: config.latest_digest_interval(),
            full_every: config.full_refresh_interval(),
            warm_on_start: config.warm_on_start,
        }
    }

    /// Start the background task
    pub fn spawn(self) -> RefreshHandle {
        let reset = Arc::new(Notify::new());
        let (shutdown, shutdown_rx) = watch::channel(false);

        info!(
            latest_digest_interval_secs = self.pointer_every.as_secs(),
            full_refresh_interval_secs = self.full_every.as_secs(),
            warm_on_start = self.warm_on_start,
            "Refresh scheduler started"
        );

        let task = tokio::spawn(self.run(shutdown_rx, Arc::clone(&reset)));

        RefreshHandle {
            reset,
            shutdown,
            task: Mutex::new(Some(task)),
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>, reset: Arc<Notify>) {
        if self.warm_on_start {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return,
                _ = self.cache.rebuild(RefreshTrigger::Startup) => {}
            }
        }

        let mut pointer = ticker(self.pointer_every);
        let mut full = ticker(self.full_every);

        loop {
            // Dropping a refresh future abandons its in-flight queries
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = reset.notified() => {
                    pointer.reset();
                    full.reset();
                    debug!("Refresh schedule phase reset");
                }
                _ = full.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = self.cache.rebuild(RefreshTrigger::Scheduled) => {}
                    }
                }
                _ = pointer.tick() => {
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break,
                        _ = self.cache.refresh_latest() => {}
                    }
                }
            }
        }

        info!("Refresh scheduler stopped");
    }
}

/// Interval whose first tick is one period from now
fn ticker(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

impl RefreshHandle {
    /// Restart both timers from now, e.g. after an explicit rebuild
    pub fn reset_phase(&self) {
        self.reset.notify_one();
    }

    /// Cancel the task and wait for it to exit
    pub async fn shutdown(&self) {
        if self.shutdown.send(true).is_err() {
            debug!("Refresh scheduler already stopped");
        }

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Refresh scheduler task ended abnormally");
            }
        }
    }
}
