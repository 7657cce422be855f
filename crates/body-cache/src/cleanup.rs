//! Periodic sweeping of expired parse results.
//!
//! The scheduler runs as a tokio task, so it never keeps the process alive on
//! its own: once the runtime shuts down the task simply stops being polled.
//! Dropping the [`CleanupScheduler`] or calling [`CleanupScheduler::stop`]
//! aborts it explicitly.

use crate::parse_cache::Sweep;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// A background task calling [`Sweep::cleanup`] on a fixed interval.
#[derive(Debug)]
pub struct CleanupScheduler {
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl CleanupScheduler {
    /// Spawns the sweep task on the current tokio runtime.
    ///
    /// The first sweep happens one `interval` after start.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like [`tokio::spawn`], and
    /// when `interval` is zero.
    pub fn start(caches: Vec<Arc<dyn Sweep>>, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweep_all(&caches);
            }
        });

        info!(?interval, "parse cache cleanup started");
        Self { interval, handle: Some(handle) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Aborts the sweep task. Calling it again is a no-op.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            info!("parse cache cleanup stopped");
        }
    }
}

fn sweep_all(caches: &[Arc<dyn Sweep>]) {
    for cache in caches {
        let removed = cache.cleanup();
        if removed > 0 {
            debug!(cache = cache.name(), removed, "swept expired parse results");
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
