//! Periodic background cleanup of expired sessions.
//!
//! One spawned task drives the retention sweep on a fixed cadence. The
//! first sweep runs a full interval after start, and because a single
//! task owns the loop, sweeps never overlap: a slow sweep delays the
//! next tick instead of racing it.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::registry::SessionRegistry;

/// Default sweep cadence.
pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Background service that periodically evicts expired sessions.
pub struct CleanupService {
    registry: Arc<SessionRegistry>,
    interval: Duration,
    /// Handle for the running sweep task, if started.
    handle: Mutex<Option<AbortHandle>>,
}

impl CleanupService {
    /// Create a cleanup service with the default 5 minute interval.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self::with_interval(registry, CLEANUP_INTERVAL)
    }

    /// Create a cleanup service with a custom sweep interval.
    pub fn with_interval(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self {
            registry,
            interval,
            handle: Mutex::new(None),
        }
    }

    /// Start the periodic sweep task. Restarting replaces any previous
    /// task. The first sweep fires after one full interval, not at start.
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.take() {
            previous.abort();
        }

        info!(
            interval_secs = self.interval.as_secs(),
            "Session cleanup service starting"
        );

        let service = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + service.interval, service.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match service.registry.cleanup_expired() {
                    Ok(0) => {
                        debug!(
                            active_sessions = service.registry.session_count(),
                            "Session cleanup completed, no expired sessions"
                        );
                    }
                    Ok(removed) => {
                        info!(
                            removed = removed,
                            active_sessions = service.registry.session_count(),
                            "Session cleanup removed expired sessions"
                        );
                    }
                    // A failed sweep never stops future ticks
                    Err(e) => {
                        error!(error = %e, "Session cleanup failed");
                    }
                }
            }
        });

        *slot = Some(task.abort_handle());
    }

    /// Stop the periodic sweep task.
    ///
    /// The abort lands at the task's await point, so a sweep already in
    /// flight runs to completion before the task goes away.
    pub fn stop(&self) {
        let mut slot = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
            info!("Session cleanup service stopped");
        }
    }

    /// Whether the sweep task is currently scheduled.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for CleanupService {
    fn drop(&mut self) {
        self.stop();
    }
}
