//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Anything that can purge its expired entries on demand.
pub trait ExpirationSweep: Send + Sync {
    /// Removes every expired entry and returns how many were removed.
    fn delete_expired(&self) -> usize;
}

// == Cleaner ==
/// Periodically asks a store to purge expired entries.
///
/// A cleaner is either stopped (initial state) or running. It holds only a
/// weak reference to its target, so it never keeps a dropped store alive.
#[derive(Debug)]
pub struct Cleaner {
    interval: Duration,
    /// Stop signal of the running loop, None while stopped
    running: Mutex<Option<watch::Sender<bool>>>,
}

impl Cleaner {
    // == Constructor ==
    /// Creates a stopped cleaner ticking every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true while the cleanup loop is alive.
    ///
    /// The loop also ends on its own once its target is dropped; that is
    /// detected through the stop channel losing its receiver.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .as_ref()
            .is_some_and(|stop_tx| !stop_tx.is_closed())
    }

    // == Start ==
    /// Spawns the cleanup loop on `runtime`.
    ///
    /// Each tick upgrades `target` and calls
    /// [`ExpirationSweep::delete_expired`]. The loop exits when [`stop`] is
    /// called, when the cleaner is dropped, or when the target is gone.
    /// Starting a cleaner that is already running does nothing.
    ///
    /// [`stop`]: Cleaner::stop
    pub fn start(&self, target: Weak<dyn ExpirationSweep>, runtime: &Handle) {
        let mut running = self.running.lock();
        if running.as_ref().is_some_and(|stop_tx| !stop_tx.is_closed()) {
            warn!("TTL cleanup task already running, ignoring start");
            return;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = self.interval;

        runtime.spawn(async move {
            info!(
                "Starting TTL cleanup task with interval of {} ms",
                interval.as_millis()
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(target) = target.upgrade() else {
                            debug!("TTL cleanup: cache dropped, exiting");
                            break;
                        };

                        let removed = target.delete_expired();
                        if removed > 0 {
                            info!("TTL cleanup: removed {} expired entries", removed);
                        } else {
                            debug!("TTL cleanup: no expired entries found");
                        }
                    }
                    // Fires on stop() and when the sender is dropped
                    _ = stop_rx.changed() => break,
                }
            }

            info!("TTL cleanup task stopped");
        });

        *running = Some(stop_tx);
    }

    // == Stop ==
    /// Signals the loop to exit before its next tick.
    ///
    /// A sweep already in progress runs to completion. Stopping a stopped
    /// cleaner is a no-op.
    pub fn stop(&self) {
        if let Some(stop_tx) = self.running.lock().take() {
            // The loop may already be gone if its target was dropped.
            let _ = stop_tx.send(true);
        }
    }
}
