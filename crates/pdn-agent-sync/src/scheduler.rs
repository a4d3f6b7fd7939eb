//! Pass mutual exclusion and interval scheduling.
//!
//! One engine runs at most one pass at a time: concurrent drains of the
//! same queues would double-send messages. Competing callers fail fast
//! with [`SyncError::AlreadyRunning`] rather than wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::SyncEngine;
use crate::error::{Result, SyncError};

/// Single-holder lock guarding pass execution.
pub(crate) struct PassLock {
    running: AtomicBool,
}

impl PassLock {
    pub(crate) fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// Acquire the lock, failing fast when a pass is in flight.
    pub(crate) fn try_acquire(self: &Arc<Self>) -> Result<PassGuard> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(PassGuard {
                lock: Arc::clone(self),
            })
        } else {
            Err(SyncError::AlreadyRunning)
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Releases the lock on drop, so error paths cannot leave it held.
pub(crate) struct PassGuard {
    lock: Arc<PassLock>,
}

impl Drop for PassGuard {
    fn drop(&mut self) {
        self.lock.running.store(false, Ordering::Release);
    }
}

struct ScheduledTask {
    shutdown: watch::Sender<bool>,
    _handle: JoinHandle<()>,
}

/// Runs full passes on a fixed interval.
///
/// A tick that fires while a pass is still in flight is skipped, not
/// queued; the next tick tries again.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    task: Mutex<Option<ScheduledTask>>,
}

impl SyncScheduler {
    /// Create a scheduler over an engine. Nothing runs until
    /// [`start_sync`](Self::start_sync) is called.
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            task: Mutex::new(None),
        }
    }

    /// Start (or restart) the interval loop.
    ///
    /// Calling this while a schedule is armed replaces it with the new
    /// interval; an in-flight pass finishes undisturbed.
    pub fn start_sync(&self, interval: Duration) {
        let (shutdown, mut signal) = watch::channel(false);
        let engine = Arc::clone(&self.engine);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = signal.changed() => break,
                    _ = tokio::time::sleep(interval) => {
                        match engine.sync(None).await {
                            Ok(report) => {
                                tracing::debug!(?report, "scheduled sync pass finished");
                            }
                            Err(SyncError::AlreadyRunning) => {
                                tracing::debug!("pass still in flight, skipping tick");
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "scheduled sync pass failed");
                            }
                        }
                    }
                }
            }
        });

        let mut slot = self.task.lock().unwrap();
        if let Some(previous) = slot.take() {
            let _ = previous.shutdown.send(true);
        }
        *slot = Some(ScheduledTask {
            shutdown,
            _handle: handle,
        });
    }

    /// Whether a schedule is currently armed.
    pub fn is_scheduled(&self) -> bool {
        self.task.lock().unwrap().is_some()
    }

    /// Disarm the schedule once any in-flight pass has finished.
    ///
    /// Polls the pass lock until it clears, then stops the loop. If the
    /// pass outlasts `timeout` the schedule stays armed and
    /// [`SyncError::ShutdownTimeout`] is returned; callers may retry.
    pub async fn stop_sync(&self, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let poll = self.engine.options().stop_poll_interval;

        while self.engine.is_running() {
            if tokio::time::Instant::now() >= deadline {
                return Err(SyncError::ShutdownTimeout { timeout });
            }
            tokio::time::sleep(poll).await;
        }

        if let Some(task) = self.task.lock().unwrap().take() {
            let _ = task.shutdown.send(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_single_holder() {
        let lock = Arc::new(PassLock::new());

        let guard = lock.try_acquire().unwrap();
        assert!(lock.is_locked());
        assert!(matches!(
            lock.try_acquire(),
            Err(SyncError::AlreadyRunning)
        ));

        drop(guard);
        assert!(!lock.is_locked());
        lock.try_acquire().unwrap();
    }

    #[test]
    fn test_guard_releases_on_drop_mid_scope() {
        let lock = Arc::new(PassLock::new());
        {
            let _guard = lock.try_acquire().unwrap();
        }
        assert!(!lock.is_locked());
    }
}
