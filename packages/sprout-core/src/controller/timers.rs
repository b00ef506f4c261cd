//! # Background Timers
//!
//! One task drives both controller timers from a single `select!` loop:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  timer task                                                      │
//! │                                                                  │
//! │  state change ──► re-plan both deadlines                         │
//! │                                                                  │
//! │  poll deadline   (cloud only, every poll_interval)               │
//! │      └──► check_connectivity()                                   │
//! │                                                                  │
//! │  sync deadline   (cloud ∧ online ∧ needs_sync, after debounce)   │
//! │      └──► sync_data()   if generation unchanged since arming     │
//! │                                                                  │
//! │  shutdown ──► exit                                               │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The auto-sync is re-armed whenever the triggering condition is
//! re-entered with different inputs, and disarmed as soon as it stops
//! holding.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::{StorageModeController, StorageState};
use crate::config::StorageMode;

/// Deadline bookkeeping for the two timers
///
/// Kept free of I/O so the arming rules can be tested on their own.
#[derive(Debug)]
struct Schedule {
    poll_interval: Duration,
    debounce: Duration,
    far_future: Instant,
    poll_deadline: Instant,
    sync_deadline: Instant,
    /// Generation captured when the auto-sync was armed
    armed_generation: Option<u64>,
    /// Inputs that armed the current auto-sync
    armed_for: Option<(StorageMode, bool, bool, u64)>,
}

impl Schedule {
    fn new(poll_interval: Duration, debounce: Duration, now: Instant) -> Self {
        let far_future = now + Duration::from_secs(365 * 24 * 3600);
        Self {
            poll_interval,
            debounce,
            far_future,
            poll_deadline: far_future,
            sync_deadline: far_future,
            armed_generation: None,
            armed_for: None,
        }
    }

    /// Re-plan deadlines after a state change
    fn on_state(&mut self, state: &StorageState, now: Instant) {
        if state.mode == StorageMode::Cloud {
            if self.poll_deadline == self.far_future {
                self.poll_deadline = now + self.poll_interval;
            }
        } else {
            self.poll_deadline = self.far_future;
        }

        if state.wants_auto_sync() {
            let inputs = (state.mode, state.is_online, state.needs_sync, state.generation);
            if self.armed_for != Some(inputs) {
                self.sync_deadline = now + self.debounce;
                self.armed_generation = Some(state.generation);
                self.armed_for = Some(inputs);
            }
        } else {
            self.disarm_sync();
        }
    }

    fn poll_active(&self) -> bool {
        self.poll_deadline != self.far_future
    }

    fn on_poll_fired(&mut self, mode: StorageMode, now: Instant) {
        self.poll_deadline = if mode == StorageMode::Cloud {
            now + self.poll_interval
        } else {
            self.far_future
        };
    }

    fn sync_armed(&self) -> bool {
        self.armed_generation.is_some()
    }

    /// Consume the armed auto-sync
    ///
    /// True when it should run, false when the generation moved on since
    /// arming.
    fn take_due_sync(&mut self, current_generation: u64) -> bool {
        let armed = self.armed_generation.take();
        self.sync_deadline = self.far_future;
        armed == Some(current_generation)
    }

    fn disarm_sync(&mut self) {
        self.sync_deadline = self.far_future;
        self.armed_generation = None;
        self.armed_for = None;
    }
}

/// Handle to the running timer task
///
/// Dropping the handle aborts the task. [`TimerHandle::shutdown`] stops it
/// gracefully and waits for it.
pub struct TimerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub(super) fn start(
        controller: Arc<StorageModeController>,
        poll_interval: Duration,
        debounce: Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(controller, poll_interval, debounce, shutdown_rx));
        Self {
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Stop the timers and wait for an in-flight action to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Timer task ended abnormally");
            }
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run(
    controller: Arc<StorageModeController>,
    poll_interval: Duration,
    debounce: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut state_rx = controller.subscribe();
    let mut schedule = Schedule::new(poll_interval, debounce, Instant::now());
    let initial = state_rx.borrow_and_update().clone();
    schedule.on_state(&initial, Instant::now());

    tracing::debug!("Storage timers started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,

            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = state_rx.borrow_and_update().clone();
                schedule.on_state(&state, Instant::now());
            }

            () = sleep_until(schedule.poll_deadline), if schedule.poll_active() => {
                let online = controller.check_connectivity().await;
                tracing::trace!(online, "Connectivity poll");
                schedule.on_poll_fired(controller.state().mode, Instant::now());
            }

            () = sleep_until(schedule.sync_deadline), if schedule.sync_armed() => {
                if !schedule.take_due_sync(controller.generation()) {
                    tracing::debug!("Auto-sync skipped, generation changed");
                    continue;
                }
                match controller.sync_data().await {
                    Ok(Some(outcome)) => {
                        tracing::debug!(needs_sync = outcome.needs_sync, "Auto-sync finished");
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "Auto-sync failed"),
                }
            }
        }
    }

    tracing::debug!("Storage timers stopped");
}
