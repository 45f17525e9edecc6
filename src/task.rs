//! Coordination between long-running index tasks and index drop.
//!
//! Sampling scans and index teardown race by design: a sampler may be
//! walking millions of entries when `drop_index` is called. The
//! [`TaskCoordinator`] arbitrates that race with two guarantees:
//!
//! - Dropping waits: `await_completion` blocks until every registered
//!   task has finished, so the backing file is never destroyed under a
//!   running scan.
//! - Tasks notice: once draining starts every task sees the cancellation
//!   flag and is expected to abort at its next poll point.
//!
//! The rendezvous itself is channel-based. Each [`TaskControl`] holds a
//! clone of a seed `Sender` that never transmits anything; when the
//! coordinator drops the seed and drains the channel, `recv` returns
//! `Disconnected` exactly when the last task handle is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, instrument, trace};

use crate::error::{Result, StrataError};

struct SeedState {
    /// Cloned out to every new task; `None` once draining has begun.
    seed: Option<Sender<()>>,
    /// Tasks registered but not yet completed.
    outstanding: usize,
}

struct Shared {
    cancelled: AtomicBool,
    state: Mutex<SeedState>,
}

/// Tracks in-flight index tasks and coordinates their shutdown.
///
/// Owned by the accessor and handed (by `Arc`) to every reader so that
/// samplers created from any snapshot register here.
pub struct TaskCoordinator {
    shared: Arc<Shared>,
    receiver: Receiver<()>,
}

impl TaskCoordinator {
    /// Creates a coordinator with no registered tasks.
    pub fn new() -> Self {
        let (seed, receiver) = crossbeam_channel::bounded(0);
        Self {
            shared: Arc::new(Shared {
                cancelled: AtomicBool::new(false),
                state: Mutex::new(SeedState {
                    seed: Some(seed),
                    outstanding: 0,
                }),
            }),
            receiver,
        }
    }

    /// Registers a new task and returns its control handle.
    ///
    /// Fails with [`StrataError::IndexDropped`] once draining has begun.
    /// The check and the registration happen under one lock, so a task
    /// either registers before the drain (and the drain waits for it) or
    /// is refused outright.
    pub fn register(&self) -> Result<TaskControl> {
        let mut state = self
            .shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let seed = state.seed.as_ref().ok_or(StrataError::IndexDropped)?;
        let tick = seed.clone();
        state.outstanding += 1;
        trace!(outstanding = state.outstanding, "Task registered");

        Ok(TaskControl {
            shared: Arc::clone(&self.shared),
            tick: Some(tick),
        })
    }

    /// Returns true once cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Number of registered tasks that have not completed yet.
    pub fn outstanding(&self) -> usize {
        self.shared
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .outstanding
    }

    /// Cancels all tasks, refuses new registrations, and blocks until
    /// every outstanding task has completed.
    ///
    /// Idempotent: later calls return immediately.
    #[instrument(skip(self))]
    pub fn await_completion(&self) {
        {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.shared.cancelled.store(true, Ordering::Release);
            state.seed = None;
            debug!(outstanding = state.outstanding, "Draining tasks");
        }

        // Nothing is ever sent on this channel; recv unblocks with
        // Disconnected once the last TaskControl drops its sender.
        while self.receiver.recv().is_ok() {}
        debug!("All tasks completed");
    }
}

impl Default for TaskCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCoordinator")
            .field("cancelled", &self.is_cancelled())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

/// Handle held by one running task.
///
/// The task polls [`is_cancelled`](Self::is_cancelled) at convenient
/// points and calls [`mark_completed`](Self::mark_completed) when done.
/// Dropping the handle completes the task as well, so a panicking
/// sampler never deadlocks the drain.
pub struct TaskControl {
    shared: Arc<Shared>,
    tick: Option<Sender<()>>,
}

impl TaskControl {
    /// Returns true once the coordinator has requested cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }

    /// Marks this task as completed. Idempotent.
    pub fn mark_completed(&mut self) {
        if let Some(tick) = self.tick.take() {
            let mut state = self
                .shared
                .state
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.outstanding -= 1;
            trace!(outstanding = state.outstanding, "Task completed");
            drop(state);
            drop(tick);
        }
    }
}

impl Drop for TaskControl {
    fn drop(&mut self) {
        self.mark_completed();
    }
}

impl std::fmt::Debug for TaskControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskControl")
            .field("completed", &self.tick.is_none())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_complete() {
        let coordinator = TaskCoordinator::new();
        assert_eq!(coordinator.outstanding(), 0);

        let mut task = coordinator.register().unwrap();
        assert_eq!(coordinator.outstanding(), 1);
        assert!(!task.is_cancelled());

        task.mark_completed();
        task.mark_completed();
        assert_eq!(coordinator.outstanding(), 0);
    }

    #[test]
    fn test_drop_completes_task() {
        let coordinator = TaskCoordinator::new();
        {
            let _task = coordinator.register().unwrap();
            assert_eq!(coordinator.outstanding(), 1);
        }
        assert_eq!(coordinator.outstanding(), 0);
    }

    #[test]
    fn test_await_completion_with_no_tasks_returns_immediately() {
        let coordinator = TaskCoordinator::new();
        coordinator.await_completion();
        assert!(coordinator.is_cancelled());
        // Idempotent
        coordinator.await_completion();
    }

    #[test]
    fn test_register_refused_after_drain() {
        let coordinator = TaskCoordinator::new();
        coordinator.await_completion();

        let err = coordinator.register().unwrap_err();
        assert!(err.is_index_dropped());
    }

    #[test]
    fn test_await_completion_blocks_until_task_finishes() {
        let coordinator = Arc::new(TaskCoordinator::new());
        let task = coordinator.register().unwrap();

        let worker = std::thread::spawn(move || {
            let mut task = task;
            // Spin until cancellation is requested, like a sampler would
            while !task.is_cancelled() {
                std::thread::sleep(Duration::from_millis(1));
            }
            std::thread::sleep(Duration::from_millis(20));
            task.mark_completed();
        });

        coordinator.await_completion();
        // If we got here the worker must have completed
        assert_eq!(coordinator.outstanding(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_cancellation_visible_to_task() {
        let coordinator = TaskCoordinator::new();
        let task = coordinator.register().unwrap();
        assert!(!task.is_cancelled());

        let waiter = {
            let task = task;
            std::thread::spawn(move || {
                let mut task = task;
                while !task.is_cancelled() {
                    std::thread::sleep(Duration::from_millis(1));
                }
                task.mark_completed();
                true
            })
        };

        coordinator.await_completion();
        assert!(waiter.join().unwrap());
    }
}
