// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot façade with a joinable outcome

use crate::locker::{Locker, LockerMode, RetryMode, WaitingMode};
use crate::payload::{PayloadError, PayloadFn};
use holdfast_core::{LockSettings, LockStrategy, SettingsError};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Coarse lifecycle of a locked task handle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// The result was already taken through [`LockedTask::get`]
    Invalid,
    /// Constructed but not yet submitted (not observable through this
    /// façade, which spawns on construction; kept for embedders that
    /// mirror task states elsewhere)
    New,
    /// Spawned, not yet scheduled
    Queued,
    Running,
    Completed,
    Cancelled,
}

/// Runs a locker in Oneshot mode on a background task and exposes the
/// payload's outcome.
///
/// With [`RetryMode::SingleAttempt`] the payload executes at most once,
/// whether it finished or failed.
pub struct LockedTask {
    locker: Arc<Locker>,
    cancel: CancellationToken,
    finished: watch::Receiver<bool>,
    state: Arc<Mutex<TaskState>>,
    handle: Mutex<Option<JoinHandle<Result<(), PayloadError>>>>,
}

impl LockedTask {
    /// Construct the locker and start the run immediately.
    pub fn spawn(
        name: impl Into<String>,
        strategy: Arc<dyn LockStrategy>,
        settings: LockSettings,
        payload: PayloadFn,
        waiting: WaitingMode,
        retry: RetryMode,
    ) -> Result<Self, SettingsError> {
        let locker = Arc::new(Locker::new(name, strategy, settings, payload, retry)?);
        let cancel = CancellationToken::new();
        let (finished_tx, finished) = watch::channel(false);
        let state = Arc::new(Mutex::new(TaskState::Queued));

        let handle = tokio::spawn({
            let locker = Arc::clone(&locker);
            let cancel = cancel.clone();
            let state = Arc::clone(&state);
            async move {
                set_state(&state, TaskState::Running);
                let result = locker.run(LockerMode::Oneshot, waiting, cancel.clone()).await;
                let terminal = if cancel.is_cancelled() {
                    TaskState::Cancelled
                } else {
                    TaskState::Completed
                };
                set_state(&state, terminal);
                let _ = finished_tx.send(true);
                result
            }
        });

        Ok(Self {
            locker,
            cancel,
            finished,
            state,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// The wrapped locker, for settings and statistics access.
    pub fn locker(&self) -> &Locker {
        &self.locker
    }

    /// Request cooperative termination of the run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        *self.finished.borrow()
    }

    pub fn state(&self) -> TaskState {
        if self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
        {
            return TaskState::Invalid;
        }
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait up to `window` for the run to finish. Returns whether it did.
    pub async fn wait_for(&self, window: Duration) -> bool {
        let mut finished = self.finished.clone();
        // A closed channel means the run task is gone, which also counts
        // as finished.
        let result = tokio::time::timeout(window, finished.wait_for(|done| *done)).await;
        result.is_ok()
    }

    /// Join the run and take the payload's outcome.
    ///
    /// Returns `Err` iff the payload terminated by failing; cancellation
    /// and never-started runs yield `Ok(())`. The outcome can be taken
    /// once; later calls log and return `Ok(())`.
    pub async fn get(&self) -> Result<(), PayloadError> {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(handle) = handle else {
            tracing::warn!(locker = %self.locker.name(), "task result was already taken");
            return Ok(());
        };
        match handle.await {
            Ok(result) => result,
            Err(join_error) if join_error.is_cancelled() => Ok(()),
            Err(join_error) => Err(PayloadError::Panicked(join_error.to_string())),
        }
    }
}

impl Drop for LockedTask {
    fn drop(&mut self) {
        // A dropped handle should not keep contending for the lock.
        self.cancel.cancel();
    }
}

fn set_state(state: &Mutex<TaskState>, next: TaskState) {
    *state.lock().unwrap_or_else(|e| e.into_inner()) = next;
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
