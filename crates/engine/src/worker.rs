// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Long-running façade: keep the payload running wherever the lock can be
//! held

use crate::helpers::{self, locker_task_name};
use crate::locker::{Locker, LockerMode, RetryMode, WaitingMode};
use crate::payload::PayloadFn;
use holdfast_core::{LockSettings, LockStrategy, SettingsError};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Errors from worker lifecycle operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker is already running")]
    AlreadyRunning,
}

struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Runs a locker in Worker mode on a background task.
///
/// `start` and `stop` may be called repeatedly; starting an already
/// running worker is an error. Dropping a running worker cancels the
/// background run but cannot join it, so call [`LockedWorker::stop`] for
/// a clean shutdown.
pub struct LockedWorker {
    locker: Arc<Locker>,
    active: Mutex<Option<ActiveRun>>,
}

impl LockedWorker {
    pub fn new(
        name: impl Into<String>,
        strategy: Arc<dyn LockStrategy>,
        settings: LockSettings,
        payload: PayloadFn,
    ) -> Result<Self, SettingsError> {
        let locker = Locker::new(name, strategy, settings, payload, RetryMode::Retry)?;
        Ok(Self {
            locker: Arc::new(locker),
            active: Mutex::new(None),
        })
    }

    /// The wrapped locker, for settings and statistics access.
    pub fn locker(&self) -> &Locker {
        &self.locker
    }

    pub fn name(&self) -> &str {
        self.locker.name()
    }

    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }

    /// Launch the background run.
    pub fn start(&self) -> Result<(), WorkerError> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if active.as_ref().is_some_and(|run| !run.task.is_finished()) {
            return Err(WorkerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let locker = Arc::clone(&self.locker);
        let run_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            // Worker mode never surfaces payload errors.
            let _ = locker
                .run(LockerMode::Worker, WaitingMode::Wait, run_cancel)
                .await;
        });

        tracing::info!(task = %locker_task_name(self.locker.name()), "worker started");
        *active = Some(ActiveRun { cancel, task });
        Ok(())
    }

    /// Cancel the background run and wait for it to wind down, releasing
    /// the lock if it was held. A no-op when not running.
    pub async fn stop(&self) {
        let run = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(run) = run {
            run.cancel.cancel();
            helpers::join_quietly(run.task, &locker_task_name(self.locker.name())).await;
            tracing::info!(task = %locker_task_name(self.locker.name()), "worker stopped");
        }
    }
}

impl Drop for LockedWorker {
    fn drop(&mut self) {
        if let Some(run) = self
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            run.cancel.cancel();
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
