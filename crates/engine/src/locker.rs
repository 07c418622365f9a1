// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The locker state machine
//!
//! One `Locker` drives one lock through
//! `Idle → Acquiring → Holding → Releasing → (Acquiring | Terminated)`.
//! While Acquiring it polls the strategy on `acquire_interval`; on success
//! it publishes "locked", spawns the payload and the watchdog, and keeps
//! renewing on `prolong_interval`. Renewal failures are only counted:
//! the watchdog is the single authority that declares the lock lost and
//! cancels the payload, which keeps the two loops from racing each other
//! over cancellation. Every exit path releases the backend lock and joins
//! both children.

use crate::helpers::{self, payload_task_name, watchdog_task_name};
use crate::payload::{PayloadError, PayloadFn, PayloadOutcome};
use crate::watchdog::Watchdog;
use holdfast_core::{
    AcquireError, Clock, LockSettings, LockStatistics, LockStrategy, SettingsError, SystemClock,
    TimestampCell,
};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

/// What a run does after the payload reaches a terminal outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockerMode {
    /// Run the payload to one terminal outcome, then return
    Oneshot,
    /// Reacquire the lock and rerun the payload until cancelled
    Worker,
}

/// How a run treats an unsuccessful first acquisition attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitingMode {
    /// Keep contending until cancelled
    Wait,
    /// Terminate the run if the first attempt does not acquire
    NoWait,
}

/// Whether a Oneshot run may restart a payload that did not finish
/// normally
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryMode {
    Retry,
    /// The payload runs at most once, whatever its outcome
    SingleAttempt,
}

/// State shared between the run loop, the watchdog and accessor methods
#[derive(Debug)]
pub(crate) struct SharedState {
    pub(crate) is_locked: AtomicBool,
    pub(crate) lock_acquire_time: TimestampCell,
    pub(crate) lock_refresh_time: TimestampCell,
}

impl SharedState {
    pub(crate) fn new(base: Instant) -> Self {
        Self {
            is_locked: AtomicBool::new(false),
            lock_acquire_time: TimestampCell::new(base),
            lock_refresh_time: TimestampCell::new(base),
        }
    }
}

/// Serializes a payload across a fleet by holding a strategy-arbitrated
/// lock.
///
/// A locker supports one `run` at a time; the façades enforce this. Child
/// tasks never outlive the run that spawned them.
pub struct Locker<C: Clock = SystemClock> {
    name: String,
    id: String,
    strategy: Arc<dyn LockStrategy>,
    payload: PayloadFn,
    retry_mode: RetryMode,
    settings: Arc<Mutex<LockSettings>>,
    shared: Arc<SharedState>,
    stats: Arc<LockStatistics>,
    running: AtomicBool,
    clock: C,
}

/// Why the renewal loop stopped
enum HoldExit {
    Payload(Result<Result<(), PayloadError>, JoinError>),
    Cancelled,
}

impl Locker<SystemClock> {
    /// Create a locker on the system clock. Fails fast on invalid
    /// settings.
    pub fn new(
        name: impl Into<String>,
        strategy: Arc<dyn LockStrategy>,
        settings: LockSettings,
        payload: PayloadFn,
        retry_mode: RetryMode,
    ) -> Result<Self, SettingsError> {
        Self::with_clock(name, strategy, settings, payload, retry_mode, SystemClock)
    }
}

impl<C: Clock> Locker<C> {
    pub fn with_clock(
        name: impl Into<String>,
        strategy: Arc<dyn LockStrategy>,
        settings: LockSettings,
        payload: PayloadFn,
        retry_mode: RetryMode,
        clock: C,
    ) -> Result<Self, SettingsError> {
        settings.validate()?;
        let shared = Arc::new(SharedState::new(clock.now()));
        Ok(Self {
            name: name.into(),
            id: uuid::Uuid::new_v4().to_string(),
            strategy,
            payload,
            retry_mode,
            settings: Arc::new(Mutex::new(settings)),
            shared,
            stats: Arc::new(LockStatistics::new()),
            running: AtomicBool::new(false),
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-instance id passed to the strategy, so same-host lockers stay
    /// distinguishable.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Copy the current settings out.
    pub fn settings(&self) -> LockSettings {
        self.settings
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the settings; the change applies on the next loop
    /// iteration of the acquirer, the renewal loop and the watchdog.
    pub fn set_settings(&self, settings: LockSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        *self.settings.lock().unwrap_or_else(|e| e.into_inner()) = settings;
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.shared.is_locked.load(Ordering::Acquire)
    }

    /// How long the current holding epoch has lasted, if one is active.
    pub fn locked_duration(&self) -> Option<Duration> {
        if !self.is_locked() {
            return None;
        }
        self.shared.lock_acquire_time.age(self.clock.now())
    }

    /// Time since the most recent successful acquire or renewal. Survives
    /// the end of a holding epoch, the way the counters do.
    pub fn last_refresh_age(&self) -> Option<Duration> {
        self.shared.lock_refresh_time.age(self.clock.now())
    }

    pub fn statistics(&self) -> &LockStatistics {
        &self.stats
    }

    /// Drive the state machine until it terminates.
    ///
    /// Blocks (asynchronously) for the whole run. Cancelling `cancel`
    /// stops the acquirer, requests payload cancellation and releases the
    /// lock before returning. The `Err` arm is produced only in Oneshot
    /// mode, where the payload's failure belongs to the joining façade;
    /// Worker mode logs failures and reacquires.
    pub async fn run(
        &self,
        mode: LockerMode,
        waiting: WaitingMode,
        cancel: CancellationToken,
    ) -> Result<(), PayloadError> {
        let was_running = self.running.swap(true, Ordering::SeqCst);
        assert!(!was_running, "locker {} is already running", self.name);

        tracing::debug!(locker = %self.name, id = %self.id, ?mode, ?waiting, "run starting");
        let mut first_attempt = true;

        let result = loop {
            if cancel.is_cancelled() {
                break Ok(());
            }

            let settings = self.settings();
            let backoff = match self.attempt_acquire(settings.lock_ttl).await {
                Ok(()) => {
                    let outcome = self.hold(&cancel).await;
                    match self.next_step(mode, waiting, outcome, &cancel) {
                        ControlFlow::Break(result) => break result,
                        ControlFlow::Continue(()) => {
                            first_attempt = false;
                            continue;
                        }
                    }
                }
                Err(AcquireError::HeldByAnother) => {
                    tracing::debug!(locker = %self.name, "lock is contended");
                    settings.acquire_interval
                }
                Err(AcquireError::Backend(reason)) => {
                    tracing::warn!(locker = %self.name, %reason, "acquire attempt failed");
                    settings.acquire_interval_critical
                }
            };

            if waiting == WaitingMode::NoWait && first_attempt {
                tracing::debug!(locker = %self.name, "first attempt did not acquire, leaving");
                break Ok(());
            }
            first_attempt = false;

            tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                _ = tokio::time::sleep(backoff) => {}
            }
        };

        tracing::debug!(locker = %self.name, id = %self.id, "run finished");
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// One acquire or renewal call with its accounting.
    async fn attempt_acquire(&self, ttl: Duration) -> Result<(), AcquireError> {
        self.stats.note_attempt();
        let result = self.strategy.acquire(ttl, &self.id).await;
        match &result {
            Ok(()) => self.stats.note_success(),
            Err(AcquireError::HeldByAnother) => {
                if self.is_locked() {
                    self.stats.note_brain_split();
                }
            }
            Err(AcquireError::Backend(_)) => self.stats.note_failure(),
        }
        result
    }

    /// One holding epoch: publish "locked", run payload + watchdog, renew
    /// until something ends the epoch, then release and unpublish.
    async fn hold(&self, cancel: &CancellationToken) -> PayloadOutcome {
        let now = self.clock.now();
        self.shared.lock_refresh_time.store(now);
        self.shared.lock_acquire_time.store(now);
        self.shared.is_locked.store(true, Ordering::Release);
        tracing::info!(locker = %self.name, id = %self.id, "lock acquired");

        let epoch = cancel.child_token();
        let payload_token = epoch.child_token();

        let mut payload_task = tokio::spawn((self.payload)(payload_token.clone()));
        tracing::debug!(task = %payload_task_name(&self.name), "payload started");

        let watchdog = Watchdog::new(
            self.name.clone(),
            Arc::clone(&self.shared),
            Arc::clone(&self.settings),
            Arc::clone(&self.stats),
            self.clock.clone(),
            epoch.clone(),
            payload_token,
        );
        let watchdog_task = tokio::spawn(watchdog.run());

        let exit = loop {
            let settings = self.settings();
            tokio::select! {
                joined = &mut payload_task => break HoldExit::Payload(joined),
                _ = cancel.cancelled() => break HoldExit::Cancelled,
                _ = tokio::time::sleep(settings.prolong_interval) => {
                    // Loss is the watchdog's call alone; renewal failures
                    // are only counted here.
                    match self.attempt_acquire(settings.lock_ttl).await {
                        Ok(()) => self.shared.lock_refresh_time.store(self.clock.now()),
                        Err(AcquireError::HeldByAnother) => {
                            tracing::warn!(locker = %self.name, "renewal found another holder");
                        }
                        Err(AcquireError::Backend(reason)) => {
                            tracing::warn!(locker = %self.name, %reason, "renewal failed");
                        }
                    }
                }
            }
        };

        // Releasing: wind the children down, give the lock back, then
        // unpublish.
        epoch.cancel();
        let joined = match exit {
            HoldExit::Payload(joined) => joined,
            HoldExit::Cancelled => payload_task.await,
        };
        let outcome = PayloadOutcome::from_join(joined);
        helpers::join_quietly(watchdog_task, &watchdog_task_name(&self.name)).await;

        self.strategy.release(&self.id).await;
        self.shared.is_locked.store(false, Ordering::Release);
        self.shared.lock_acquire_time.clear();
        tracing::info!(locker = %self.name, id = %self.id, "lock released");

        outcome
    }

    /// Decide, per mode, whether the run restarts the acquirer or
    /// terminates with the epoch's outcome.
    fn next_step(
        &self,
        mode: LockerMode,
        waiting: WaitingMode,
        outcome: PayloadOutcome,
        cancel: &CancellationToken,
    ) -> ControlFlow<Result<(), PayloadError>> {
        if let PayloadOutcome::Failed(error) = &outcome {
            tracing::warn!(locker = %self.name, %error, "payload failed");
        }

        match mode {
            LockerMode::Worker => {
                if cancel.is_cancelled() {
                    ControlFlow::Break(Ok(()))
                } else {
                    ControlFlow::Continue(())
                }
            }
            LockerMode::Oneshot => match self.retry_mode {
                RetryMode::SingleAttempt => ControlFlow::Break(outcome.into_result()),
                RetryMode::Retry if outcome.is_finished() => ControlFlow::Break(Ok(())),
                RetryMode::Retry => {
                    if cancel.is_cancelled() {
                        // Cancellation is a clean shutdown, not an error.
                        ControlFlow::Break(Ok(()))
                    } else if waiting == WaitingMode::NoWait {
                        ControlFlow::Break(outcome.into_result())
                    } else {
                        ControlFlow::Continue(())
                    }
                }
            },
        }
    }
}

#[cfg(test)]
#[path = "locker_tests.rs"]
mod tests;
