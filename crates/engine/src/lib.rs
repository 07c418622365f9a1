// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! holdfast-engine: the locker state machine and its façades
//!
//! A [`Locker`] holds an externally-arbitrated lock on behalf of exactly
//! one payload task: it acquires through a `LockStrategy`, renews on a
//! cadence, and lets a watchdog cancel the payload when renewals stop
//! landing. Embedders normally reach for one of the two façades:
//! [`LockedWorker`] to keep a payload running for as long as the process
//! can hold the lock, or [`LockedTask`] to run it to a single joinable
//! outcome.

mod helpers;
mod locker;
mod payload;
mod task;
mod watchdog;
mod worker;

pub use locker::{Locker, LockerMode, RetryMode, WaitingMode};
pub use payload::{payload_fn, PayloadError, PayloadFn, PayloadFuture};
pub use task::{LockedTask, TaskState};
pub use worker::{LockedWorker, WorkerError};
