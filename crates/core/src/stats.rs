// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Counters accounting for lock acquisition outcomes
//!
//! All counters are relaxed atomics: they are observability data, never
//! used for control flow. The locker bumps them; embedders read snapshots
//! or dump them through a [`MetricsSink`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Destination for named counter values, provided by the embedder.
///
/// holdfast owns no wire or storage format; a sink may render Prometheus
/// text, push to statsd, or collect into a map in tests.
pub trait MetricsSink {
    fn write_counter(&mut self, name: &str, value: u64);
}

/// Counter bag maintained by a locker for the lifetime of the instance.
#[derive(Debug, Default)]
pub struct LockStatistics {
    lock_attempts: AtomicU64,
    lock_successes: AtomicU64,
    lock_failures: AtomicU64,
    watchdog_triggers: AtomicU64,
    brain_splits: AtomicU64,
}

impl LockStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// An acquire or renewal call was issued.
    pub fn note_attempt(&self) {
        self.lock_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// An acquire or renewal call succeeded.
    pub fn note_success(&self) {
        self.lock_successes.fetch_add(1, Ordering::Relaxed);
    }

    /// The backend failed with something other than contention.
    pub fn note_failure(&self) {
        self.lock_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// The watchdog declared the lock lost and cancelled the payload.
    pub fn note_watchdog_trigger(&self) {
        self.watchdog_triggers.fetch_add(1, Ordering::Relaxed);
    }

    /// The backend reported another holder while we believed we held the
    /// lock.
    pub fn note_brain_split(&self) {
        self.brain_splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn attempts(&self) -> u64 {
        self.lock_attempts.load(Ordering::Relaxed)
    }

    pub fn successes(&self) -> u64 {
        self.lock_successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.lock_failures.load(Ordering::Relaxed)
    }

    pub fn watchdog_triggers(&self) -> u64 {
        self.watchdog_triggers.load(Ordering::Relaxed)
    }

    pub fn brain_splits(&self) -> u64 {
        self.brain_splits.load(Ordering::Relaxed)
    }

    /// Write every counter to `sink` under its stable name.
    pub fn dump(&self, sink: &mut dyn MetricsSink) {
        sink.write_counter("lock_attempts", self.attempts());
        sink.write_counter("lock_successes", self.successes());
        sink.write_counter("lock_failures", self.failures());
        sink.write_counter("watchdog_triggers", self.watchdog_triggers());
        sink.write_counter("brain_splits", self.brain_splits());
    }
}
