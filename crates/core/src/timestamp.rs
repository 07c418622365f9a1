// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock-free optional timestamp, shared between the acquirer and the
//! watchdog
//!
//! A [`TimestampCell`] stores a monotonic instant as microseconds elapsed
//! since a base instant captured at construction. Zero means "unset", so a
//! timestamp landing exactly on the base is nudged forward by one
//! microsecond. Stores use `Release` ordering and loads use `Acquire`: a
//! renewal's store happens-before the watchdog's subsequent read.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const UNSET: u64 = 0;

/// Atomic cell holding an optional monotonic timestamp.
#[derive(Debug)]
pub struct TimestampCell {
    base: Instant,
    micros: AtomicU64,
}

impl TimestampCell {
    /// Create an unset cell. All stored instants must come from the same
    /// clock that produced `base`.
    pub fn new(base: Instant) -> Self {
        Self {
            base,
            micros: AtomicU64::new(UNSET),
        }
    }

    /// Publish `at` as the current value.
    pub fn store(&self, at: Instant) {
        let micros = at.saturating_duration_since(self.base).as_micros() as u64;
        self.micros.store(micros.max(1), Ordering::Release);
    }

    /// Reset the cell to unset.
    pub fn clear(&self) {
        self.micros.store(UNSET, Ordering::Release);
    }

    /// Read the current value, if set.
    pub fn load(&self) -> Option<Instant> {
        match self.micros.load(Ordering::Acquire) {
            UNSET => None,
            micros => Some(self.base + Duration::from_micros(micros)),
        }
    }

    pub fn is_set(&self) -> bool {
        self.micros.load(Ordering::Acquire) != UNSET
    }

    /// Time elapsed between the stored value and `now`. `None` when unset;
    /// zero when `now` is not past the stored value.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.load().map(|at| now.saturating_duration_since(at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};

    #[test]
    fn starts_unset() {
        let cell = TimestampCell::new(Instant::now());
        assert!(!cell.is_set());
        assert_eq!(cell.load(), None);
        assert_eq!(cell.age(Instant::now()), None);
    }

    #[test]
    fn store_then_load_round_trips() {
        let clock = FakeClock::new();
        let cell = TimestampCell::new(clock.now());

        clock.advance(Duration::from_millis(40));
        let at = clock.now();
        cell.store(at);

        assert!(cell.is_set());
        assert_eq!(cell.load(), Some(at));
    }

    #[test]
    fn store_at_base_is_still_set() {
        let clock = FakeClock::new();
        let base = clock.now();
        let cell = TimestampCell::new(base);

        cell.store(base);

        assert!(cell.is_set());
        // Nudged one microsecond off the base to stay distinguishable
        // from unset.
        assert_eq!(cell.load(), Some(base + Duration::from_micros(1)));
    }

    #[test]
    fn clear_resets_to_unset() {
        let clock = FakeClock::new();
        let cell = TimestampCell::new(clock.now());
        clock.advance(Duration::from_secs(1));
        cell.store(clock.now());

        cell.clear();

        assert!(!cell.is_set());
        assert_eq!(cell.load(), None);
    }

    #[test]
    fn age_grows_with_the_clock() {
        let clock = FakeClock::new();
        let cell = TimestampCell::new(clock.now());
        clock.advance(Duration::from_millis(10));
        cell.store(clock.now());

        assert_eq!(cell.age(clock.now()), Some(Duration::ZERO));

        clock.advance(Duration::from_millis(130));
        assert_eq!(cell.age(clock.now()), Some(Duration::from_millis(130)));
    }

    #[test]
    fn age_saturates_for_older_now() {
        let clock = FakeClock::new();
        let cell = TimestampCell::new(clock.now());
        let before = clock.now();
        clock.advance(Duration::from_millis(5));
        cell.store(clock.now());

        assert_eq!(cell.age(before), Some(Duration::ZERO));
    }
}
