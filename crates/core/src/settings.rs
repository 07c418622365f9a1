// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timing knobs for a locker run
//!
//! All five durations are serde-capable (humantime notation, e.g. `"15s"`)
//! so embedders can keep them in config files. Settings are validated once
//! at locker construction and re-read on every loop iteration, so updates
//! through `Locker::set_settings` take effect on the next attempt.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid settings combinations, rejected at locker construction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("lock_ttl must be non-zero")]
    ZeroTtl,
    #[error("prolong_interval ({prolong:?}) must be shorter than lock_ttl ({ttl:?})")]
    ProlongNotBelowTtl { prolong: Duration, ttl: Duration },
}

/// Timing configuration for lock acquisition, renewal and loss detection
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSettings {
    /// Delay between acquisition attempts while the lock is held elsewhere
    #[serde(with = "humantime_serde")]
    pub acquire_interval: Duration,
    /// Delay before retrying after a backend failure (not contention)
    #[serde(with = "humantime_serde")]
    pub acquire_interval_critical: Duration,
    /// Duration the backend is asked to grant on each acquire
    #[serde(with = "humantime_serde")]
    pub lock_ttl: Duration,
    /// Grace past the TTL before the watchdog declares the lock lost
    #[serde(with = "humantime_serde")]
    pub forced_stop_margin: Duration,
    /// Delay between successful renewals; must stay below `lock_ttl`
    #[serde(with = "humantime_serde")]
    pub prolong_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            acquire_interval: Duration::from_millis(500),
            acquire_interval_critical: Duration::from_secs(2),
            lock_ttl: Duration::from_secs(15),
            forced_stop_margin: Duration::from_secs(3),
            prolong_interval: Duration::from_secs(5),
        }
    }
}

impl LockSettings {
    pub fn with_acquire_interval(mut self, interval: Duration) -> Self {
        self.acquire_interval = interval;
        self
    }

    pub fn with_acquire_interval_critical(mut self, interval: Duration) -> Self {
        self.acquire_interval_critical = interval;
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_forced_stop_margin(mut self, margin: Duration) -> Self {
        self.forced_stop_margin = margin;
        self
    }

    pub fn with_prolong_interval(mut self, interval: Duration) -> Self {
        self.prolong_interval = interval;
        self
    }

    /// Check the cross-field invariants.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.lock_ttl.is_zero() {
            return Err(SettingsError::ZeroTtl);
        }
        if self.prolong_interval >= self.lock_ttl {
            return Err(SettingsError::ProlongNotBelowTtl {
                prolong: self.prolong_interval,
                ttl: self.lock_ttl,
            });
        }
        Ok(())
    }

    /// Deadline after which an unrefreshed lock counts as lost.
    pub fn loss_deadline(&self) -> Duration {
        self.lock_ttl + self.forced_stop_margin
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
