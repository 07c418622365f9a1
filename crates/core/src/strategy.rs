// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend contract for lock arbitration
//!
//! A [`LockStrategy`] is the only thing the locker knows about the outside
//! world: one call to claim or renew exclusive ownership, one best-effort
//! call to give it back. Real backends live with the embedder (a database
//! row lock, Redis `SET NX`, an etcd lease); this crate ships only the
//! in-memory [`FakeLockStrategy`] used by the engine's test suites and as
//! a reference for implementers.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Why an acquire attempt did not succeed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquireError {
    /// The lock is owned by a different locker id. Expected under
    /// contention; the locker counts it but does not treat it as a
    /// failure.
    #[error("lock is held by another locker")]
    HeldByAnother,
    /// Anything else: network trouble, backend errors, violated backend
    /// invariants. The locker backs off on its critical interval.
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Backend contract for a single named lock.
///
/// `acquire` must be idempotent for the same `locker_id`: a repeated
/// success means the same holder renewed its ownership for another `ttl`.
/// Implementations are called concurrently from the renewal loop and, on
/// cancellation, from the finalizer, and must be safe for that.
#[async_trait]
pub trait LockStrategy: Send + Sync {
    /// Claim or renew exclusive ownership for at least `ttl`, measured
    /// from the moment the call was issued.
    async fn acquire(&self, ttl: Duration, locker_id: &str) -> Result<(), AcquireError>;

    /// Give up ownership if `locker_id` currently holds it. Best-effort;
    /// never fails visibly.
    async fn release(&self, locker_id: &str);
}

/// In-memory strategy with a switchable gate, for tests and local
/// experiments.
///
/// The holder slot models the backend's source of truth: an acquire by a
/// different id fails with [`AcquireError::HeldByAnother`] before the gate
/// is even consulted, matching real backends where contention is
/// distinguishable from outages.
#[derive(Debug, Default)]
pub struct FakeLockStrategy {
    holder: Mutex<Option<String>>,
    allowed: AtomicBool,
    attempts: AtomicU64,
}

impl FakeLockStrategy {
    /// Create a strategy that refuses every acquire until
    /// [`FakeLockStrategy::allow`] opens the gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open or close the acquire gate.
    pub fn allow(&self, allowed: bool) {
        self.allowed.store(allowed, Ordering::SeqCst);
    }

    /// Plant an arbitrary holder, as if another process had taken the
    /// lock behind our back.
    pub fn set_holder(&self, whom: &str) {
        let mut holder = self.holder.lock().unwrap_or_else(|e| e.into_inner());
        *holder = Some(whom.to_string());
    }

    pub fn holder(&self) -> Option<String> {
        self.holder
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_held(&self) -> bool {
        self.holder().is_some()
    }

    /// Total acquire calls observed, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockStrategy for FakeLockStrategy {
    async fn acquire(&self, _ttl: Duration, locker_id: &str) -> Result<(), AcquireError> {
        debug_assert!(!locker_id.is_empty(), "locker id must not be empty");
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let mut holder = self.holder.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(current) = holder.as_deref() {
            if current != locker_id {
                return Err(AcquireError::HeldByAnother);
            }
        }
        if !self.allowed.load(Ordering::SeqCst) {
            return Err(AcquireError::Backend("not allowed".to_string()));
        }
        *holder = Some(locker_id.to_string());
        Ok(())
    }

    async fn release(&self, locker_id: &str) {
        let mut holder = self.holder.lock().unwrap_or_else(|e| e.into_inner());
        if holder.as_deref() == Some(locker_id) {
            *holder = None;
        }
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
