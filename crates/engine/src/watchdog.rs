// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Freshness monitor for a holding epoch
//!
//! The watchdog wakes on the renewal cadence and measures how long ago
//! the last successful acquire landed. Once that age exceeds
//! `lock_ttl + forced_stop_margin` it cancels the payload token and
//! exits. It never touches the backend and never joins the payload;
//! the locker's releasing step does both.

use crate::helpers::watchdog_task_name;
use crate::locker::SharedState;
use holdfast_core::{Clock, LockSettings, LockStatistics};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub(crate) struct Watchdog<C: Clock> {
    locker_name: String,
    shared: Arc<SharedState>,
    settings: Arc<Mutex<LockSettings>>,
    stats: Arc<LockStatistics>,
    clock: C,
    epoch: CancellationToken,
    payload: CancellationToken,
}

impl<C: Clock> Watchdog<C> {
    pub(crate) fn new(
        locker_name: String,
        shared: Arc<SharedState>,
        settings: Arc<Mutex<LockSettings>>,
        stats: Arc<LockStatistics>,
        clock: C,
        epoch: CancellationToken,
        payload: CancellationToken,
    ) -> Self {
        Self {
            locker_name,
            shared,
            settings,
            stats,
            clock,
            epoch,
            payload,
        }
    }

    pub(crate) async fn run(self) {
        let task_name = watchdog_task_name(&self.locker_name);
        tracing::debug!(task = %task_name, "watchdog started");

        loop {
            let (interval, deadline) = {
                let settings = self.settings.lock().unwrap_or_else(|e| e.into_inner());
                (settings.prolong_interval, settings.loss_deadline())
            };

            tokio::select! {
                _ = self.epoch.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            if let Some(age) = self.shared.lock_refresh_time.age(self.clock.now()) {
                if age > deadline {
                    self.stats.note_watchdog_trigger();
                    tracing::warn!(
                        locker = %self.locker_name,
                        age_ms = age.as_millis() as u64,
                        deadline_ms = deadline.as_millis() as u64,
                        "lock went stale, cancelling payload"
                    );
                    self.payload.cancel();
                    break;
                }
            }
        }

        tracing::debug!(task = %task_name, "watchdog stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_core::FakeClock;
    use std::time::Duration;

    fn fast_settings() -> LockSettings {
        LockSettings::default()
            .with_lock_ttl(Duration::from_millis(100))
            .with_forced_stop_margin(Duration::from_millis(10))
            .with_prolong_interval(Duration::from_millis(5))
    }

    struct Fixture {
        shared: Arc<SharedState>,
        stats: Arc<LockStatistics>,
        clock: FakeClock,
        epoch: CancellationToken,
        payload: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = FakeClock::new();
            Self {
                shared: Arc::new(SharedState::new(clock.now())),
                stats: Arc::new(LockStatistics::new()),
                clock,
                epoch: CancellationToken::new(),
                payload: CancellationToken::new(),
            }
        }

        fn spawn(&self) -> tokio::task::JoinHandle<()> {
            let watchdog = Watchdog::new(
                "test".to_string(),
                Arc::clone(&self.shared),
                Arc::new(Mutex::new(fast_settings())),
                Arc::clone(&self.stats),
                self.clock.clone(),
                self.epoch.clone(),
                self.payload.clone(),
            );
            tokio::spawn(watchdog.run())
        }
    }

    #[tokio::test]
    async fn fires_once_the_refresh_goes_stale() {
        let fixture = Fixture::new();
        fixture.shared.lock_refresh_time.store(fixture.clock.now());
        let task = fixture.spawn();

        // Older than ttl + margin on the fake clock; the next tick must
        // notice.
        fixture.clock.advance(Duration::from_millis(200));

        tokio::time::timeout(Duration::from_secs(5), fixture.payload.cancelled())
            .await
            .expect("watchdog should cancel the payload");
        task.await.unwrap();
        assert_eq!(fixture.stats.watchdog_triggers(), 1);
    }

    #[tokio::test]
    async fn leaves_a_fresh_lock_alone() {
        let fixture = Fixture::new();
        fixture.shared.lock_refresh_time.store(fixture.clock.now());
        let task = fixture.spawn();

        // Several ticks pass without the clock moving.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fixture.payload.is_cancelled());
        assert_eq!(fixture.stats.watchdog_triggers(), 0);

        fixture.epoch.cancel();
        task.await.unwrap();
        assert!(!fixture.payload.is_cancelled());
    }

    #[tokio::test]
    async fn exits_on_epoch_cancel_without_firing() {
        let fixture = Fixture::new();
        fixture.shared.lock_refresh_time.store(fixture.clock.now());
        let task = fixture.spawn();

        fixture.epoch.cancel();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("watchdog should stop")
            .unwrap();
        assert_eq!(fixture.stats.watchdog_triggers(), 0);
    }

    #[tokio::test]
    async fn ignores_an_unset_refresh_time() {
        let fixture = Fixture::new();
        let task = fixture.spawn();

        fixture.clock.advance(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!fixture.payload.is_cancelled());

        fixture.epoch.cancel();
        task.await.unwrap();
    }
}
