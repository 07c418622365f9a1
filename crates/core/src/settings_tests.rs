// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use yare::parameterized;

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[test]
fn default_settings_are_valid() {
    assert_eq!(LockSettings::default().validate(), Ok(()));
}

#[test]
fn builders_set_each_field() {
    let settings = LockSettings::default()
        .with_acquire_interval(millis(10))
        .with_acquire_interval_critical(millis(20))
        .with_lock_ttl(millis(100))
        .with_forced_stop_margin(millis(10))
        .with_prolong_interval(millis(10));

    assert_eq!(settings.acquire_interval, millis(10));
    assert_eq!(settings.acquire_interval_critical, millis(20));
    assert_eq!(settings.lock_ttl, millis(100));
    assert_eq!(settings.forced_stop_margin, millis(10));
    assert_eq!(settings.prolong_interval, millis(10));
}

#[test]
fn loss_deadline_is_ttl_plus_margin() {
    let settings = LockSettings::default()
        .with_lock_ttl(millis(100))
        .with_forced_stop_margin(millis(10));

    assert_eq!(settings.loss_deadline(), millis(110));
}

#[parameterized(
    prolong_equal_to_ttl = { 100, 100 },
    prolong_above_ttl = { 100, 150 },
)]
fn prolong_must_stay_below_ttl(ttl_ms: u64, prolong_ms: u64) {
    let settings = LockSettings::default()
        .with_lock_ttl(millis(ttl_ms))
        .with_prolong_interval(millis(prolong_ms));

    assert_eq!(
        settings.validate(),
        Err(SettingsError::ProlongNotBelowTtl {
            prolong: millis(prolong_ms),
            ttl: millis(ttl_ms),
        })
    );
}

#[test]
fn zero_ttl_is_rejected() {
    let settings = LockSettings::default().with_lock_ttl(Duration::ZERO);
    assert_eq!(settings.validate(), Err(SettingsError::ZeroTtl));
}

#[test]
fn settings_round_trip_through_humantime() {
    let settings = LockSettings::default()
        .with_acquire_interval(millis(10))
        .with_lock_ttl(millis(100));

    let json = serde_json::to_string(&settings).unwrap();
    let back: LockSettings = serde_json::from_str(&json).unwrap();

    assert_eq!(back, settings);
}

proptest! {
    #[test]
    fn any_millis_settings_round_trip(
        acquire in 1..10_000u64,
        critical in 1..10_000u64,
        ttl in 2..10_000u64,
        margin in 0..10_000u64,
        prolong in 1..10_000u64,
    ) {
        let settings = LockSettings {
            acquire_interval: millis(acquire),
            acquire_interval_critical: millis(critical),
            lock_ttl: millis(ttl),
            forced_stop_margin: millis(margin),
            prolong_interval: millis(prolong),
        };

        let json = serde_json::to_string(&settings).unwrap();
        let back: LockSettings = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, settings);
    }

    #[test]
    fn validate_accepts_iff_prolong_below_nonzero_ttl(
        ttl in 0..1_000u64,
        prolong in 0..1_000u64,
    ) {
        let settings = LockSettings::default()
            .with_lock_ttl(millis(ttl))
            .with_prolong_interval(millis(prolong));

        let expect_ok = ttl > 0 && prolong < ttl;
        prop_assert_eq!(settings.validate().is_ok(), expect_ok);
    }
}
