//! Shared test utilities for ledger integration tests

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use waypoints::{ActionKind, LoyaltyConfig, RewardLedger, TierChangeEvent, TierChangeNotifier};

/// Ledger on a fresh on-disk database. The TempDir keeps the file alive
/// for the duration of the test.
pub fn open_ledger(config: LoyaltyConfig) -> (TempDir, RewardLedger) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let ledger = RewardLedger::open(&dir.path().join("ledger.db"), config)
        .expect("Failed to open test ledger");
    (dir, ledger)
}

/// UTC instant from calendar parts.
pub fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    chrono::NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, s)
        .unwrap()
        .and_utc()
}

/// Default config with one action's rate limits replaced.
pub fn config_with_limits(
    kind: ActionKind,
    cooldown_hours: u32,
    max_per_day: u32,
    max_per_week: u32,
    max_per_month: u32,
) -> LoyaltyConfig {
    let mut config = LoyaltyConfig::default();
    let policy = config
        .policies
        .iter_mut()
        .find(|p| p.action == kind)
        .expect("default config covers every action kind");
    policy.cooldown_hours = cooldown_hours;
    policy.max_per_day = max_per_day;
    policy.max_per_week = max_per_week;
    policy.max_per_month = max_per_month;
    config
}

/// Two-tier config with a boundary at 1000 points: x1.0 below, x1.2 above.
pub fn two_tier_config() -> LoyaltyConfig {
    let mut config = LoyaltyConfig::default();
    config.tiers.truncate(2);
    config.tiers[0].multiplier_percent = 100;
    config.tiers[1].min_points = 1_000;
    config.tiers[1].multiplier_percent = 120;
    config
}

/// Notifier that captures events for assertions.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<TierChangeEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<TierChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl TierChangeNotifier for RecordingNotifier {
    fn notify_tier_change(&self, event: TierChangeEvent) {
        self.events.lock().unwrap().push(event);
    }
}
