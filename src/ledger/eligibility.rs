//! Eligibility evaluation over calendar-aligned windows
//!
//! Pure functions: the ledger supplies a point-in-time snapshot of the
//! user's history for one action kind, and this module decides admit/deny
//! plus the remaining quota per window.
//!
//! Windows are calendar-aligned in UTC, not sliding durations: the daily
//! cap resets at midnight, the weekly cap on Sunday, the monthly cap on the
//! 1st. A user capped at 23:59:59 is eligible again two seconds later.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};

use super::models::{EligibilityReport, RejectionReason};
use crate::config::ActionPolicy;

/// Midnight (UTC) of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Midnight (UTC) of the Sunday starting the week containing `now`.
pub fn start_of_week(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_into_week = i64::from(now.weekday().num_days_from_sunday());
    start_of_day(now) - Duration::days(days_into_week)
}

/// Midnight (UTC) of the first day of the month containing `now`.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    let first = now.date_naive().with_day(1).unwrap_or_else(|| now.date_naive());
    first.and_time(NaiveTime::MIN).and_utc()
}

/// Earliest record timestamp that can still affect a verdict at `now`.
///
/// The week can start before the month (a month rarely begins on Sunday),
/// and a long cooldown can reach past both, so the cutoff is the minimum of
/// all three. History older than this is irrelevant to every rule.
pub fn history_cutoff(policy: &ActionPolicy, now: DateTime<Utc>) -> DateTime<Utc> {
    let mut cutoff = start_of_week(now).min(start_of_month(now));
    if policy.cooldown_hours > 0 {
        cutoff = cutoff.min(now - Duration::hours(i64::from(policy.cooldown_hours)));
    }
    cutoff
}

/// Evaluate the policy rules in order: cooldown, then the daily, weekly and
/// monthly caps. `history` holds the `created_at` instants of the user's
/// committed records for this action kind (at least everything since
/// `history_cutoff`).
pub fn evaluate(
    policy: &ActionPolicy,
    now: DateTime<Utc>,
    history: &[DateTime<Utc>],
) -> EligibilityReport {
    let day_count = count_since(history, start_of_day(now));
    let week_count = count_since(history, start_of_week(now));
    let month_count = count_since(history, start_of_month(now));

    let mut report = EligibilityReport {
        eligible: true,
        reason: None,
        remaining_today: remaining(policy.max_per_day, day_count),
        remaining_this_week: remaining(policy.max_per_week, week_count),
        remaining_this_month: remaining(policy.max_per_month, month_count),
        next_eligible_at: None,
    };

    if policy.cooldown_hours > 0 {
        if let Some(last) = history.iter().max() {
            let ready_at = *last + Duration::hours(i64::from(policy.cooldown_hours));
            if now < ready_at {
                report.eligible = false;
                report.reason = Some(RejectionReason::CooldownActive);
                report.next_eligible_at = Some(ready_at);
                return report;
            }
        }
    }

    if exhausted(policy.max_per_day, day_count) {
        report.eligible = false;
        report.reason = Some(RejectionReason::DailyLimitReached);
        return report;
    }

    if exhausted(policy.max_per_week, week_count) {
        report.eligible = false;
        report.reason = Some(RejectionReason::WeeklyLimitReached);
        return report;
    }

    if exhausted(policy.max_per_month, month_count) {
        report.eligible = false;
        report.reason = Some(RejectionReason::MonthlyLimitReached);
        return report;
    }

    report
}

fn count_since(history: &[DateTime<Utc>], start: DateTime<Utc>) -> u32 {
    history.iter().filter(|t| **t >= start).count() as u32
}

fn exhausted(limit: u32, count: u32) -> bool {
    limit > 0 && count >= limit
}

/// Remaining quota for a window; `None` when the window is unlimited.
fn remaining(limit: u32, count: u32) -> Option<u32> {
    (limit > 0).then(|| limit.saturating_sub(count))
}
