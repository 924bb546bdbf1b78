//! Data models for the reward ledger

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An accepted, immutable point award. Never updated or deleted by the
/// engine; external moderation may flip `verified` through its own path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub user_id: String,
    /// Action key ("booking", "review", ...). Kept as the stored string so
    /// historical rows survive policy-table changes.
    pub action: String,
    pub points_awarded: u64,
    pub verified: bool,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// Why a submission was turned away. These are expected, user-facing
/// outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    CooldownActive,
    DailyLimitReached,
    WeeklyLimitReached,
    MonthlyLimitReached,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CooldownActive => "cooldown_active",
            Self::DailyLimitReached => "daily_limit_reached",
            Self::WeeklyLimitReached => "weekly_limit_reached",
            Self::MonthlyLimitReached => "monthly_limit_reached",
        }
    }

    /// Copy suitable for showing to the traveler.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::CooldownActive => "You've done this recently, try again later",
            Self::DailyLimitReached => "Daily limit reached, try again tomorrow",
            Self::WeeklyLimitReached => "Weekly limit reached, try again next week",
            Self::MonthlyLimitReached => "Monthly limit reached, try again next month",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eligibility verdict plus the quota picture for the UI.
///
/// `remaining_*` is `None` for unlimited windows. `next_eligible_at` is set
/// only for cooldown denials; calendar denials clear at the next day/week/
/// month boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityReport {
    pub eligible: bool,
    pub reason: Option<RejectionReason>,
    pub remaining_today: Option<u32>,
    pub remaining_this_week: Option<u32>,
    pub remaining_this_month: Option<u32>,
    pub next_eligible_at: Option<DateTime<Utc>>,
}

/// Result of an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardReceipt {
    pub record_id: String,
    pub points_awarded: u64,
    pub new_balance: u64,
    pub tier_changed: bool,
    /// Set when `tier_changed` is true.
    pub new_tier: Option<String>,
}

/// Outcome of a `submit_action` call that the engine could answer.
/// Rejections are normal control flow; nothing was written for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SubmitOutcome {
    Committed(AwardReceipt),
    Rejected(RejectionReason),
}

impl SubmitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed(_))
    }

    /// The receipt, if the submission committed.
    pub fn receipt(&self) -> Option<&AwardReceipt> {
        match self {
            Self::Committed(receipt) => Some(receipt),
            Self::Rejected(_) => None,
        }
    }
}

/// Read-only tier projection for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierInfo {
    pub tier_name: String,
    pub multiplier: f64,
    pub benefits: Vec<String>,
    pub points: u64,
    /// Points at which the next tier starts; `None` at the top tier.
    pub next_tier_threshold: Option<u64>,
}
