//! Action kinds and their rate-limit policies
//!
//! One policy row per action kind. Policy lookups are total: an action
//! string without a policy entry is rejected as `UnknownAction` before the
//! ledger is touched.

use serde::{Deserialize, Serialize};

/// A point-earning traveler action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A completed (paid) booking. Verification comes from the payment flow.
    Booking,
    /// Following one of the platform's social accounts.
    SocialFollow,
    /// Submitting a review for a booked trip.
    Review,
    /// Installing the mobile app.
    AppDownload,
    /// Sharing platform content.
    ContentShare,
}

impl ActionKind {
    /// String key used in the database and over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Booking => "booking",
            Self::SocialFollow => "social_follow",
            Self::Review => "review",
            Self::AppDownload => "app_download",
            Self::ContentShare => "content_share",
        }
    }

    /// Parse an action key; `None` for unknown kinds.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "booking" => Some(Self::Booking),
            "social_follow" => Some(Self::SocialFollow),
            "review" => Some(Self::Review),
            "app_download" => Some(Self::AppDownload),
            "content_share" => Some(Self::ContentShare),
            _ => None,
        }
    }

    pub fn all() -> &'static [ActionKind] {
        &[
            Self::Booking,
            Self::SocialFollow,
            Self::Review,
            Self::AppDownload,
            Self::ContentShare,
        ]
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate-limit policy for one action kind.
///
/// `0` means "no limit" for every field. The caps count records inside the
/// current calendar day/week/month, not a sliding duration; the cooldown is
/// the only wall-clock rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPolicy {
    pub action: ActionKind,
    #[serde(default)]
    pub cooldown_hours: u32,
    #[serde(default)]
    pub max_per_day: u32,
    #[serde(default)]
    pub max_per_week: u32,
    #[serde(default)]
    pub max_per_month: u32,
    /// Whether records are written pre-verified. Actions that an upstream
    /// system already vouches for (payment, install tracking) skip the
    /// manual verification queue.
    #[serde(default)]
    pub auto_verify: bool,
}

/// The canonical policy table.
pub fn default_policies() -> Vec<ActionPolicy> {
    fn policy(
        action: ActionKind,
        cooldown_hours: u32,
        max_per_day: u32,
        max_per_week: u32,
        max_per_month: u32,
        auto_verify: bool,
    ) -> ActionPolicy {
        ActionPolicy {
            action,
            cooldown_hours,
            max_per_day,
            max_per_week,
            max_per_month,
            auto_verify,
        }
    }

    vec![
        policy(ActionKind::Booking, 0, 0, 0, 0, true),
        policy(ActionKind::SocialFollow, 0, 1, 0, 1, false),
        policy(ActionKind::Review, 24, 1, 3, 10, false),
        policy(ActionKind::AppDownload, 0, 1, 0, 1, true),
        policy(ActionKind::ContentShare, 4, 3, 10, 30, true),
    ]
}
