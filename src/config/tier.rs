//! Reward tiers and point calculation
//!
//! Tiers are a sorted table of point thresholds. A traveler's tier is a pure
//! function of their current balance; nothing is stored per user.

use serde::{Deserialize, Serialize};

/// A named band of point balances with an earning multiplier.
///
/// A tier covers `[min_points, next tier's min_points)`; the last tier is
/// open-ended. Storing only the lower bound means a sorted table always
/// partitions `[0, ∞)` with no gaps or overlaps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardTier {
    pub name: String,
    pub min_points: u64,
    /// Earning multiplier as an integer percent (100 = x1.0, 120 = x1.2).
    /// Integer math keeps `floor(base * multiplier)` exact: 10 points at
    /// x1.2 must award 12, not the 11 that f64 rounding can produce.
    pub multiplier_percent: u32,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl RewardTier {
    /// Multiplier-adjusted award for `base_points`, floored.
    pub fn award(&self, base_points: u32) -> u64 {
        u64::from(base_points) * u64::from(self.multiplier_percent) / 100
    }

    /// Multiplier as a display value (1.0, 1.2, ...).
    pub fn multiplier(&self) -> f64 {
        f64::from(self.multiplier_percent) / 100.0
    }
}

/// The canonical tier table.
///
/// The table can be overridden from the TOML config file; these are the
/// values that ship. Must stay sorted by `min_points` with the first entry
/// at 0 (`LoyaltyConfig::validate` enforces this).
pub fn default_tiers() -> Vec<RewardTier> {
    fn tier(name: &str, min_points: u64, multiplier_percent: u32, benefits: &[&str]) -> RewardTier {
        RewardTier {
            name: name.to_string(),
            min_points,
            multiplier_percent,
            benefits: benefits.iter().map(|b| b.to_string()).collect(),
        }
    }

    vec![
        tier("Wanderer", 0, 100, &["Member-only deals"]),
        tier(
            "Explorer",
            1_000,
            120,
            &["Member-only deals", "Priority support"],
        ),
        tier(
            "Voyager",
            5_000,
            135,
            &["Member-only deals", "Priority support", "Free seat selection"],
        ),
        tier(
            "Globetrotter",
            15_000,
            150,
            &[
                "Member-only deals",
                "Priority support",
                "Free seat selection",
                "Lounge access",
            ],
        ),
    ]
}

/// Find the tier for a balance: the highest entry whose threshold is met.
///
/// Total over any non-negative balance as long as the table is validated
/// (non-empty, first threshold 0).
pub fn resolve_tier(tiers: &[RewardTier], points: u64) -> &RewardTier {
    tiers
        .iter()
        .rev()
        .find(|t| points >= t.min_points)
        .unwrap_or(&tiers[0])
}

/// Threshold of the tier above the given balance, if any.
pub fn next_tier_threshold(tiers: &[RewardTier], points: u64) -> Option<u64> {
    tiers.iter().find(|t| t.min_points > points).map(|t| t.min_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tier_boundaries() {
        let tiers = default_tiers();
        assert_eq!(resolve_tier(&tiers, 0).name, "Wanderer");
        assert_eq!(resolve_tier(&tiers, 999).name, "Wanderer");
        assert_eq!(resolve_tier(&tiers, 1_000).name, "Explorer");
        assert_eq!(resolve_tier(&tiers, 4_999).name, "Explorer");
        assert_eq!(resolve_tier(&tiers, 5_000).name, "Voyager");
        assert_eq!(resolve_tier(&tiers, 15_000).name, "Globetrotter");
        assert_eq!(resolve_tier(&tiers, 10_000_000).name, "Globetrotter");
    }

    #[test]
    fn test_resolve_tier_is_monotonic() {
        let tiers = default_tiers();
        let mut last_min = 0;
        for points in [0u64, 1, 999, 1_000, 1_001, 4_999, 5_000, 14_999, 15_000, 99_999] {
            let tier = resolve_tier(&tiers, points);
            assert!(tier.min_points >= last_min, "tier went backwards at {points}");
            last_min = tier.min_points;
        }
    }

    #[test]
    fn test_award_uses_integer_math() {
        let explorer = RewardTier {
            name: "Explorer".to_string(),
            min_points: 1_000,
            multiplier_percent: 120,
            benefits: vec![],
        };
        // 10 * 1.2 through f64 floors to 11; the percent math must give 12.
        assert_eq!(explorer.award(10), 12);
        assert_eq!(explorer.award(0), 0);
        assert_eq!(explorer.award(33), 39); // floor(33 * 1.2) = floor(39.6)
    }

    #[test]
    fn test_next_tier_threshold() {
        let tiers = default_tiers();
        assert_eq!(next_tier_threshold(&tiers, 0), Some(1_000));
        assert_eq!(next_tier_threshold(&tiers, 999), Some(1_000));
        assert_eq!(next_tier_threshold(&tiers, 1_000), Some(5_000));
        assert_eq!(next_tier_threshold(&tiers, 20_000), None);
    }
}
