//! Engine configuration: the tier table and the action policy table
//!
//! Loaded once at process start (TOML file or built-in defaults), validated,
//! and immutable afterwards. Editing the tables at runtime is the business
//! of external tooling that restarts the engine with a new file.

mod policy;
mod tier;

pub use policy::{default_policies, ActionKind, ActionPolicy};
pub use tier::{default_tiers, next_tier_threshold, resolve_tier, RewardTier};

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Error produced by `LoyaltyConfig::validate`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("tier table is empty")]
    NoTiers,

    #[error("first tier '{0}' must start at 0 points, starts at {1}")]
    TierGapAtZero(String, u64),

    #[error("tier '{0}' is not above the previous tier's threshold")]
    TiersNotSorted(String),

    #[error("tier '{0}' has multiplier below x1.0 ({1}%)")]
    MultiplierBelowOne(String, u32),

    #[error("duplicate policy for action '{0}'")]
    DuplicatePolicy(ActionKind),

    #[error("no policy for action '{0}'")]
    MissingPolicy(ActionKind),
}

/// Static configuration for the ledger engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyConfig {
    /// Analytics endpoint for tier-change events. None disables the webhook
    /// notifier (events are still logged). Kept ahead of the tables so the
    /// struct serializes to valid TOML.
    #[serde(default)]
    pub analytics_webhook: Option<String>,

    #[serde(default = "default_tiers")]
    pub tiers: Vec<RewardTier>,

    #[serde(default = "default_policies")]
    pub policies: Vec<ActionPolicy>,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            analytics_webhook: None,
            tiers: default_tiers(),
            policies: default_policies(),
        }
    }
}

impl LoyaltyConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: LoyaltyConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from an optional path, falling back to the built-in tables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }

    /// Check the table invariants: tiers sorted from 0 with multipliers of
    /// at least x1.0, at most one policy per action kind, and a policy for
    /// every known kind.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let first = self.tiers.first().ok_or(ConfigError::NoTiers)?;
        if first.min_points != 0 {
            return Err(ConfigError::TierGapAtZero(
                first.name.clone(),
                first.min_points,
            ));
        }

        for pair in self.tiers.windows(2) {
            if pair[1].min_points <= pair[0].min_points {
                return Err(ConfigError::TiersNotSorted(pair[1].name.clone()));
            }
        }

        for tier in &self.tiers {
            if tier.multiplier_percent < 100 {
                return Err(ConfigError::MultiplierBelowOne(
                    tier.name.clone(),
                    tier.multiplier_percent,
                ));
            }
        }

        for kind in ActionKind::all() {
            match self.policies.iter().filter(|p| p.action == *kind).count() {
                0 => return Err(ConfigError::MissingPolicy(*kind)),
                1 => {}
                _ => return Err(ConfigError::DuplicatePolicy(*kind)),
            }
        }

        Ok(())
    }

    /// Policy for an action kind. Total after `validate()`.
    pub fn policy(&self, action: ActionKind) -> Option<&ActionPolicy> {
        self.policies.iter().find(|p| p.action == action)
    }

    /// Tier for a balance.
    pub fn resolve_tier(&self, points: u64) -> &RewardTier {
        resolve_tier(&self.tiers, points)
    }

    /// Threshold of the next tier above a balance, if any.
    pub fn next_tier_threshold(&self, points: u64) -> Option<u64> {
        next_tier_threshold(&self.tiers, points)
    }
}
