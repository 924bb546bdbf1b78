//! Waypoints - loyalty point ledger
//!
//! Converts traveler actions (bookings, social follows, reviews, app
//! downloads, content shares) into point credits, enforces per-action rate
//! limits over calendar-aligned windows, applies tier multipliers, and
//! reports tier promotions.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ RewardLedger::submit_action
//!               │  per-(user, action) lock + one SQLite transaction
//!               ├─▶ eligibility (cooldown, daily/weekly/monthly caps)
//!               ├─▶ tier multiplier against the pre-award balance
//!               ├─▶ append ActionRecord + bump balance
//!               └─▶ TierChangeNotifier (fire-and-forget)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let config = LoyaltyConfig::load(config_path)?;
//! let ledger = RewardLedger::open(&db_path, config)?;
//!
//! match ledger.submit_action("user-81", "booking", 250, &metadata)? {
//!     SubmitOutcome::Committed(receipt) => println!("+{} points", receipt.points_awarded),
//!     SubmitOutcome::Rejected(reason) => println!("{}", reason.user_message()),
//! }
//! ```

pub mod config;
pub mod error;
pub mod ledger;
pub mod notifier;

pub use config::{ActionKind, ActionPolicy, LoyaltyConfig, RewardTier};
pub use error::LedgerError;
pub use ledger::{
    ActionRecord, AwardReceipt, EligibilityReport, RejectionReason, RewardLedger, SubmitOutcome,
    TierInfo,
};
pub use notifier::{LogNotifier, TierChangeEvent, TierChangeNotifier, WebhookNotifier};
