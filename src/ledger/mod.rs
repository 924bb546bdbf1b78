//! The reward ledger: the transactional core of the engine
//!
//! `submit_action` is the sole write path. Each call is one atomic unit:
//! read the balance and the relevant action history, evaluate eligibility,
//! compute the tier-multiplied award, append an immutable record and bump
//! the balance, then report whether the award crossed a tier boundary.
//! Rejected calls write nothing.
//!
//! Concurrency: a submission takes the per-(user, action) lock, then runs
//! the whole unit on its own connection inside a `BEGIN IMMEDIATE` SQLite
//! transaction, so two racing submissions for the same pair can never both
//! see the same remaining quota. Unrelated users and actions never wait on
//! an engine-level lock: each call has its own connection, WAL keeps reads
//! off the writer's back, and concurrent writers only meet inside SQLite's
//! commit. SQLite reporting busy past its timeout surfaces as
//! `TransientFailure`; the caller retries the whole call and eligibility is
//! evaluated afresh.

mod db;
mod eligibility;
mod locks;
mod models;

pub use db::LedgerDb;
pub use models::{
    ActionRecord, AwardReceipt, EligibilityReport, RejectionReason, SubmitOutcome, TierInfo,
};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::{ActionKind, LoyaltyConfig};
use crate::error::{LedgerError, MAX_METADATA_BYTES};
use crate::notifier::{LogNotifier, TierChangeEvent, TierChangeNotifier};

use locks::SubmitLocks;

/// Point ledger for all users. Cheap to share behind an `Arc`.
pub struct RewardLedger {
    db: LedgerDb,
    config: Arc<LoyaltyConfig>,
    locks: SubmitLocks,
    notifier: Arc<dyn TierChangeNotifier>,
}

impl RewardLedger {
    /// Open or create the ledger at `path` with a validated config.
    pub fn open(path: &Path, config: LoyaltyConfig) -> Result<Self> {
        let db = LedgerDb::open(path)?;
        Self::new(db, config)
    }

    fn new(db: LedgerDb, config: LoyaltyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            db,
            config: Arc::new(config),
            locks: SubmitLocks::default(),
            notifier: Arc::new(LogNotifier),
        })
    }

    /// Replace the tier-change notifier (log-only by default).
    pub fn with_notifier(mut self, notifier: Arc<dyn TierChangeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn config(&self) -> &LoyaltyConfig {
        &self.config
    }

    // ========================================
    // WRITE PATH
    // ========================================

    /// Submit a traveler action for point credit.
    ///
    /// Returns `Committed` with the award and new balance, or `Rejected`
    /// with the quota rule that turned it away. Identical submissions are
    /// NOT deduplicated here: a caller that can deliver the same trigger
    /// twice (webhook retries) must carry its own idempotency key in
    /// `metadata` and dedup before calling.
    pub fn submit_action(
        &self,
        user_id: &str,
        action: &str,
        base_points: u32,
        metadata: &BTreeMap<String, String>,
    ) -> Result<SubmitOutcome, LedgerError> {
        let kind = self.resolve_kind(action)?;
        let pair = self.locks.acquire(user_id, kind);
        let _guard = pair.lock().expect("Submit lock poisoned");
        // Stamped under the pair lock: created_at order matches commit
        // order for this (user, action).
        self.submit_locked(Utc::now(), user_id, kind, base_points, metadata)
    }

    /// `submit_action` at an explicit instant. Backfills and tests.
    pub fn submit_action_at(
        &self,
        now: DateTime<Utc>,
        user_id: &str,
        action: &str,
        base_points: u32,
        metadata: &BTreeMap<String, String>,
    ) -> Result<SubmitOutcome, LedgerError> {
        let kind = self.resolve_kind(action)?;
        let pair = self.locks.acquire(user_id, kind);
        let _guard = pair.lock().expect("Submit lock poisoned");
        self.submit_locked(now, user_id, kind, base_points, metadata)
    }

    fn submit_locked(
        &self,
        now: DateTime<Utc>,
        user_id: &str,
        kind: ActionKind,
        base_points: u32,
        metadata: &BTreeMap<String, String>,
    ) -> Result<SubmitOutcome, LedgerError> {
        let policy = self
            .config
            .policy(kind)
            .ok_or_else(|| LedgerError::UnknownAction(kind.as_str().to_string()))?;

        // Caller contract checks before any storage work
        let metadata_json = serde_json::to_string(metadata)?;
        if metadata_json.len() > MAX_METADATA_BYTES {
            return Err(LedgerError::MetadataTooLarge {
                size: metadata_json.len(),
                max: MAX_METADATA_BYTES,
            });
        }

        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let balance = Self::read_balance(&tx, user_id)?;
        let cutoff = eligibility::history_cutoff(policy, now);
        let history = Self::load_history(&tx, user_id, kind, cutoff)?;

        let report = eligibility::evaluate(policy, now, &history);
        if let Some(reason) = report.reason {
            debug!(user_id, action = %kind, %reason, "Submission rejected");
            return Ok(SubmitOutcome::Rejected(reason));
        }

        // Tier is resolved against the balance BEFORE this award: an action
        // that itself crosses a boundary earns at the old rate, and the new
        // rate applies from the next action on.
        let tier_before = self.config.resolve_tier(balance);
        let award = tier_before.award(base_points);
        let tier_before_name = tier_before.name.clone();
        let new_balance = balance + award;

        let record_id = Uuid::new_v4().to_string();
        tx.execute(
            r#"INSERT INTO action_records
               (id, user_id, action, points_awarded, verified, metadata, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
            params![
                record_id,
                user_id,
                kind.as_str(),
                award as i64,
                policy.auto_verify as i32,
                metadata_json,
                now.timestamp_millis(),
            ],
        )?;
        tx.execute(
            r#"INSERT INTO user_balances (user_id, points, updated_at)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(user_id) DO UPDATE SET
                   points = points + ?2, updated_at = ?3"#,
            params![user_id, award as i64, now.timestamp_millis()],
        )?;

        let tier_after = self.config.resolve_tier(new_balance);
        let tier_changed = tier_after.name != tier_before_name;
        let new_tier_name = tier_after.name.clone();
        tx.commit()?;
        drop(conn);

        debug!(user_id, action = %kind, award, new_balance, "Action committed");

        if tier_changed {
            info!(user_id, from = %tier_before_name, to = %new_tier_name, "Tier upgraded");
            // Fire-and-forget: a notifier failure never unwinds the commit
            self.notifier.notify_tier_change(TierChangeEvent {
                user_id: user_id.to_string(),
                old_tier: tier_before_name,
                new_tier: new_tier_name.clone(),
                balance: new_balance,
                timestamp: now,
            });
        }

        Ok(SubmitOutcome::Committed(AwardReceipt {
            record_id,
            points_awarded: award,
            new_balance,
            tier_changed,
            new_tier: tier_changed.then_some(new_tier_name),
        }))
    }

    // ========================================
    // READ PATHS
    // ========================================

    /// Eligibility for one action without consuming any quota. Same rules
    /// as the write path; the UI uses this to pre-disable buttons.
    pub fn eligibility(&self, user_id: &str, action: &str) -> Result<EligibilityReport, LedgerError> {
        self.eligibility_at(Utc::now(), user_id, action)
    }

    /// `eligibility` at an explicit instant.
    pub fn eligibility_at(
        &self,
        now: DateTime<Utc>,
        user_id: &str,
        action: &str,
    ) -> Result<EligibilityReport, LedgerError> {
        let kind = self.resolve_kind(action)?;
        let policy = self
            .config
            .policy(kind)
            .ok_or_else(|| LedgerError::UnknownAction(kind.as_str().to_string()))?;

        let conn = self.db.connect()?;
        let cutoff = eligibility::history_cutoff(policy, now);
        let history = Self::load_history(&conn, user_id, kind, cutoff)?;
        Ok(eligibility::evaluate(policy, now, &history))
    }

    /// Current tier projection for a user. Unknown users sit at 0 points in
    /// the base tier.
    pub fn tier_info(&self, user_id: &str) -> Result<TierInfo, LedgerError> {
        let points = self.balance(user_id)?;
        let tier = self.config.resolve_tier(points);
        Ok(TierInfo {
            tier_name: tier.name.clone(),
            multiplier: tier.multiplier(),
            benefits: tier.benefits.clone(),
            points,
            next_tier_threshold: self.config.next_tier_threshold(points),
        })
    }

    /// Raw point balance (0 for unknown users).
    pub fn balance(&self, user_id: &str) -> Result<u64, LedgerError> {
        let conn = self.db.connect()?;
        Self::read_balance(&conn, user_id)
    }

    /// Most recent records for a user, newest first.
    pub fn history(&self, user_id: &str, limit: u32) -> Result<Vec<ActionRecord>, LedgerError> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, user_id, action, points_awarded, verified, metadata, created_at
               FROM action_records
               WHERE user_id = ?1
               ORDER BY created_at DESC, id
               LIMIT ?2"#,
        )?;
        let records = stmt
            .query_map(params![user_id, limit], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Records still waiting for verification, oldest first. Consumed by
    /// the external moderation tooling; the engine never flips the flag.
    pub fn pending_verification(&self, limit: u32) -> Result<Vec<ActionRecord>, LedgerError> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, user_id, action, points_awarded, verified, metadata, created_at
               FROM action_records
               WHERE verified = 0
               ORDER BY created_at, id
               LIMIT ?1"#,
        )?;
        let records = stmt
            .query_map(params![limit], Self::row_to_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    // ========================================
    // HELPERS
    // ========================================

    fn resolve_kind(&self, action: &str) -> Result<ActionKind, LedgerError> {
        ActionKind::from_str(action).ok_or_else(|| LedgerError::UnknownAction(action.to_string()))
    }

    fn read_balance(conn: &Connection, user_id: &str) -> Result<u64, LedgerError> {
        let points: Option<i64> = conn
            .query_row(
                "SELECT points FROM user_balances WHERE user_id = ?1",
                params![user_id],
                |r| r.get(0),
            )
            .optional()?;
        let points = points.unwrap_or(0);
        if points < 0 {
            error!(user_id, points, "Balance invariant violated, refusing to proceed");
            return Err(LedgerError::InvalidBalance {
                user_id: user_id.to_string(),
                points,
            });
        }
        Ok(points as u64)
    }

    fn load_history(
        conn: &Connection,
        user_id: &str,
        kind: ActionKind,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, LedgerError> {
        let mut stmt = conn.prepare(
            r#"SELECT created_at FROM action_records
               WHERE user_id = ?1 AND action = ?2 AND created_at >= ?3"#,
        )?;
        let times = stmt
            .query_map(
                params![user_id, kind.as_str(), cutoff.timestamp_millis()],
                |r| r.get::<_, i64>(0),
            )?
            .filter_map(|r| r.ok())
            .filter_map(DateTime::from_timestamp_millis)
            .collect();
        Ok(times)
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ActionRecord> {
        let metadata_json: String = row.get(5)?;
        let created_ms: i64 = row.get(6)?;
        Ok(ActionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            action: row.get(2)?,
            points_awarded: row.get::<_, i64>(3)?.max(0) as u64,
            verified: row.get::<_, i32>(4)? != 0,
            metadata: serde_json::from_str(&metadata_json).unwrap_or_default(),
            created_at: DateTime::from_timestamp_millis(created_ms).unwrap_or_else(Utc::now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_ledger() -> (TempDir, RewardLedger) {
        let dir = tempfile::tempdir().unwrap();
        let ledger =
            RewardLedger::open(&dir.path().join("ledger.db"), LoyaltyConfig::default()).unwrap();
        (dir, ledger)
    }

    #[test]
    fn test_submit_awards_and_records() {
        let (_dir, ledger) = test_ledger();
        let outcome = ledger
            .submit_action("ana", "booking", 250, &BTreeMap::new())
            .unwrap();

        let receipt = outcome.receipt().expect("should commit");
        assert_eq!(receipt.points_awarded, 250); // base tier, x1.0
        assert_eq!(receipt.new_balance, 250);
        assert!(!receipt.tier_changed);

        assert_eq!(ledger.balance("ana").unwrap(), 250);
        let history = ledger.history("ana", 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action, "booking");
        assert!(history[0].verified); // bookings auto-verify
    }

    #[test]
    fn test_unknown_action_is_an_error_not_a_rejection() {
        let (_dir, ledger) = test_ledger();
        let err = ledger
            .submit_action("ana", "jaywalking", 10, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAction(_)));
        // Nothing was written
        assert_eq!(ledger.balance("ana").unwrap(), 0);
    }

    #[test]
    fn test_oversized_metadata_rejected_before_storage() {
        let (_dir, ledger) = test_ledger();
        let mut metadata = BTreeMap::new();
        metadata.insert("blob".to_string(), "x".repeat(MAX_METADATA_BYTES));

        let err = ledger
            .submit_action("ana", "booking", 10, &metadata)
            .unwrap_err();
        assert!(matches!(err, LedgerError::MetadataTooLarge { .. }));
        assert!(ledger.history("ana", 10).unwrap().is_empty());
    }

    #[test]
    fn test_rejection_writes_nothing() {
        let (_dir, ledger) = test_ledger();
        // social_follow allows one per day
        let first = ledger
            .submit_action("ben", "social_follow", 50, &BTreeMap::new())
            .unwrap();
        assert!(first.is_committed());

        let second = ledger
            .submit_action("ben", "social_follow", 50, &BTreeMap::new())
            .unwrap();
        assert!(matches!(
            second,
            SubmitOutcome::Rejected(RejectionReason::DailyLimitReached)
        ));

        assert_eq!(ledger.balance("ben").unwrap(), 50);
        assert_eq!(ledger.history("ben", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_eligibility_does_not_consume_quota() {
        let (_dir, ledger) = test_ledger();
        for _ in 0..5 {
            let report = ledger.eligibility("carla", "social_follow").unwrap();
            assert!(report.eligible);
            assert_eq!(report.remaining_today, Some(1));
        }
        // Quota is still there for the real submission
        let outcome = ledger
            .submit_action("carla", "social_follow", 50, &BTreeMap::new())
            .unwrap();
        assert!(outcome.is_committed());
    }

    #[test]
    fn test_pending_verification_lists_unverified_only() {
        let (_dir, ledger) = test_ledger();
        ledger
            .submit_action("dan", "booking", 100, &BTreeMap::new())
            .unwrap(); // auto-verified
        ledger
            .submit_action("dan", "social_follow", 50, &BTreeMap::new())
            .unwrap(); // manual

        let pending = ledger.pending_verification(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].action, "social_follow");
        assert!(!pending[0].verified);
    }

    #[test]
    fn test_tier_info_projection() {
        let (_dir, ledger) = test_ledger();
        let info = ledger.tier_info("eve").unwrap();
        assert_eq!(info.tier_name, "Wanderer");
        assert_eq!(info.points, 0);
        assert_eq!(info.next_tier_threshold, Some(1_000));
        assert!((info.multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metadata_round_trips_through_storage() {
        let (_dir, ledger) = test_ledger();
        let mut metadata = BTreeMap::new();
        metadata.insert("idempotency_key".to_string(), "bk-20260804-001".to_string());
        metadata.insert("package".to_string(), "bali-7d".to_string());

        ledger
            .submit_action("fay", "booking", 100, &metadata)
            .unwrap();

        let history = ledger.history("fay", 1).unwrap();
        assert_eq!(history[0].metadata, metadata);
    }
}
