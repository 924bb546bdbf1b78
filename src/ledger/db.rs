//! SQLite storage for the reward ledger
//!
//! Owns the `ledger.db` file: one append-only table of action records and
//! one balance row per user, plus a `schema_version` marker for future
//! migrations.
//!
//! Every operation opens its own connection. Submissions for unrelated
//! users must never wait on each other at the engine level, so there is no
//! shared connection behind a process-wide mutex: WAL mode lets readers run
//! alongside a writer, and genuine write contention is absorbed by SQLite
//! itself (`busy_timeout`, surfacing as `TransientFailure` past it).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Handle to the ledger database. Cheap to clone; connections are opened
/// per operation via `connect`.
#[derive(Clone)]
pub struct LedgerDb {
    path: PathBuf,
}

impl LedgerDb {
    /// Open or create the ledger database at a specific path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger dir: {}", parent.display()))?;
        }

        let db = Self {
            path: path.to_path_buf(),
        };

        let conn = db
            .connect()
            .with_context(|| format!("Failed to open ledger db: {}", path.display()))?;
        // WAL is a property of the database file; set once at open so every
        // later connection inherits it.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(db)
    }

    /// Open a connection for one operation, with the per-connection
    /// pragmas applied.
    pub(crate) fn connect(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }
}

/// SQL schema for the ledger database.
const SCHEMA_SQL: &str = r#"
-- Append-only action records (one row per accepted submission)
CREATE TABLE IF NOT EXISTS action_records (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    points_awarded INTEGER NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_records_user_action
    ON action_records(user_id, action, created_at);
CREATE INDEX IF NOT EXISTS idx_records_user ON action_records(user_id);
CREATE INDEX IF NOT EXISTS idx_records_verified
    ON action_records(verified, created_at);

-- Running balance per user, updated only together with a record insert
CREATE TABLE IF NOT EXISTS user_balances (
    user_id TEXT PRIMARY KEY,
    points INTEGER NOT NULL DEFAULT 0,
    updated_at INTEGER NOT NULL
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);
INSERT OR IGNORE INTO schema_version VALUES (1);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_open_and_init() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_ledger.db");
        let db = LedgerDb::open(&db_path).unwrap();

        let conn = db.connect().unwrap();
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table'")
            .unwrap();
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"action_records".to_string()));
        assert!(tables.contains(&"user_balances".to_string()));
        assert!(tables.contains(&"schema_version".to_string()));
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test_ledger.db");
        LedgerDb::open(&db_path).unwrap();
        LedgerDb::open(&db_path).unwrap();
    }

    #[test]
    fn test_concurrent_connections_see_each_other() {
        let dir = tempdir().unwrap();
        let db = LedgerDb::open(&dir.path().join("test_ledger.db")).unwrap();

        // Two live connections at once: a write through one is visible to
        // the other without either being closed first.
        let writer = db.connect().unwrap();
        let reader = db.connect().unwrap();

        writer
            .execute(
                "INSERT INTO user_balances (user_id, points, updated_at) VALUES ('ana', 10, 0)",
                [],
            )
            .unwrap();

        let points: i64 = reader
            .query_row(
                "SELECT points FROM user_balances WHERE user_id = 'ana'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(points, 10);
    }
}
