//! Error taxonomy for the ledger engine
//!
//! Quota rejections are NOT errors: they come back as a structured
//! `SubmitOutcome::Rejected` so callers can show them to the traveler. This
//! enum covers the cases where the call itself cannot be answered.

use rusqlite::ErrorCode;

/// Maximum serialized metadata size accepted by `submit_action`.
pub const MAX_METADATA_BYTES: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The action kind has no policy entry. Not retryable without a config
    /// fix.
    #[error("unknown action kind '{0}'")]
    UnknownAction(String),

    /// A stored balance came back negative. The balance invariant has
    /// already been broken upstream; surfaced loudly, never recovered
    /// silently.
    #[error("stored balance for user '{user_id}' is invalid: {points}")]
    InvalidBalance { user_id: String, points: i64 },

    /// Serialized metadata exceeds `MAX_METADATA_BYTES`. Caller contract
    /// error, rejected before any storage work.
    #[error("metadata is {size} bytes, limit is {max}")]
    MetadataTooLarge { size: usize, max: usize },

    /// Storage contention or unavailability. The caller retries the whole
    /// `submit_action` call; eligibility is re-evaluated against fresh
    /// history, never resumed mid-way.
    #[error("ledger storage is busy, retry the call")]
    TransientFailure(#[source] rusqlite::Error),

    #[error("ledger storage error")]
    Storage(#[source] rusqlite::Error),

    #[error("failed to encode metadata")]
    Metadata(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                Self::TransientFailure(err)
            }
            _ => Self::Storage(err),
        }
    }
}

impl LedgerError {
    /// Whether retrying the same call can succeed without any code or
    /// config change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_maps_to_transient() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let mapped = LedgerError::from(err);
        assert!(matches!(mapped, LedgerError::TransientFailure(_)));
        assert!(mapped.is_retryable());
    }

    #[test]
    fn test_other_sqlite_errors_are_not_retryable() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        let mapped = LedgerError::from(err);
        assert!(matches!(mapped, LedgerError::Storage(_)));
        assert!(!mapped.is_retryable());
    }
}
