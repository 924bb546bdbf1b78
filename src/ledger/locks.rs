//! Per-(user, action) submission locks
//!
//! Two concurrent submissions for the same user and action must not both
//! read the same remaining quota; submissions for unrelated users must not
//! wait on each other. The registry hands out one lock per pair, and the
//! ledger stamps `created_at` only after acquiring it, which also keeps
//! record order consistent with commit order within a pair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::ActionKind;

#[derive(Default)]
pub(crate) struct SubmitLocks {
    inner: Mutex<HashMap<(String, ActionKind), Arc<Mutex<()>>>>,
}

impl SubmitLocks {
    /// Lock for one (user, action) pair, created on first use. The registry
    /// itself is held only long enough to clone the Arc.
    pub fn acquire(&self, user_id: &str, action: ActionKind) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().expect("Submit lock registry poisoned");
        map.entry((user_id.to_string(), action))
            .or_default()
            .clone()
    }
}
