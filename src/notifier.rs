//! Tier-change notification
//!
//! Tier upgrades are interesting to analytics but never to the commit
//! itself: notification is best-effort and must not block or fail the
//! ledger transaction. The webhook notifier hands events to a background
//! thread over a channel and forgets about them.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

/// Event emitted when an award moves a user into a different tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierChangeEvent {
    pub user_id: String,
    pub old_tier: String,
    pub new_tier: String,
    pub balance: u64,
    pub timestamp: DateTime<Utc>,
}

/// Sink for tier-change events. Implementations must not block the caller.
pub trait TierChangeNotifier: Send + Sync {
    fn notify_tier_change(&self, event: TierChangeEvent);
}

/// Default sink: structured log line, nothing else.
pub struct LogNotifier;

impl TierChangeNotifier for LogNotifier {
    fn notify_tier_change(&self, event: TierChangeEvent) {
        info!(
            user_id = %event.user_id,
            from = %event.old_tier,
            to = %event.new_tier,
            balance = event.balance,
            "Tier change"
        );
    }
}

/// POSTs events as JSON to an analytics endpoint from a dedicated thread.
///
/// `notify_tier_change` only enqueues; delivery failures are logged and
/// dropped. The worker exits when the notifier (and its channel) is
/// dropped.
pub struct WebhookNotifier {
    tx: mpsc::Sender<TierChangeEvent>,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let (tx, rx) = mpsc::channel::<TierChangeEvent>();

        thread::Builder::new()
            .name("tier-webhook".to_string())
            .spawn(move || {
                let agent = ureq::AgentBuilder::new()
                    .timeout(Duration::from_secs(10))
                    .build();
                for event in rx {
                    match agent.post(&endpoint).send_json(&event) {
                        Ok(_) => {}
                        Err(err) => {
                            warn!(
                                user_id = %event.user_id,
                                endpoint = %endpoint,
                                error = %err,
                                "Dropped tier-change event"
                            );
                        }
                    }
                }
            })
            .expect("Failed to spawn webhook notifier thread");

        Self { tx }
    }
}

impl TierChangeNotifier for WebhookNotifier {
    fn notify_tier_change(&self, event: TierChangeEvent) {
        // A dead worker means the process is shutting down; losing the
        // event is the contract.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_shape() {
        let event = TierChangeEvent {
            user_id: "ana".to_string(),
            old_tier: "Wanderer".to_string(),
            new_tier: "Explorer".to_string(),
            balance: 1_005,
            timestamp: chrono::DateTime::from_timestamp_millis(1_754_300_000_000)
                .unwrap(),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["user_id"], "ana");
        assert_eq!(json["old_tier"], "Wanderer");
        assert_eq!(json["new_tier"], "Explorer");
        assert_eq!(json["balance"], 1_005);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_webhook_notifier_never_blocks_on_dead_endpoint() {
        // Nothing listens on this port; enqueueing must still return
        // immediately.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/events");
        notifier.notify_tier_change(TierChangeEvent {
            user_id: "ana".to_string(),
            old_tier: "Wanderer".to_string(),
            new_tier: "Explorer".to_string(),
            balance: 1_005,
            timestamp: Utc::now(),
        });
    }
}
