//! In-memory tx status map (SPEC_FULL.md §3 "Tx status record", §4.6 state
//! machine, invariants I6/I7).
//!
//! Backed by a `DashMap` so distinct `tx_id`s update independently (§5
//! "Shared-resource policy"); within one key, updates are serialized by
//! DashMap's per-shard locking.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TxStatus {
    Queued,
    Submitted,
    Confirmed,
    Failed,
    Timeout,
}

impl TxStatus {
    /// I6: terminal states are sticky; only these may not transition further.
    pub fn is_terminal(self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::Timeout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxStatusRecord {
    pub status: TxStatus,
    pub message: String,
    pub created_at: String,
    pub asset_id: Option<String>,
    pub asset_name: Option<String>,
    pub buyer: String,
    pub seller: Option<String>,
    pub amount: f64,
    /// I7: guarantees a terminal transition's side effects fire exactly once.
    pub notified: bool,
}

impl TxStatusRecord {
    pub fn queued(buyer: String, seller: Option<String>, amount: f64, asset_id: Option<String>, asset_name: Option<String>) -> Self {
        Self {
            status: TxStatus::Queued,
            message: "Purchase queued".to_string(),
            created_at: forge_core::now_iso(),
            asset_id,
            asset_name,
            buyer,
            seller,
            amount,
            notified: false,
        }
    }
}

/// Shared status map, one entry per `tx_id`, living for the process lifetime
/// (SPEC_FULL §3: "lives until process restart").
#[derive(Debug, Default)]
pub struct StatusMap {
    inner: DashMap<String, TxStatusRecord>,
}

impl StatusMap {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn insert(&self, tx_id: String, record: TxStatusRecord) {
        self.inner.insert(tx_id, record);
    }

    pub fn get(&self, tx_id: &str) -> Option<TxStatusRecord> {
        self.inner.get(tx_id).map(|r| r.clone())
    }

    /// Applies `status`/`message` to `tx_id` unless the record is already in a
    /// terminal state (I6 sticky-terminal). Returns `true` if this call is the
    /// one that newly entered a terminal state (the caller uses this to gate
    /// at-most-once notification, I7).
    pub fn transition(&self, tx_id: &str, status: TxStatus, message: impl Into<String>) -> bool {
        let Some(mut entry) = self.inner.get_mut(tx_id) else {
            return false;
        };
        if entry.status.is_terminal() {
            return false;
        }
        entry.status = status;
        entry.message = message.into();
        status.is_terminal()
    }

    /// Marks `tx_id` as notified, returning `false` if it was already
    /// notified (caller must skip side effects in that case) — the core of
    /// I7's at-most-once guarantee.
    pub fn mark_notified(&self, tx_id: &str) -> bool {
        let Some(mut entry) = self.inner.get_mut(tx_id) else {
            return false;
        };
        if entry.notified {
            return false;
        }
        entry.notified = true;
        true
    }

    pub fn scan_unresolved_older_than(&self, cutoff_secs: i64) -> Vec<String> {
        let now = chrono::Utc::now();
        self.inner
            .iter()
            .filter(|entry| {
                matches!(entry.status, TxStatus::Queued | TxStatus::Submitted)
                    && chrono::DateTime::parse_from_rfc3339(&entry.created_at)
                        .map(|created| (now - created.with_timezone(&chrono::Utc)).num_seconds() > cutoff_secs)
                        .unwrap_or(false)
            })
            .map(|entry| entry.key().clone())
            .collect()
    }

    #[allow(dead_code)]
    pub fn status_line(&self, tx_id: &str) -> Option<(TxStatus, String)> {
        self.get(tx_id).map(|r| (r.status, r.message))
    }

    #[allow(dead_code)]
    pub fn as_json(&self, tx_id: &str) -> Option<Value> {
        self.get(tx_id)
            .and_then(|r| serde_json::to_value(r).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_to_terminal_reports_true_once() {
        let map = StatusMap::new();
        map.insert(
            "T1".into(),
            TxStatusRecord::queued("alice".into(), Some("bob".into()), 25.0, None, None),
        );
        assert!(map.transition("T1", TxStatus::Submitted, "sent"));
        assert!(map.transition("T1", TxStatus::Confirmed, "done"));
        assert_eq!(map.get("T1").unwrap().status, TxStatus::Confirmed);
    }

    #[test]
    fn terminal_state_is_sticky() {
        let map = StatusMap::new();
        map.insert(
            "T2".into(),
            TxStatusRecord::queued("alice".into(), None, 10.0, None, None),
        );
        map.transition("T2", TxStatus::Failed, "boom");
        let changed = map.transition("T2", TxStatus::Confirmed, "too late");
        assert!(!changed);
        assert_eq!(map.get("T2").unwrap().status, TxStatus::Failed);
        assert_eq!(map.get("T2").unwrap().message, "boom");
    }

    #[test]
    fn notification_fires_at_most_once() {
        let map = StatusMap::new();
        map.insert(
            "T3".into(),
            TxStatusRecord::queued("alice".into(), None, 10.0, None, None),
        );
        assert!(map.mark_notified("T3"));
        assert!(!map.mark_notified("T3"));
    }

    #[test]
    fn stale_queued_entry_is_flagged_for_timeout() {
        let map = StatusMap::new();
        let mut record = TxStatusRecord::queued("alice".into(), None, 10.0, None, None);
        record.created_at = (chrono::Utc::now() - chrono::Duration::seconds(700)).to_rfc3339();
        map.insert("T4".into(), record);
        let stale = map.scan_unresolved_older_than(600);
        assert_eq!(stale, vec!["T4".to_string()]);
    }
}
