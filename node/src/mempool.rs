//! FIFO pending-transaction queue (SPEC_FULL.md §4.4). Owned by `NodeState`,
//! which is itself guarded by a single `tokio::sync::Mutex` — the mempool
//! does not need its own synchronization.

use std::collections::VecDeque;

use forge_core::Transaction;

#[derive(Debug, Default)]
pub struct Mempool {
    queue: VecDeque<Transaction>,
}

impl Mempool {
    pub fn push(&mut self, tx: Transaction) {
        self.queue.push_back(tx);
    }

    pub fn peek_head(&self) -> Option<&Transaction> {
        self.queue.front()
    }

    pub fn pop_head(&mut self) -> Option<Transaction> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tx(id: &str) -> Transaction {
        Transaction {
            tx_id: id.into(),
            sender: "alice".into(),
            data: json!({}),
            signature: "SIG".into(),
            start_timestamp: "2026-01-01T00:00:00Z".into(),
            end_timestamp: None,
        }
    }

    #[test]
    fn is_fifo() {
        let mut mp = Mempool::default();
        mp.push(tx("T1"));
        mp.push(tx("T2"));
        assert_eq!(mp.peek_head().unwrap().tx_id, "T1");
        assert_eq!(mp.pop_head().unwrap().tx_id, "T1");
        assert_eq!(mp.pop_head().unwrap().tx_id, "T2");
        assert!(mp.is_empty());
    }
}
