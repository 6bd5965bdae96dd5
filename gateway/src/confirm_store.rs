//! Confirmation dedup store (SPEC_FULL.md §4.5): records each block
//! confirmation a node reports, keyed by `block_hash`, so a second node's
//! confirmation for the same block becomes a no-op insert rather than a
//! duplicate row.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::message::BlockConfirmation;

pub struct ConfirmStore {
    conn: Connection,
}

impl ConfirmStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS confirmed_blocks (
                block_hash  TEXT PRIMARY KEY,
                block_index INTEGER NOT NULL,
                miner_id    TEXT NOT NULL,
                node_id     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS confirmed_blocks (
                block_hash  TEXT PRIMARY KEY,
                block_index INTEGER NOT NULL,
                miner_id    TEXT NOT NULL,
                node_id     TEXT NOT NULL,
                timestamp   TEXT NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Returns `true` if this confirmation was newly recorded, `false` if a
    /// row for this `block_hash` already existed.
    pub fn record(&self, confirmation: &BlockConfirmation) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO confirmed_blocks (block_hash, block_index, miner_id, node_id, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                confirmation.block_hash,
                confirmation.block_index as i64,
                confirmation.miner_id,
                confirmation.node_id,
                confirmation.timestamp,
            ],
        )?;
        Ok(inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(hash: &str) -> BlockConfirmation {
        BlockConfirmation {
            kind: "block_confirmation".into(),
            block_index: 0,
            block_hash: hash.into(),
            miner_id: "node-a".into(),
            node_id: "node-a".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
            transactions: vec![],
        }
    }

    #[test]
    fn second_confirmation_for_same_hash_is_a_no_op() {
        let store = ConfirmStore::open_in_memory().unwrap();
        assert!(store.record(&sample("00abc")).unwrap());
        assert!(!store.record(&sample("00abc")).unwrap());
    }
}
