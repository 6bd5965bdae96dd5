//! Block and transaction data structures shared by every component.
//!
//! These are the wire/storage types from SPEC_FULL.md §3. Validation logic that
//! *requires* chain context (the previous tip) lives in [`forge-node`], not
//! here; this module only provides the structural/self-contained checks (I2,
//! I4) that any component can run without talking to a ledger.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::{self, CanonicalPayload};
use crate::pow;
use crate::Result;

/// A purchase request sealed (or pending sealing) into a block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub tx_id: String,
    pub sender: String,
    /// Structured payload: at minimum `from`, `to`, `amount`, `asset_id`,
    /// `asset_name`, `tx_id`. Kept as a loosely-typed [`Value`] because nodes
    /// never interpret it — only the app server's confirmation consumer does.
    pub data: Value,
    /// Opaque signature string; nodes trust the gateway and do not verify it.
    pub signature: String,
    pub start_timestamp: String,
    pub end_timestamp: Option<String>,
}

impl Transaction {
    /// Returns `data.from`/`data.to`/`data.amount`/`data.asset_id` as borrowed
    /// views, used by the confirmation consumer (C6) to apply a wallet
    /// transfer without re-parsing JSON at each call site.
    pub fn from_field(&self) -> Option<&str> {
        self.data.get("from").and_then(Value::as_str)
    }

    pub fn to_field(&self) -> Option<&str> {
        self.data.get("to").and_then(Value::as_str)
    }

    pub fn amount_field(&self) -> Option<f64> {
        self.data.get("amount").and_then(Value::as_f64)
    }

    pub fn asset_id_field(&self) -> Option<&str> {
        self.data.get("asset_id").and_then(Value::as_str)
    }
}

/// A sealed block as defined in SPEC_FULL.md §3.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    pub index: u64,
    pub timestamp: String,
    pub prev_hash: String,
    pub current_hash: String,
    pub nonce: u64,
    pub miner_id: String,
    pub signature: String,
    pub public_key_pem: String,
    pub transactions: Vec<Transaction>,
}

/// The genesis `prev_hash`/tip sentinel: 64 ASCII `'0'` characters (I1).
pub fn genesis_prev_hash() -> String {
    "0".repeat(64)
}

impl Block {
    /// Computes `SHA256(canonical(prev_hash, timestamp, index, tx) || ascii(nonce))`
    /// as a lowercase hex string, where `tx` is this block's sole transaction
    /// (the core protocol mines one transaction per block, SPEC_FULL §4.4).
    pub fn compute_hash(
        prev_hash: &str,
        timestamp: &str,
        index: u64,
        tx: &Transaction,
        nonce: u64,
    ) -> Result<String> {
        let payload = CanonicalPayload {
            prev_hash,
            timestamp,
            index,
            tx,
        };
        let bytes = canonical::canonical_bytes(&payload)?;
        let bytes = canonical::with_nonce(&bytes, nonce);
        let digest = Sha256::digest(&bytes);
        Ok(hex::encode(digest))
    }

    /// I2: does `current_hash` satisfy the PoW prefix target?
    pub fn meets_difficulty(&self, difficulty: u32) -> bool {
        pow::hash_meets_difficulty(&self.current_hash, difficulty)
    }

    /// I4: recomputes the hash from this block's own fields and nonce and
    /// compares it to the claimed `current_hash`. A block can satisfy I2 and
    /// carry a valid-looking signature yet still fail this check if the hash
    /// doesn't actually bind to the claimed header fields.
    pub fn recomputed_hash_matches(&self) -> Result<bool> {
        let Some(tx) = self.transactions.first() else {
            return Ok(false);
        };
        let recomputed =
            Self::compute_hash(&self.prev_hash, &self.timestamp, self.index, tx, self.nonce)?;
        Ok(recomputed == self.current_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tx() -> Transaction {
        Transaction {
            tx_id: "T1".into(),
            sender: "alice".into(),
            data: json!({"from": "alice", "to": "bob", "amount": 25.0, "asset_id": "deer", "asset_name": "Deer", "tx_id": "T1"}),
            signature: "SIG_alice_T1".into(),
            start_timestamp: "2026-01-01T00:00:00Z".into(),
            end_timestamp: None,
        }
    }

    #[test]
    fn genesis_sentinel_is_64_zero_chars() {
        assert_eq!(genesis_prev_hash().len(), 64);
        assert!(genesis_prev_hash().chars().all(|c| c == '0'));
    }

    #[test]
    fn hash_binding_round_trips() {
        let tx = sample_tx();
        let prev = genesis_prev_hash();
        let ts = "2026-01-01T00:00:01Z";
        let hash = Block::compute_hash(&prev, ts, 0, &tx, 7).unwrap();

        let block = Block {
            index: 0,
            timestamp: ts.into(),
            prev_hash: prev,
            current_hash: hash,
            nonce: 7,
            miner_id: "node-a".into(),
            signature: String::new(),
            public_key_pem: String::new(),
            transactions: vec![tx],
        };
        assert!(block.recomputed_hash_matches().unwrap());
    }

    #[test]
    fn tampered_nonce_breaks_hash_binding() {
        let tx = sample_tx();
        let prev = genesis_prev_hash();
        let ts = "2026-01-01T00:00:01Z";
        let hash = Block::compute_hash(&prev, ts, 0, &tx, 7).unwrap();

        let mut block = Block {
            index: 0,
            timestamp: ts.into(),
            prev_hash: prev,
            current_hash: hash,
            nonce: 7,
            miner_id: "node-a".into(),
            signature: String::new(),
            public_key_pem: String::new(),
            transactions: vec![tx],
        };
        block.nonce = 8;
        assert!(!block.recomputed_hash_matches().unwrap());
    }
}
