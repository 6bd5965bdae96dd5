//! Inbound block validation pipeline (SPEC_FULL.md §4.4, I1-I4).
//!
//! Checks run in the mandated order and stop at the first failure so the
//! caller can log exactly which invariant was violated.

use forge_core::Block;
use forge_keys::KeyManager;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("required block field missing or empty")]
    MissingFields,
    #[error("current_hash does not meet the difficulty target (I2)")]
    Difficulty,
    #[error("signature does not verify against public_key_pem (I3)")]
    Signature,
    #[error("index/prev_hash do not extend the local chain tip (I1)")]
    ChainLink,
    #[error("recomputed hash does not match current_hash (I4)")]
    HashBinding,
}

/// Runs the five-step validation pipeline against the node's current tip
/// `(last_index, last_hash)`. Returns `Ok(())` only if every check passes.
pub fn validate_block(
    block: &Block,
    difficulty: u32,
    last_index: i64,
    last_hash: &str,
) -> Result<(), ValidationFailure> {
    // 1. Presence of required fields.
    if block.public_key_pem.is_empty()
        || block.signature.is_empty()
        || block.current_hash.is_empty()
        || block.transactions.is_empty()
    {
        return Err(ValidationFailure::MissingFields);
    }

    // 2. PoW difficulty (I2).
    if !block.meets_difficulty(difficulty) {
        return Err(ValidationFailure::Difficulty);
    }

    // 3. Authenticity (I3).
    if !KeyManager::verify(
        &block.public_key_pem,
        block.current_hash.as_bytes(),
        &block.signature,
    ) {
        return Err(ValidationFailure::Signature);
    }

    // 4. Chain link (I1).
    let expected_index = (last_index + 1) as u64;
    if block.index != expected_index || block.prev_hash != last_hash {
        return Err(ValidationFailure::ChainLink);
    }

    // 5. Hash binding (I4).
    match block.recomputed_hash_matches() {
        Ok(true) => Ok(()),
        _ => Err(ValidationFailure::HashBinding),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::{block::genesis_prev_hash, Transaction};
    use serde_json::json;

    fn signed_block(km: &KeyManager, index: u64, prev_hash: String, difficulty: u32) -> Block {
        let tx = Transaction {
            tx_id: "T1".into(),
            sender: "alice".into(),
            data: json!({"from": "alice", "to": "bob", "amount": 1.0}),
            signature: "SIG".into(),
            start_timestamp: "2026-01-01T00:00:00Z".into(),
            end_timestamp: None,
        };
        let ts = "2026-01-01T00:00:01Z";
        let mut nonce = 0u64;
        loop {
            let hash = Block::compute_hash(&prev_hash, ts, index, &tx, nonce).unwrap();
            if forge_core::pow::hash_meets_difficulty(&hash, difficulty) {
                let signature = km.sign(hash.as_bytes()).unwrap();
                return Block {
                    index,
                    timestamp: ts.into(),
                    prev_hash,
                    current_hash: hash,
                    nonce,
                    miner_id: km.node_id().to_string(),
                    signature,
                    public_key_pem: km.public_key_pem().unwrap(),
                    transactions: vec![tx],
                };
            }
            nonce += 1;
        }
    }

    #[test]
    fn valid_block_passes_every_check() {
        let dir = tempfile::tempdir().unwrap();
        let km = KeyManager::load_or_generate("node-a", dir.path()).unwrap();
        let block = signed_block(&km, 0, genesis_prev_hash(), 1);

        assert_eq!(
            validate_block(&block, 1, -1, &genesis_prev_hash()),
            Ok(())
        );
    }

    #[test]
    fn wrong_chain_tip_fails_i1() {
        let dir = tempfile::tempdir().unwrap();
        let km = KeyManager::load_or_generate("node-a", dir.path()).unwrap();
        let block = signed_block(&km, 0, genesis_prev_hash(), 1);

        let err = validate_block(&block, 1, 3, &genesis_prev_hash()).unwrap_err();
        assert_eq!(err, ValidationFailure::ChainLink);
    }

    #[test]
    fn flipped_signature_fails_i3() {
        let dir = tempfile::tempdir().unwrap();
        let km = KeyManager::load_or_generate("node-a", dir.path()).unwrap();
        let mut block = signed_block(&km, 0, genesis_prev_hash(), 1);
        let flipped = if block.signature.starts_with('0') { '1' } else { '0' };
        block.signature.replace_range(0..1, &flipped.to_string());

        let err = validate_block(&block, 1, -1, &genesis_prev_hash()).unwrap_err();
        assert_eq!(err, ValidationFailure::Signature);
    }

    #[test]
    fn tampered_nonce_fails_i4() {
        let dir = tempfile::tempdir().unwrap();
        let km = KeyManager::load_or_generate("node-a", dir.path()).unwrap();
        let mut block = signed_block(&km, 0, genesis_prev_hash(), 1);
        block.nonce = block.nonce.wrapping_add(1);

        let err = validate_block(&block, 1, -1, &genesis_prev_hash()).unwrap_err();
        assert_eq!(err, ValidationFailure::HashBinding);
    }
}
