//! Canonical, key-sorted JSON serialization used as PoW hash input.
//!
//! Two implementations must produce byte-identical output for logically equal
//! inputs. We rely on [`serde_json`]'s default `Map` being a `BTreeMap` (the
//! `preserve_order` feature, which would switch it to insertion order, is never
//! enabled anywhere in this workspace) — serializing any `Value` therefore
//! already emits object keys in sorted order, which is exactly the guarantee
//! canonicalization needs.

use serde::Serialize;

use crate::{Error, Result};

/// The fields that are hashed together to produce a block's `current_hash`,
/// before the winning `nonce` is appended.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalPayload<'a, T: Serialize> {
    pub prev_hash: &'a str,
    pub timestamp: &'a str,
    pub index: u64,
    pub tx: &'a T,
}

/// Serializes `payload` to its canonical JSON byte form.
pub fn canonical_bytes<T: Serialize>(payload: &CanonicalPayload<'_, T>) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(payload).map_err(Error::Serialize)?)
}

/// Appends the ASCII decimal form of `nonce` to `payload_bytes`, matching the
/// original system's `hashlib.sha256(data + str(nonce).encode())` convention.
pub fn with_nonce(payload_bytes: &[u8], nonce: u64) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload_bytes.len() + 20);
    buf.extend_from_slice(payload_bytes);
    buf.extend_from_slice(nonce.to_string().as_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_is_deterministic_regardless_of_construction_order() {
        let a = json!({"z": 1, "a": 2, "m": 3});
        let b = json!({"a": 2, "m": 3, "z": 1});
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn with_nonce_appends_ascii_decimal() {
        let bytes = with_nonce(b"abc", 42);
        assert_eq!(bytes, b"abc42");
    }
}
