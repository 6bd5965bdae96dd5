//! Per-node RSA keypair management (SPEC_FULL.md §4.1 / C1).
//!
//! Each node owns one RSA-2048 keypair, persisted as PKCS#8 (private) and SPKI
//! (public) PEM files under a per-node key directory, generated on first use
//! and loaded on every subsequent restart. Blocks are signed with RSA-PSS over
//! SHA-256 and carry their signer's public key PEM alongside the signature, so
//! a verifier never needs prior knowledge of the miner's key.
//!
//! Grounded on `original_source/blockchain/key_manager.py`'s `NodeKeyManager`.

use std::fs;
use std::path::{Path, PathBuf};

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::pss::{Signature, SigningKey, VerifyingKey};
use rsa::sha2::Sha256;
use rsa::signature::{RandomizedSigner, Verifier};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

const KEY_BITS: usize = 2048;
/// SHA-256 digest length in bytes.
const HASH_LEN: usize = 32;

/// PSS maximum salt length for `key`: `modulus_len - hash_len - 2`
/// (PKCS#1 v2.2 §9.1.1), the largest salt an `emLen`-byte encoding can hold.
fn max_pss_salt_len<K: PublicKeyParts>(key: &K) -> usize {
    key.size() - HASH_LEN - 2
}

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key encoding error: {0}")]
    Encoding(String),

    #[error("rsa error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("invalid signature hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("signature decoding error: {0}")]
    Signature(#[from] rsa::signature::Error),
}

pub type Result<T> = std::result::Result<T, KeyError>;

/// Manages a single node's RSA keypair: generation, persistence, signing and
/// verification.
pub struct KeyManager {
    node_id: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl KeyManager {
    /// Loads `{key_dir}/{node_id}_private.pem`/`_public.pem` if present,
    /// otherwise generates a fresh RSA-2048 keypair and writes both files.
    /// Idempotent: a second call with the same `node_id`/`key_dir` loads the
    /// keys written by the first.
    pub fn load_or_generate(node_id: &str, key_dir: &Path) -> Result<Self> {
        fs::create_dir_all(key_dir)?;
        let private_path = key_dir.join(format!("{node_id}_private.pem"));
        let public_path = key_dir.join(format!("{node_id}_public.pem"));

        if private_path.exists() && public_path.exists() {
            let private_pem = fs::read_to_string(&private_path)?;
            let public_pem = fs::read_to_string(&public_path)?;
            let private_key = RsaPrivateKey::from_pkcs8_pem(&private_pem)
                .map_err(|e| KeyError::Encoding(e.to_string()))?;
            let public_key = RsaPublicKey::from_public_key_pem(&public_pem)
                .map_err(|e| KeyError::Encoding(e.to_string()))?;
            tracing::info!(node_id, "loaded existing keypair");
            return Ok(Self {
                node_id: node_id.to_string(),
                private_key,
                public_key,
            });
        }

        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs8_pem(Default::default())
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        let public_pem = public_key
            .to_public_key_pem(Default::default())
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        fs::write(&private_path, private_pem.as_bytes())?;
        fs::write(&public_path, public_pem.as_bytes())?;
        tracing::info!(node_id, "generated new keypair");

        Ok(Self {
            node_id: node_id.to_string(),
            private_key,
            public_key,
        })
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Signs `data` with RSA-PSS/SHA-256 at the maximum salt length,
    /// returning the signature as lowercase hex. `data` is the hex ASCII
    /// form of the block's `current_hash`.
    pub fn sign(&self, data: &[u8]) -> Result<String> {
        let salt_len = max_pss_salt_len(&self.private_key);
        let signing_key = SigningKey::<Sha256>::new_with_salt_len(self.private_key.clone(), salt_len);
        let mut rng = OsRng;
        let signature = signing_key.sign_with_rng(&mut rng, data);
        Ok(hex::encode(signature.to_bytes()))
    }

    /// Returns this node's public key in SPKI PEM form, to be transported
    /// alongside signed blocks.
    pub fn public_key_pem(&self) -> Result<String> {
        self.public_key
            .to_public_key_pem(Default::default())
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    /// Verifies `sig_hex` over `data` against `pem`. Returns `false` on *any*
    /// failure — malformed PEM, malformed hex, or a genuine signature
    /// mismatch — mirroring the original system's blanket `except: return
    /// False`. Never panics.
    pub fn verify(pem: &str, data: &[u8], sig_hex: &str) -> bool {
        Self::try_verify(pem, data, sig_hex).unwrap_or(false)
    }

    fn try_verify(pem: &str, data: &[u8], sig_hex: &str) -> Result<bool> {
        let public_key =
            RsaPublicKey::from_public_key_pem(pem).map_err(|e| KeyError::Encoding(e.to_string()))?;
        let salt_len = max_pss_salt_len(&public_key);
        let verifying_key = VerifyingKey::<Sha256>::new_with_salt_len(public_key, salt_len);
        let sig_bytes = hex::decode(sig_hex)?;
        let signature = Signature::try_from(sig_bytes.as_slice())?;
        Ok(verifying_key.verify(data, &signature).is_ok())
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}
