//! Shared wallet/asset store (SPEC_FULL.md §4.7 / C7): transactional
//! debit/credit, asset ownership reassignment. Written only by the app
//! server's confirmation consumer and read by the BUY handler's
//! pre-submission checks (SPEC_FULL §5).
//!
//! Grounded on `original_source/python_files/DB_ORM.py`'s `transfer` method
//! (balance read, insufficient-balance/missing-wallet checks, two UPDATEs,
//! commit/rollback), re-expressed with a real `BEGIN IMMEDIATE` transaction
//! instead of Python's implicit autocommit.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("amount must be positive")]
    NonPositiveAmount,

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("insufficient balance: {user} has {balance}")]
    InsufficientBalance { user: String, balance: f64 },
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    pub asset_id: String,
    pub asset_name: String,
    pub owner: String,
    pub is_listed: bool,
    pub cost: f64,
}

pub struct WalletStore {
    conn: Connection,
}

impl WalletStore {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS wallets (
                username   TEXT PRIMARY KEY,
                balance    REAL NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS assets (
                asset_id   TEXT PRIMARY KEY,
                asset_name TEXT NOT NULL,
                owner      TEXT NOT NULL,
                is_listed  INTEGER NOT NULL DEFAULT 1,
                cost       REAL NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }

    /// Creates a wallet for `username` with `initial_balance` if one doesn't
    /// already exist. Idempotent, mirroring `DB_ORM.py`'s `ensure_wallet`.
    pub fn ensure_wallet(&self, username: &str, initial_balance: f64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO wallets (username, balance, updated_at) VALUES (?1, ?2, ?3)",
            params![username, initial_balance, now],
        )?;
        Ok(())
    }

    pub fn balance(&self, username: &str) -> Result<Option<f64>> {
        let balance = self
            .conn
            .query_row(
                "SELECT balance FROM wallets WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        Ok(balance)
    }

    /// Transfers `amount` from `from_user` to `to_user` in one `BEGIN
    /// IMMEDIATE` transaction (SPEC_FULL §4.7). `Ok(())` on success; the
    /// specific `WalletError` otherwise, with no partial write in either
    /// case.
    pub fn transfer(&mut self, from_user: &str, to_user: &str, amount: f64) -> Result<()> {
        if amount <= 0.0 {
            return Err(WalletError::NonPositiveAmount);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let bal_from: Option<f64> = tx
            .query_row(
                "SELECT balance FROM wallets WHERE username = ?1",
                params![from_user],
                |row| row.get(0),
            )
            .optional()?;
        let Some(bal_from) = bal_from else {
            return Err(WalletError::WalletNotFound(from_user.to_string()));
        };

        let bal_to: Option<f64> = tx
            .query_row(
                "SELECT balance FROM wallets WHERE username = ?1",
                params![to_user],
                |row| row.get(0),
            )
            .optional()?;
        let Some(bal_to) = bal_to else {
            return Err(WalletError::WalletNotFound(to_user.to_string()));
        };

        if bal_from < amount {
            return Err(WalletError::InsufficientBalance {
                user: from_user.to_string(),
                balance: bal_from,
            });
        }

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE wallets SET balance = ?1, updated_at = ?2 WHERE username = ?3",
            params![bal_from - amount, now, from_user],
        )?;
        tx.execute(
            "UPDATE wallets SET balance = ?1, updated_at = ?2 WHERE username = ?3",
            params![bal_to + amount, now, to_user],
        )?;
        tx.commit()?;
        tracing::info!(from_user, to_user, amount, "wallet transfer committed");
        Ok(())
    }

    /// Reads an asset row, used by the BUY handler's pre-submission checks
    /// (listed/owner/cost).
    pub fn get_asset(&self, asset_id: &str) -> Result<Option<AssetRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT asset_id, asset_name, owner, is_listed, cost FROM assets WHERE asset_id = ?1",
                params![asset_id],
                |row| {
                    Ok(AssetRecord {
                        asset_id: row.get(0)?,
                        asset_name: row.get(1)?,
                        owner: row.get(2)?,
                        is_listed: row.get::<_, i64>(3)? != 0,
                        cost: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Reassigns `asset_id`'s owner and marks it unlisted. Returns `true` if
    /// a row was actually updated.
    pub fn update_asset_owner(&self, asset_id: &str, new_owner: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE assets SET owner = ?1, is_listed = 0, updated_at = ?2 WHERE asset_id = ?3",
            params![new_owner, now, asset_id],
        )?;
        Ok(changed > 0)
    }

    /// Inserts (or replaces) an asset row, used by test/demo seeding.
    pub fn upsert_asset(&self, asset_id: &str, asset_name: &str, owner: &str, cost: f64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO assets (asset_id, asset_name, owner, is_listed, cost, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)
             ON CONFLICT(asset_id) DO UPDATE SET
                asset_name = excluded.asset_name,
                owner = excluded.owner,
                is_listed = 1,
                cost = excluded.cost,
                updated_at = excluded.updated_at",
            params![asset_id, asset_name, owner, cost, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_balance_both_ways() {
        let mut store = WalletStore::open_in_memory().unwrap();
        store.ensure_wallet("alice", 100.0).unwrap();
        store.ensure_wallet("bob", 0.0).unwrap();

        store.transfer("alice", "bob", 25.0).unwrap();

        assert_eq!(store.balance("alice").unwrap(), Some(75.0));
        assert_eq!(store.balance("bob").unwrap(), Some(25.0));
    }

    #[test]
    fn insufficient_balance_is_rejected_without_partial_write() {
        let mut store = WalletStore::open_in_memory().unwrap();
        store.ensure_wallet("alice", 10.0).unwrap();
        store.ensure_wallet("bob", 0.0).unwrap();

        let err = store.transfer("alice", "bob", 25.0).unwrap_err();
        assert!(matches!(err, WalletError::InsufficientBalance { .. }));
        assert_eq!(store.balance("alice").unwrap(), Some(10.0));
        assert_eq!(store.balance("bob").unwrap(), Some(0.0));
    }

    #[test]
    fn missing_wallet_is_rejected() {
        let mut store = WalletStore::open_in_memory().unwrap();
        store.ensure_wallet("alice", 10.0).unwrap();

        let err = store.transfer("alice", "ghost", 1.0).unwrap_err();
        assert!(matches!(err, WalletError::WalletNotFound(_)));
    }

    #[test]
    fn asset_transfer_clears_listing() {
        let store = WalletStore::open_in_memory().unwrap();
        store.upsert_asset("deer", "Deer", "bob", 25.0).unwrap();

        assert!(store.update_asset_owner("deer", "alice").unwrap());
        let is_listed: i64 = store
            .conn
            .query_row("SELECT is_listed FROM assets WHERE asset_id = 'deer'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(is_listed, 0);
    }

    #[test]
    fn updating_unknown_asset_returns_false() {
        let store = WalletStore::open_in_memory().unwrap();
        assert!(!store.update_asset_owner("ghost", "alice").unwrap());
    }

    #[test]
    fn get_asset_reflects_listing_state() {
        let store = WalletStore::open_in_memory().unwrap();
        store.upsert_asset("deer", "Deer", "bob", 25.0).unwrap();
        let asset = store.get_asset("deer").unwrap().unwrap();
        assert_eq!(asset.owner, "bob");
        assert!(asset.is_listed);

        store.update_asset_owner("deer", "alice").unwrap();
        let asset = store.get_asset("deer").unwrap().unwrap();
        assert!(!asset.is_listed);

        assert!(store.get_asset("ghost").unwrap().is_none());
    }
}
