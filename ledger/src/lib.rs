//! Per-node ledger store (SPEC_FULL.md §4.2 / C2).
//!
//! One physical sqlite file per listen port, written only by that node's
//! listener task (single-writer discipline — see §5). Provides idempotent
//! schema creation, additive migration, tip lookup, and atomic block append.
//!
//! Grounded on `original_source/blockchain/json_ledger.py` and
//! `original_source/python_files/DB_ORM.py`'s table shapes, re-expressed as a
//! real relational store per SPEC_FULL §4.2.

use std::path::Path;

use forge_core::Block;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Raised when `append_block` is asked to insert a block whose
    /// `current_hash` already exists (the UNIQUE constraint from §4.2).
    #[error("duplicate block hash: {0}")]
    DuplicateBlock(String),

    #[error("block has no transactions")]
    EmptyTransactions,
}

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Additive migrations applied at [`LedgerStore::init`], in order. Each entry
/// is `(table, column, column_def)`; a column already present is left alone.
/// New columns are added here, never by rewriting the `CREATE TABLE` below.
const MIGRATIONS: &[(&str, &str, &str)] = &[];

pub struct LedgerStore {
    conn: Connection,
}

impl LedgerStore {
    /// Opens (creating if necessary) the ledger file for `port` under `dir`,
    /// and brings its schema up to date. Idempotent: safe to call on every
    /// node startup.
    pub fn init(dir: &Path, port: u16) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(|e| LedgerError::Sqlite(rusqlite::Error::ModuleError(e.to_string())))?;
        let path = dir.join(format!("node_{port}.db"));
        let conn = Connection::open(path)?;
        Self::create_schema(&conn)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory store, used by tests that don't need on-disk persistence.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::create_schema(&conn)?;
        Self::migrate(&conn)?;
        Ok(Self { conn })
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS blocks (
                idx            INTEGER PRIMARY KEY,
                timestamp       TEXT NOT NULL,
                prev_hash       TEXT NOT NULL,
                current_hash    TEXT NOT NULL UNIQUE,
                nonce           INTEGER NOT NULL,
                miner_id        TEXT NOT NULL,
                signature       TEXT NOT NULL,
                public_key_pem  TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_blocks_current_hash ON blocks(current_hash);

            CREATE TABLE IF NOT EXISTS transactions (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                block_hash      TEXT NOT NULL REFERENCES blocks(current_hash),
                tx_id           TEXT NOT NULL,
                sender          TEXT NOT NULL,
                data            TEXT NOT NULL,
                signature       TEXT NOT NULL,
                start_timestamp TEXT NOT NULL,
                end_timestamp   TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_transactions_block_hash ON transactions(block_hash);
            "#,
        )?;
        Ok(())
    }

    /// Applies [`MIGRATIONS`], skipping any `(table, column)` pair that
    /// `PRAGMA table_info` reports as already present.
    fn migrate(conn: &Connection) -> Result<()> {
        for (table, column, def) in MIGRATIONS {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
            let existing: Vec<String> = stmt
                .query_map([], |row| row.get::<_, String>(1))?
                .collect::<std::result::Result<_, _>>()?;
            if !existing.iter().any(|c| c == column) {
                conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {def}"))?;
                tracing::info!(table, column, "applied additive ledger migration");
            }
        }
        Ok(())
    }

    /// Returns `(last_index, last_hash)`, or `(-1, "0"×64)` for an empty
    /// ledger — the genesis sentinel a node's chain tip starts from.
    pub fn load_last_block(&self) -> Result<(i64, String)> {
        let row: Option<(i64, String)> = self
            .conn
            .query_row(
                "SELECT idx, current_hash FROM blocks ORDER BY idx DESC LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.unwrap_or_else(|| (-1, forge_core::block::genesis_prev_hash())))
    }

    /// Inserts `block` and its transactions in a single transaction. Fails
    /// atomically — no partial write — if `block.current_hash` already
    /// exists.
    pub fn append_block(&mut self, block: &Block) -> Result<()> {
        if block.transactions.is_empty() {
            return Err(LedgerError::EmptyTransactions);
        }
        let tx = self.conn.transaction()?;
        {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO blocks
                    (idx, timestamp, prev_hash, current_hash, nonce, miner_id, signature, public_key_pem)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    block.index as i64,
                    block.timestamp,
                    block.prev_hash,
                    block.current_hash,
                    block.nonce as i64,
                    block.miner_id,
                    block.signature,
                    block.public_key_pem,
                ],
            )?;
            if inserted == 0 {
                return Err(LedgerError::DuplicateBlock(block.current_hash.clone()));
            }

            for t in &block.transactions {
                tx.execute(
                    "INSERT INTO transactions
                        (block_hash, tx_id, sender, data, signature, start_timestamp, end_timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        block.current_hash,
                        t.tx_id,
                        t.sender,
                        serde_json::to_string(&t.data)?,
                        t.signature,
                        t.start_timestamp,
                        t.end_timestamp,
                    ],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Number of blocks currently persisted. Used by status/debug endpoints.
    pub fn block_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}
