//! Peer discovery bootstrap (SPEC_FULL.md §6.4): a shared sqlite table of
//! known node addresses, refreshed by each node on startup and consulted to
//! build its peer list instead of requiring static peer config.
//!
//! Grounded on `original_source/blockchain/p2p_engine.py`'s peer list, made
//! persistent and shared across node processes on the same machine.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::message::PeerAddr;

/// A peer is considered stale (dropped from discovery results) if its
/// `last_seen` is older than this many seconds.
const STALE_AFTER_SECS: i64 = 60;

pub struct NodeRegistry {
    conn: Connection,
}

impl NodeRegistry {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS node_registry (
                node_id   TEXT PRIMARY KEY,
                host      TEXT NOT NULL,
                port      INTEGER NOT NULL,
                node_type TEXT NOT NULL,
                status    TEXT NOT NULL,
                last_seen INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Inserts or refreshes this node's own row.
    pub fn upsert_self(&self, node_id: &str, host: &str, port: u16, node_type: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT INTO node_registry (node_id, host, port, node_type, status, last_seen)
             VALUES (?1, ?2, ?3, ?4, 'online', ?5)
             ON CONFLICT(node_id) DO UPDATE SET
                host = excluded.host,
                port = excluded.port,
                node_type = excluded.node_type,
                status = 'online',
                last_seen = excluded.last_seen",
            params![node_id, host, port, node_type, now],
        )?;
        Ok(())
    }

    /// Returns peers whose port is in `configured_ports`, excluding `self_port`,
    /// filtering out rows whose `last_seen` predates the staleness window.
    pub fn known_peers(&self, configured_ports: &[u16], self_port: u16) -> Result<Vec<PeerAddr>> {
        let cutoff = chrono::Utc::now().timestamp() - STALE_AFTER_SECS;
        let mut stmt = self
            .conn
            .prepare("SELECT host, port FROM node_registry WHERE last_seen >= ?1 AND port != ?2")?;
        let rows = stmt.query_map(params![cutoff, self_port], |row| {
            Ok(PeerAddr {
                host: row.get(0)?,
                port: row.get::<_, i64>(1)? as u16,
            })
        })?;

        let mut peers = Vec::new();
        for row in rows {
            let peer = row?;
            if configured_ports.contains(&peer.port) {
                peers.push(peer);
            }
        }
        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_to_configured_ports_and_excludes_self() {
        let dir = tempfile::tempdir().unwrap();
        let registry = NodeRegistry::open(&dir.path().join("registry.db")).unwrap();

        registry.upsert_self("node-a", "127.0.0.1", 13245, "miner").unwrap();
        registry.upsert_self("node-b", "127.0.0.1", 13246, "miner").unwrap();
        registry.upsert_self("node-c", "127.0.0.1", 19999, "miner").unwrap();

        let peers = registry.known_peers(&[13245, 13246], 13245).unwrap();
        let ports: Vec<u16> = peers.iter().map(|p| p.port).collect();
        assert_eq!(ports, vec![13246]);
    }
}
