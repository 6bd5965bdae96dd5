//! PoW node orchestrator (SPEC_FULL.md §4.4 / C4): listener, mempool,
//! mining orchestration, gossip and confirmation emission.
//!
//! Grounded on `original_source/blockchain/manager_pow.py` (accept loop,
//! per-peer broadcast, dispatch-by-type) re-architected onto `tokio` tasks
//! with the miner kept on its own `std::thread` (SPEC_FULL §5, §9).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use forge_core::config::Config;
use forge_core::{new_uuid, now_iso, Block, Transaction};
use forge_keys::KeyManager;
use forge_ledger::LedgerStore;
use forge_miner::{MiningJob, MiningOutcome};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::error::{NodeError, Result};
use crate::mempool::Mempool;
use crate::message::{BlockConfirmation, BlockConfirmationKind, NodeMessage, NodeResponse, PeerAddr};
use crate::registry::NodeRegistry;
use crate::validate;
use crate::wire::{read_framed, write_framed};

struct NodeState {
    ledger: LedgerStore,
    mempool: Mempool,
    last_index: i64,
    last_hash: String,
    mining_cancel: Option<Arc<AtomicBool>>,
}

/// A running PoW node: one listen port, one keypair, one ledger file.
pub struct Node {
    node_id: String,
    port: u16,
    difficulty: u32,
    config: Config,
    keys: KeyManager,
    registry: NodeRegistry,
    state: Mutex<NodeState>,
}

impl Node {
    /// Loads (or generates) this node's keypair, opens its ledger, opens the
    /// shared peer registry, and registers itself. `port` must be one of
    /// `config.node_ports`.
    pub async fn bootstrap(config: Config, port: u16) -> Result<Arc<Self>> {
        let node_id = format!("node-{port}");
        let key_dir = PathBuf::from(&config.key_dir);
        let ledger_dir = PathBuf::from(&config.ledger_dir);

        let keys = KeyManager::load_or_generate(&node_id, &key_dir)?;
        let ledger = LedgerStore::init(&ledger_dir, port)?;
        let (last_index, last_hash) = ledger.load_last_block()?;

        let registry = NodeRegistry::open(&ledger_dir.join("node_registry.db"))?;
        registry.upsert_self(&node_id, &config.node_host, port, "miner")?;

        tracing::info!(node_id, port, last_index, "node bootstrapped");

        Ok(Arc::new(Self {
            node_id,
            port,
            difficulty: config.difficulty,
            config,
            keys,
            registry,
            state: Mutex::new(NodeState {
                ledger,
                mempool: Mempool::default(),
                last_index,
                last_hash,
                mining_cancel: None,
            }),
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Binds the listen socket and accepts connections until the process
    /// exits. One task per connection.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.node_host, self.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(node_id = %self.node_id, %addr, "node listening");

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let node = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = node.handle_connection(stream).await {
                    tracing::warn!(node_id = %node.node_id, %peer_addr, error = %e, "connection error");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let frame = read_framed(&mut stream).await?;
        let msg: NodeMessage = serde_json::from_slice(&frame)?;

        if let Some(response) = self.handle_message(msg).await {
            let bytes = serde_json::to_vec(&response)?;
            write_framed(&mut stream, &bytes).await?;
        }
        Ok(())
    }

    /// Dispatches one decoded message. Query-style messages (`ping`,
    /// `node_discovery`) and `NEW_TRANSACTION` (acked with `MINING_STARTED`)
    /// return `Some(response)`; `new_block`/`STOP_MINING` are fire-and-forget
    /// per the sender's connect-send-close pattern and return `None`.
    async fn handle_message(self: &Arc<Self>, msg: NodeMessage) -> Option<NodeResponse> {
        match msg {
            NodeMessage::Ping => Some(NodeResponse::Pong {
                node_id: self.node_id.clone(),
            }),
            NodeMessage::NodeDiscovery => {
                let peers = self
                    .registry
                    .known_peers(&self.config.node_ports, self.port)
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "peer lookup failed");
                        Vec::new()
                    });
                Some(NodeResponse::Peers { peers })
            }
            NodeMessage::NewTransaction {
                sender,
                data,
                signature,
            } => {
                let tx = Transaction {
                    tx_id: new_uuid(),
                    sender,
                    data,
                    signature,
                    start_timestamp: now_iso(),
                    end_timestamp: None,
                };
                {
                    let mut state = self.state.lock().await;
                    state.mempool.push(tx);
                }
                self.ensure_mining().await;
                Some(NodeResponse::MiningStarted)
            }
            NodeMessage::NewBlock { data } => {
                self.handle_incoming_block(data).await;
                None
            }
            NodeMessage::StopMining => {
                let state = self.state.lock().await;
                if let Some(cancel) = &state.mining_cancel {
                    cancel.store(true, Ordering::Relaxed);
                }
                None
            }
        }
    }

    async fn handle_incoming_block(self: &Arc<Self>, mut block: Block) {
        let (difficulty, last_index, last_hash) = {
            let state = self.state.lock().await;
            (self.difficulty, state.last_index, state.last_hash.clone())
        };

        if let Err(reason) = validate::validate_block(&block, difficulty, last_index, &last_hash) {
            tracing::warn!(node_id = %self.node_id, %reason, "rejected incoming block");
            return;
        }

        for tx in &mut block.transactions {
            tx.end_timestamp = Some(block.timestamp.clone());
        }

        let mut state = self.state.lock().await;
        let append_result = tokio::task::block_in_place(|| state.ledger.append_block(&block));
        match append_result {
            Ok(()) => {
                state.last_index = block.index as i64;
                state.last_hash = block.current_hash.clone();
                if let Some(cancel) = state.mining_cancel.take() {
                    cancel.store(true, Ordering::Relaxed);
                }
                state.mempool.pop_head();
                tracing::info!(node_id = %self.node_id, index = block.index, "accepted peer block");
            }
            Err(e) => {
                tracing::warn!(node_id = %self.node_id, error = %e, "ledger append failed for peer block");
                return;
            }
        }
        drop(state);
        self.ensure_mining().await;
    }

    /// Starts a miner over the mempool head if none is currently running.
    async fn ensure_mining(self: &Arc<Self>) {
        let job = {
            let mut state = self.state.lock().await;
            if state.mining_cancel.is_some() {
                return;
            }
            let Some(tx) = state.mempool.peek_head().cloned() else {
                return;
            };
            let job = MiningJob {
                prev_hash: state.last_hash.clone(),
                timestamp: now_iso(),
                index: (state.last_index + 1) as u64,
                tx,
                difficulty: self.difficulty,
            };
            let handle = forge_miner::spawn(job.clone());
            state.mining_cancel = Some(handle.cancel_token());
            tracing::info!(node_id = %self.node_id, index = job.index, "mining started");
            (job, handle)
        };

        let (job, handle) = job;
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || handle.join()).await;
            node.on_mining_result(job, result).await;
        });
    }

    async fn on_mining_result(
        self: &Arc<Self>,
        job: MiningJob,
        result: std::result::Result<forge_core::Result<Option<MiningOutcome>>, tokio::task::JoinError>,
    ) {
        let outcome = match result {
            Ok(Ok(Some(outcome))) => outcome,
            Ok(Ok(None)) => {
                tracing::debug!(node_id = %self.node_id, "mining cancelled");
                return;
            }
            Ok(Err(e)) => {
                tracing::error!(node_id = %self.node_id, error = %e, "mining search failed");
                return;
            }
            Err(e) => {
                tracing::error!(node_id = %self.node_id, error = %e, "mining thread panicked");
                return;
            }
        };

        let block = {
            let mut state = self.state.lock().await;
            // A STOP_MINING/new_block race may have already cleared or
            // replaced the cancel token; only apply this result if it's
            // still the one we started.
            if state.mining_cancel.is_none() {
                return;
            }

            let mut tx = job.tx.clone();
            let signature = match self.keys.sign(outcome.hash.as_bytes()) {
                Ok(sig) => sig,
                Err(e) => {
                    tracing::error!(node_id = %self.node_id, error = %e, "failed to sign mined block");
                    return;
                }
            };
            let public_key_pem = match self.keys.public_key_pem() {
                Ok(pem) => pem,
                Err(e) => {
                    tracing::error!(node_id = %self.node_id, error = %e, "failed to export public key");
                    return;
                }
            };
            tx.end_timestamp = Some(job.timestamp.clone());

            let block = Block {
                index: job.index,
                timestamp: job.timestamp.clone(),
                prev_hash: job.prev_hash.clone(),
                current_hash: outcome.hash.clone(),
                nonce: outcome.nonce,
                miner_id: self.node_id.clone(),
                signature,
                public_key_pem,
                transactions: vec![tx],
            };

            let append_result = tokio::task::block_in_place(|| state.ledger.append_block(&block));
            if let Err(e) = append_result {
                tracing::error!(node_id = %self.node_id, error = %e, "ledger append failed for mined block");
                state.mining_cancel = None;
                return;
            }

            state.last_index = block.index as i64;
            state.last_hash = block.current_hash.clone();
            state.mining_cancel = None;
            state.mempool.pop_head();
            block
        };

        tracing::info!(node_id = %self.node_id, index = block.index, hash = %block.current_hash, "mined block");

        self.broadcast_block(&block).await;
        self.emit_confirmation(&block).await;
        self.ensure_mining().await;
    }

    async fn broadcast_block(&self, block: &Block) {
        let peers = self
            .registry
            .known_peers(&self.config.node_ports, self.port)
            .unwrap_or_default();
        let mut sent = 0usize;
        for peer in &peers {
            if self.send_gossip(peer, &NodeMessage::NewBlock { data: block.clone() }).await {
                sent += 1;
            }
        }
        tracing::info!(node_id = %self.node_id, sent, total = peers.len(), "broadcast new_block");
    }

    async fn send_gossip(&self, peer: &PeerAddr, msg: &NodeMessage) -> bool {
        let addr = format!("{}:{}", peer.host, peer.port);
        let timeout = self.config.peer_socket_timeout();
        let attempt = async {
            let mut stream = TcpStream::connect(&addr).await?;
            let bytes = serde_json::to_vec(msg)?;
            write_framed(&mut stream, &bytes).await?;
            Ok::<(), NodeError>(())
        };
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(node_id = %self.node_id, %addr, error = %e, "gossip send failed");
                false
            }
            Err(_) => {
                tracing::warn!(node_id = %self.node_id, %addr, "gossip send timed out");
                false
            }
        }
    }

    /// Emits a block-confirmation datagram to the gateway as a single
    /// newline-terminated JSON line, not the 2-byte length-prefixed framing
    /// used elsewhere on this listener (SPEC_FULL.md §6.2: newline-delimited
    /// at both the node→gateway and gateway→app-server hops).
    async fn emit_confirmation(&self, block: &Block) {
        let confirmation = BlockConfirmation {
            kind: BlockConfirmationKind::BlockConfirmation,
            block_index: block.index,
            block_hash: block.current_hash.clone(),
            miner_id: block.miner_id.clone(),
            node_id: self.node_id.clone(),
            timestamp: block.timestamp.clone(),
            transactions: block.transactions.clone(),
        };
        let addr = format!("{}:{}", self.config.gateway_host, self.config.gateway_port);
        let timeout = self.config.peer_socket_timeout();
        let attempt = async {
            let mut stream = TcpStream::connect(&addr).await?;
            let mut line = serde_json::to_vec(&confirmation)?;
            line.push(b'\n');
            stream.write_all(&line).await?;
            stream.flush().await?;
            Ok::<(), NodeError>(())
        };
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(())) => {
                tracing::info!(node_id = %self.node_id, index = block.index, "emitted block confirmation");
            }
            Ok(Err(e)) => {
                tracing::warn!(node_id = %self.node_id, %addr, error = %e, "confirmation emission failed");
            }
            Err(_) => {
                tracing::warn!(node_id = %self.node_id, %addr, "confirmation emission timed out");
            }
        }
    }
}
