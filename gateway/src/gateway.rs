//! Gateway orchestrator (SPEC_FULL.md §4.5 / C5): single listener serving
//! both client purchase/tx submissions and node block confirmations,
//! fanning the former out to every configured node and the latter on to
//! the app server.

use std::path::PathBuf;
use std::sync::Arc;

use forge_core::config::Config;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::confirm_store::ConfirmStore;
use crate::error::{GatewayError, Result};
use crate::message::{
    BlockConfirmation, ErrorReply, HealthReply, NewTransactionMessage, RawInbound, SubmissionReply,
    SubmitPurchaseBody, SubmitTransactionBody,
};
use crate::wire::{read_framed, write_framed};

pub struct Gateway {
    config: Config,
    confirm_store: ConfirmStore,
}

impl Gateway {
    pub fn bootstrap(config: Config) -> Result<Arc<Self>> {
        let confirm_store = ConfirmStore::open(&PathBuf::from(&config.gateway_db_path))?;
        Ok(Arc::new(Self {
            config,
            confirm_store,
        }))
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.gateway_host, self.config.gateway_port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "gateway listening");

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let gateway = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = gateway.handle_connection(stream).await {
                    tracing::warn!(%peer_addr, error = %e, "gateway connection error");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        // Client submissions arrive 2-byte length-prefixed (§6.1); node
        // block confirmations arrive as a single newline-terminated JSON
        // line (§6.2). Both share this port, so peek the first byte: a
        // length prefix's high byte is 0 for any frame under 256 bytes,
        // never the literal `{` that opens a JSON object.
        let mut probe = [0u8; 1];
        if stream.peek(&mut probe).await? == 1 && probe[0] == b'{' {
            self.handle_confirmation_line(stream).await;
            return Ok(());
        }

        let frame = read_framed(&mut stream).await?;
        let inbound: RawInbound = match serde_json::from_slice(&frame) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "malformed gateway frame");
                return Ok(());
            }
        };

        let reply = match inbound.action.as_deref() {
            Some("health") => serde_json::to_vec(&HealthReply {
                status: "ok",
                service: "gateway_server",
            })?,
            Some("submit_purchase") => self.handle_submit_purchase(inbound.body).await?,
            Some("submit_transaction") => self.handle_submit_transaction(inbound.body).await?,
            other => serde_json::to_vec(&ErrorReply {
                error: format!("Unknown action or type: {:?}", other),
            })?,
        };
        write_framed(&mut stream, &reply).await?;
        Ok(())
    }

    async fn handle_submit_purchase(&self, body: Option<Value>) -> Result<Vec<u8>> {
        let Some(body) = body else {
            return Ok(serde_json::to_vec(&failed_reply("Missing body"))?);
        };
        let parsed: SubmitPurchaseBody = match serde_json::from_value(body) {
            Ok(p) => p,
            Err(e) => {
                return Ok(serde_json::to_vec(&failed_reply(&format!(
                    "Missing fields: {e}"
                )))?)
            }
        };

        let signature = parsed
            .signature
            .clone()
            .unwrap_or_else(|| format!("SIG_{}_{}", parsed.buyer, parsed.tx_id));
        let tx_payload = json!({
            "action": "purchase",
            "tx_id": parsed.tx_id,
            "asset_id": parsed.asset_id,
            "asset_name": parsed.asset_name,
            "price": parsed.price,
            "from": parsed.buyer,
            "to": parsed.seller,
            "amount": parsed.price,
            "timestamp": parsed.timestamp,
        });

        let count = self
            .broadcast_transaction(parsed.buyer.clone(), tx_payload.clone(), signature)
            .await;
        let message = submission_message(count);
        let reply = SubmissionReply {
            status: if count > 0 { "submitted" } else { "failed" },
            nodes_reached: count,
            message,
            timestamp: parsed.timestamp,
            transaction: json!({"sender": parsed.buyer, "data": tx_payload}),
        };
        Ok(serde_json::to_vec(&reply)?)
    }

    async fn handle_submit_transaction(&self, body: Option<Value>) -> Result<Vec<u8>> {
        let Some(body) = body else {
            return Ok(serde_json::to_vec(&ErrorReply {
                error: "Invalid or missing body".into(),
            })?);
        };
        let parsed: SubmitTransactionBody = match serde_json::from_value(body) {
            Ok(p) => p,
            Err(_) => {
                return Ok(serde_json::to_vec(&ErrorReply {
                    error: "Invalid or missing body".into(),
                })?)
            }
        };

        let ts = forge_core::now_iso();
        let count = self
            .broadcast_transaction(parsed.sender.clone(), parsed.data.clone(), parsed.signature)
            .await;
        let message = submission_message(count);
        let reply = SubmissionReply {
            status: if count > 0 { "submitted" } else { "failed" },
            nodes_reached: count,
            message,
            timestamp: ts,
            transaction: json!({"sender": parsed.sender, "data": parsed.data}),
        };
        Ok(serde_json::to_vec(&reply)?)
    }

    /// Connect-send-close to every configured node port; returns the number
    /// that accepted the `NEW_TRANSACTION` frame.
    async fn broadcast_transaction(&self, sender: String, data: Value, signature: String) -> usize {
        let msg = NewTransactionMessage::new(sender, data, signature);
        let bytes = match serde_json::to_vec(&msg) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode NEW_TRANSACTION");
                return 0;
            }
        };

        let timeout = self.config.peer_socket_timeout();
        let mut count = 0usize;
        for port in &self.config.node_ports {
            let addr = format!("{}:{}", self.config.node_host, port);
            let attempt = async {
                let mut stream = TcpStream::connect(&addr).await?;
                write_framed(&mut stream, &bytes).await?;
                Ok::<(), GatewayError>(())
            };
            match tokio::time::timeout(timeout, attempt).await {
                Ok(Ok(())) => {
                    count += 1;
                    tracing::info!(%addr, "broadcast tx to node");
                }
                Ok(Err(e)) => tracing::warn!(%addr, error = %e, "node unreachable"),
                Err(_) => tracing::warn!(%addr, "node broadcast timed out"),
            }
        }
        count
    }

    async fn handle_confirmation_line(&self, stream: TcpStream) {
        let mut lines = BufReader::new(stream).lines();
        match lines.next_line().await {
            Ok(Some(line)) => self.handle_confirmation(line.as_bytes()).await,
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "failed to read block_confirmation line"),
        }
    }

    async fn handle_confirmation(&self, frame: &[u8]) {
        let confirmation: BlockConfirmation = match serde_json::from_slice(frame) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "malformed block_confirmation");
                return;
            }
        };

        tracing::info!(
            block_index = confirmation.block_index,
            block_hash = %confirmation.block_hash,
            miner_id = %confirmation.miner_id,
            "transaction confirmed (block committed)"
        );

        match self.confirm_store.record(&confirmation) {
            Ok(true) => tracing::info!(block_index = confirmation.block_index, "saved to ledger"),
            Ok(false) => tracing::debug!(block_hash = %confirmation.block_hash, "duplicate confirmation, no-op"),
            Err(e) => tracing::warn!(error = %e, "failed to record confirmation"),
        }

        self.forward_to_appserver(&confirmation).await;
    }

    async fn forward_to_appserver(&self, confirmation: &BlockConfirmation) {
        let addr = format!(
            "{}:{}",
            self.config.appserver_confirm_host, self.config.appserver_confirm_port
        );
        let timeout = self.config.peer_socket_timeout();
        let attempt = async {
            let mut stream = TcpStream::connect(&addr).await?;
            let mut line = serde_json::to_vec(confirmation)?;
            line.push(b'\n');
            stream.write_all(&line).await?;
            stream.flush().await?;
            Ok::<(), GatewayError>(())
        };
        match tokio::time::timeout(timeout, attempt).await {
            Ok(Ok(())) => {
                tracing::info!(block_index = confirmation.block_index, "notified app server")
            }
            Ok(Err(e)) => tracing::warn!(%addr, error = %e, "notify app server failed"),
            Err(_) => tracing::warn!(%addr, "notify app server timed out"),
        }
    }
}

fn submission_message(count: usize) -> String {
    if count == 0 {
        "Transaction failed: no nodes reached. Start nodes first.".to_string()
    } else {
        format!("Transaction submitted. Broadcast to {count} node(s). Pending confirmation.")
    }
}

fn failed_reply(message: &str) -> SubmissionReply {
    SubmissionReply {
        status: "failed",
        nodes_reached: 0,
        message: message.to_string(),
        timestamp: forge_core::now_iso(),
        transaction: Value::Null,
    }
}
