//! Gateway wire message shapes (SPEC_FULL.md §4.5, §6.2).
//!
//! Grounded almost directly on
//! `original_source/blockchain/gateway_server.py`'s `handle()`: one listener
//! port shared by clients (`action`-tagged, length-prefixed) and nodes
//! (`block_confirmation`, newline-delimited — demultiplexed in
//! `gateway.rs::handle_connection` before either framing is parsed).

use forge_core::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The envelope a client's length-prefixed frame is first parsed into,
/// before dispatch by `action`.
#[derive(Debug, Deserialize)]
pub struct RawInbound {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPurchaseBody {
    pub buyer: String,
    pub seller: String,
    pub asset_id: String,
    pub asset_name: String,
    pub price: f64,
    pub timestamp: String,
    pub tx_id: String,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitTransactionBody {
    pub sender: String,
    pub data: Value,
    #[serde(default)]
    pub signature: String,
}

/// The `NEW_TRANSACTION` message broadcast to every configured node port.
#[derive(Debug, Serialize)]
pub struct NewTransactionMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sender: String,
    pub data: Value,
    pub signature: String,
}

impl NewTransactionMessage {
    pub fn new(sender: String, data: Value, signature: String) -> Self {
        Self {
            kind: "NEW_TRANSACTION",
            sender,
            data,
            signature,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionReply {
    pub status: &'static str,
    pub nodes_reached: usize,
    pub message: String,
    pub timestamp: String,
    pub transaction: Value,
}

#[derive(Debug, Serialize)]
pub struct HealthReply {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ErrorReply {
    pub error: String,
}

/// Block-confirmation datagram sent by a node, and forwarded on to the app
/// server (SPEC_FULL.md §6.2).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BlockConfirmation {
    #[serde(rename = "type")]
    pub kind: String,
    pub block_index: u64,
    pub block_hash: String,
    pub miner_id: String,
    pub node_id: String,
    pub timestamp: String,
    pub transactions: Vec<Transaction>,
}
