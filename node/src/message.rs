//! Node listener message types (SPEC_FULL.md §4.4).

use forge_core::Block;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeMessage {
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "node_discovery")]
    NodeDiscovery,
    #[serde(rename = "NEW_TRANSACTION")]
    NewTransaction {
        sender: String,
        data: Value,
        signature: String,
    },
    #[serde(rename = "new_block")]
    NewBlock { data: Block },
    #[serde(rename = "STOP_MINING")]
    StopMining,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeResponse {
    #[serde(rename = "pong")]
    Pong { node_id: String },
    #[serde(rename = "peers")]
    Peers { peers: Vec<PeerAddr> },
    #[serde(rename = "MINING_STARTED")]
    MiningStarted,
    #[serde(rename = "ack")]
    Ack,
    #[serde(rename = "error")]
    Error { message: String },
}

/// Block-confirmation datagram emitted by a node to the gateway on mining
/// success (SPEC_FULL.md §6.2). Framed the same as every other node message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockConfirmation {
    #[serde(rename = "type")]
    pub kind: BlockConfirmationKind,
    pub block_index: u64,
    pub block_hash: String,
    pub miner_id: String,
    pub node_id: String,
    pub timestamp: String,
    pub transactions: Vec<forge_core::Transaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BlockConfirmationKind {
    #[serde(rename = "block_confirmation")]
    BlockConfirmation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_tag_matches_wire_casing() {
        let msg = NodeMessage::NewTransaction {
            sender: "alice".into(),
            data: serde_json::json!({"amount": 1}),
            signature: "SIG".into(),
        };
        let encoded = serde_json::to_string(&msg).unwrap();
        assert!(encoded.contains("\"type\":\"NEW_TRANSACTION\""));

        let decoded: NodeMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn stop_mining_round_trips() {
        let encoded = serde_json::to_string(&NodeMessage::StopMining).unwrap();
        assert_eq!(encoded, r#"{"type":"STOP_MINING"}"#);
    }
}
