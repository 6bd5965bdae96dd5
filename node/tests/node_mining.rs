//! End-to-end test: boot a node, submit a transaction over the wire, and
//! confirm it gets mined into block 0 on that node's own ledger.

use std::time::Duration;

use forge_core::config::ConfigBuilder;
use forge_node::message::{NodeMessage, NodeResponse};
use forge_node::wire::{read_framed, write_framed};
use forge_node::Node;
use tokio::net::TcpStream;

#[tokio::test]
async fn submitted_transaction_gets_mined_into_a_block() {
    let dir = tempfile::tempdir().unwrap();
    let port = 19345;
    let mut config = ConfigBuilder::new()
        .node_ports(vec![port])
        .difficulty(0)
        .finish();
    config.ledger_dir = dir.path().join("ledger").to_string_lossy().into_owned();
    config.key_dir = dir.path().join("keys").to_string_lossy().into_owned();
    config.node_host = "127.0.0.1".into();

    let node = Node::bootstrap(config, port).await.unwrap();
    let node_for_listener = std::sync::Arc::clone(&node);
    tokio::spawn(async move {
        let _ = node_for_listener.run().await;
    });

    // Give the listener a moment to bind.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let msg = NodeMessage::NewTransaction {
        sender: "alice".into(),
        data: serde_json::json!({"from": "alice", "to": "bob", "amount": 10.0}),
        signature: "SIG".into(),
    };
    write_framed(&mut stream, &serde_json::to_vec(&msg).unwrap())
        .await
        .unwrap();
    drop(stream);

    // Poll for the mined block to land, since mining happens on a background
    // task/thread.
    let mut mined = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut ping = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        write_framed(&mut ping, &serde_json::to_vec(&NodeMessage::Ping).unwrap())
            .await
            .unwrap();
        let resp: NodeResponse = serde_json::from_slice(&read_framed(&mut ping).await.unwrap()).unwrap();
        assert!(matches!(resp, NodeResponse::Pong { .. }));

        let ledger_path = dir.path().join("ledger").join(format!("node_{port}.db"));
        if ledger_path.exists() {
            let conn = rusqlite::Connection::open(&ledger_path).unwrap();
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM blocks", [], |row| row.get(0))
                .unwrap();
            if count >= 1 {
                mined = true;
                break;
            }
        }
    }
    assert!(mined, "expected a block to be mined within the polling window");
}
