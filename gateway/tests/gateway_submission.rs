use std::time::Duration;

use forge_core::config::ConfigBuilder;
use forge_gateway::wire::{read_framed, write_framed};
use forge_gateway::Gateway;
use serde_json::{json, Value};
use tokio::net::TcpStream;

async fn boot_gateway(port: u16, db_path: std::path::PathBuf) -> std::sync::Arc<Gateway> {
    let mut config = ConfigBuilder::new().gateway("127.0.0.1", port).finish();
    config.node_ports = vec![]; // no nodes reachable in this test
    config.gateway_db_path = db_path.to_string_lossy().into_owned();

    let gateway = Gateway::bootstrap(config).unwrap();
    let g = std::sync::Arc::clone(&gateway);
    tokio::spawn(async move {
        let _ = g.run().await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    gateway
}

#[tokio::test]
async fn health_check_replies_ok() {
    let dir = tempfile::tempdir().unwrap();
    let port = 19349;
    let _gateway = boot_gateway(port, dir.path().join("gw.db")).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = json!({"action": "health"});
    write_framed(&mut stream, &serde_json::to_vec(&request).unwrap())
        .await
        .unwrap();
    let resp: Value = serde_json::from_slice(&read_framed(&mut stream).await.unwrap()).unwrap();
    assert_eq!(resp["status"], "ok");
}

#[tokio::test]
async fn submit_transaction_with_no_nodes_reports_failed() {
    let dir = tempfile::tempdir().unwrap();
    let port = 19350;
    let _gateway = boot_gateway(port, dir.path().join("gw.db")).await;

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = json!({
        "action": "submit_transaction",
        "body": {"sender": "alice", "data": {"to": "bob", "amount": 1.0}, "signature": "SIG"}
    });
    write_framed(&mut stream, &serde_json::to_vec(&request).unwrap())
        .await
        .unwrap();
    let resp: Value = serde_json::from_slice(&read_framed(&mut stream).await.unwrap()).unwrap();
    assert_eq!(resp["status"], "failed");
    assert_eq!(resp["nodes_reached"], 0);
}
