//! Confirmation consumer (SPEC_FULL.md §4.6 step "Confirmation consumer",
//! §6.2). Listens for newline-delimited JSON block confirmations forwarded by
//! the gateway and applies each transaction's wallet transfer / asset
//! reassignment, then resolves the matching tx status record.

use std::sync::Arc;

use forge_core::config::Config;
use forge_core::Transaction;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use forge_wallet_store::WalletStore;

use crate::status::{StatusMap, TxStatus};

#[derive(Debug, Deserialize)]
struct BlockConfirmation {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    kind: String,
    block_index: u64,
    #[allow(dead_code)]
    block_hash: String,
    transactions: Vec<Transaction>,
}

pub async fn run(config: Config, wallet: Arc<Mutex<WalletStore>>, status: Arc<StatusMap>) -> std::io::Result<()> {
    let addr = format!("{}:{}", config.appserver_confirm_host, config.appserver_confirm_port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "confirmation consumer listening");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let wallet = Arc::clone(&wallet);
        let status = Arc::clone(&status);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, wallet, status).await {
                tracing::warn!(%peer_addr, error = %e, "confirmation connection error");
            }
        });
    }
}

async fn handle_connection(
    stream: tokio::net::TcpStream,
    wallet: Arc<Mutex<WalletStore>>,
    status: Arc<StatusMap>,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(stream).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<BlockConfirmation>(&line) {
            Ok(confirmation) => apply_confirmation(&wallet, &status, confirmation).await,
            Err(e) => tracing::warn!(error = %e, "malformed block confirmation line"),
        }
    }
    Ok(())
}

async fn apply_confirmation(wallet: &Arc<Mutex<WalletStore>>, status: &Arc<StatusMap>, confirmation: BlockConfirmation) {
    for tx in &confirmation.transactions {
        apply_transaction(wallet, status, tx, confirmation.block_index).await;
    }
}

async fn apply_transaction(
    wallet: &Arc<Mutex<WalletStore>>,
    status: &Arc<StatusMap>,
    tx: &Transaction,
    block_index: u64,
) {
    let (Some(from), Some(to), Some(amount)) = (tx.from_field(), tx.to_field(), tx.amount_field()) else {
        tracing::debug!(block_index, "confirmed transaction has no transfer fields, skipping");
        return;
    };
    let tx_id = tx.data.get("tx_id").and_then(|v| v.as_str());
    let asset_id = tx.asset_id_field();

    let transfer_result = {
        let mut wallet = wallet.lock().await;
        wallet.transfer(from, to, amount)
    };

    match transfer_result {
        Ok(()) => {
            if let Some(asset_id) = asset_id {
                let wallet = wallet.lock().await;
                if let Err(e) = wallet.update_asset_owner(asset_id, to) {
                    tracing::warn!(asset_id, error = %e, "asset ownership update failed after transfer");
                }
            }
            tracing::info!(block_index, from, to, amount, "wallet transfer applied");
            resolve_status(status, tx_id, TxStatus::Confirmed, "Purchase confirmed");
        }
        Err(e) => {
            tracing::warn!(block_index, from, to, amount, error = %e, "wallet transfer failed");
            resolve_status(status, tx_id, TxStatus::Failed, &format!("Wallet transfer failed: {e}"));
        }
    }
}

fn resolve_status(status: &Arc<StatusMap>, tx_id: Option<&str>, new_status: TxStatus, message: &str) {
    let Some(tx_id) = tx_id else {
        return;
    };
    let became_terminal = status.transition(tx_id, new_status, message);
    if became_terminal && status.mark_notified(tx_id) {
        tracing::info!(tx_id, status = ?new_status, "purchase reached terminal state, notifying");
    }
}
