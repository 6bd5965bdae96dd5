//! BUY submission path and submission worker (SPEC_FULL.md §4.6 / C6).

use std::sync::Arc;

use forge_core::config::Config;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};

use forge_wallet_store::WalletStore;

use crate::protocol::{err_reply, ok_pending};
use crate::status::{StatusMap, TxStatus, TxStatusRecord};
use crate::wire::write_framed;

const PRICE_EPSILON: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct PurchaseJob {
    pub tx_id: String,
    pub asset_id: String,
    pub asset_name: String,
    pub buyer: String,
    pub seller: String,
    pub amount: f64,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
struct SubmitPurchaseRequest {
    action: &'static str,
    body: SubmitPurchaseBody,
}

#[derive(Debug, Serialize)]
struct SubmitPurchaseBody {
    buyer: String,
    seller: String,
    asset_id: String,
    asset_name: String,
    price: f64,
    timestamp: String,
    tx_id: String,
}

#[derive(Debug, Deserialize)]
struct SubmitPurchaseReply {
    status: String,
    #[serde(default)]
    message: String,
}

/// Runs the BUY handler (§4.6 steps 1-5) against one command's arguments.
/// Returns the wire reply string.
pub async fn handle_buy(
    wallet: &Arc<Mutex<WalletStore>>,
    status: &Arc<StatusMap>,
    queue: &mpsc::Sender<PurchaseJob>,
    asset_id: &str,
    username: &str,
    amount: f64,
) -> String {
    let asset = {
        let wallet = wallet.lock().await;
        match wallet.get_asset(asset_id) {
            Ok(asset) => asset,
            Err(e) => return err_reply("DB_ERROR", &e.to_string()),
        }
    };
    let Some(asset) = asset else {
        return err_reply("NOT_FOUND", "Asset not found");
    };
    if !asset.is_listed {
        return err_reply("NOT_LISTED", "Asset is not listed for sale");
    }
    if asset.owner == username {
        return err_reply("SELF_PURCHASE", "Cannot purchase your own asset");
    }
    if (amount - asset.cost).abs() > PRICE_EPSILON {
        return err_reply(
            "PRICE_MISMATCH",
            &format!("Expected price {}, got {}", asset.cost, amount),
        );
    }

    let balance = {
        let wallet = wallet.lock().await;
        match wallet.balance(username) {
            Ok(b) => b,
            Err(e) => return err_reply("DB_ERROR", &e.to_string()),
        }
    };
    let Some(balance) = balance else {
        return err_reply("NO_WALLET", "Wallet not found");
    };
    if balance < amount {
        return err_reply("INSUFFICIENT_FUNDS", "Insufficient funds");
    }

    let tx_id = forge_core::new_uuid();
    let job = PurchaseJob {
        tx_id: tx_id.clone(),
        asset_id: asset_id.to_string(),
        asset_name: asset.asset_name.clone(),
        buyer: username.to_string(),
        seller: asset.owner.clone(),
        amount,
        timestamp: forge_core::now_iso(),
    };

    status.insert(
        tx_id.clone(),
        TxStatusRecord::queued(
            username.to_string(),
            Some(asset.owner.clone()),
            amount,
            Some(asset_id.to_string()),
            Some(asset.asset_name.clone()),
        ),
    );

    if queue.send(job).await.is_err() {
        status.transition(&tx_id, TxStatus::Failed, "Submission queue closed");
        return err_reply("INTERNAL", "Submission queue closed");
    }

    ok_pending(&tx_id)
}

/// Single long-running consumer: dequeues one purchase at a time, submits it
/// to the gateway, and records the outcome on the status map.
pub async fn run_submission_worker(
    mut queue: mpsc::Receiver<PurchaseJob>,
    status: Arc<StatusMap>,
    config: Config,
) {
    while let Some(job) = queue.recv().await {
        let tx_id = job.tx_id.clone();
        let outcome = tokio::time::timeout(config.submission_timeout(), submit_to_gateway(&config, &job)).await;

        match outcome {
            Ok(Ok(reply)) if reply.status == "submitted" => {
                status.transition(&tx_id, TxStatus::Submitted, "Submitted to blockchain network");
                tracing::info!(tx_id, "purchase submitted to gateway");
            }
            Ok(Ok(reply)) => {
                status.transition(&tx_id, TxStatus::Failed, reply.message.clone());
                tracing::warn!(tx_id, message = %reply.message, "gateway reported failure");
            }
            Ok(Err(e)) => {
                let message = format!("Gateway error: {e}");
                status.transition(&tx_id, TxStatus::Failed, message.clone());
                tracing::warn!(tx_id, error = %e, "gateway call failed");
            }
            Err(_) => {
                let message = "Gateway error: submission timed out".to_string();
                status.transition(&tx_id, TxStatus::Failed, message.clone());
                tracing::warn!(tx_id, "gateway submission timed out");
            }
        }
    }
}

async fn submit_to_gateway(
    config: &Config,
    job: &PurchaseJob,
) -> crate::error::Result<SubmitPurchaseReply> {
    let addr = format!("{}:{}", config.gateway_host, config.gateway_port);
    let mut stream = TcpStream::connect(&addr).await?;

    let request = SubmitPurchaseRequest {
        action: "submit_purchase",
        body: SubmitPurchaseBody {
            buyer: job.buyer.clone(),
            seller: job.seller.clone(),
            asset_id: job.asset_id.clone(),
            asset_name: job.asset_name.clone(),
            price: job.amount,
            timestamp: job.timestamp.clone(),
            tx_id: job.tx_id.clone(),
        },
    };
    write_framed(&mut stream, &serde_json::to_vec(&request)?).await?;
    let response = crate::wire::read_framed(&mut stream).await?;
    Ok(serde_json::from_slice(&response)?)
}
