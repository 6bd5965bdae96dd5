//! App-server orchestrator (SPEC_FULL.md §4.6 / C6): wires the TLS client
//! protocol, the submission queue/worker, the timeout monitor, and the
//! confirmation consumer around the shared wallet store and tx status map.

use std::path::Path;
use std::sync::Arc;

use forge_core::config::Config;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_rustls::TlsAcceptor;

use forge_wallet_store::WalletStore;

use crate::error::Result;
use crate::pipeline::{self, PurchaseJob};
use crate::protocol::{self, Command};
use crate::status::{StatusMap, TxStatus};
use crate::wire::{read_framed, write_framed};
use crate::{confirm_listener, tls};

const SUBMISSION_QUEUE_CAPACITY: usize = 256;

pub struct AppServer {
    config: Config,
    wallet: Arc<Mutex<WalletStore>>,
    status: Arc<StatusMap>,
    submission_tx: mpsc::Sender<PurchaseJob>,
    submission_rx: Mutex<Option<mpsc::Receiver<PurchaseJob>>>,
    acceptor: TlsAcceptor,
}

impl AppServer {
    pub fn bootstrap(config: Config) -> Result<Arc<Self>> {
        let wallet = WalletStore::open(Path::new(&config.wallet_db_path))?;
        let tls_dir = Path::new(&config.key_dir).join("tls");
        let acceptor = tls::build_acceptor(&tls_dir, &config.appserver_tls_host)?;
        let (submission_tx, submission_rx) = mpsc::channel(SUBMISSION_QUEUE_CAPACITY);

        Ok(Arc::new(Self {
            config,
            wallet: Arc::new(Mutex::new(wallet)),
            status: Arc::new(StatusMap::new()),
            submission_tx,
            submission_rx: Mutex::new(Some(submission_rx)),
            acceptor,
        }))
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let submission_rx = self
            .submission_rx
            .lock()
            .await
            .take()
            .expect("run() called more than once");

        let worker_status = Arc::clone(&self.status);
        let worker_config = self.config.clone();
        tokio::spawn(pipeline::run_submission_worker(submission_rx, worker_status, worker_config));

        let monitor_status = Arc::clone(&self.status);
        let monitor_config = self.config.clone();
        tokio::spawn(run_timeout_monitor(monitor_config, monitor_status));

        let confirm_config = self.config.clone();
        let confirm_wallet = Arc::clone(&self.wallet);
        let confirm_status = Arc::clone(&self.status);
        tokio::spawn(async move {
            if let Err(e) = confirm_listener::run(confirm_config, confirm_wallet, confirm_status).await {
                tracing::error!(error = %e, "confirmation listener exited");
            }
        });

        self.run_client_listener().await
    }

    async fn run_client_listener(self: &Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.appserver_tls_host, self.config.appserver_tls_port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "app server TLS listener bound");

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let server = Arc::clone(self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_client(stream).await {
                    tracing::warn!(%peer_addr, error = %e, "client session error");
                }
            });
        }
    }

    async fn handle_client(&self, stream: TcpStream) -> Result<()> {
        let mut tls_stream = self.acceptor.accept(stream).await?;
        loop {
            let frame = match read_framed(&mut tls_stream).await {
                Ok(frame) => frame,
                Err(_) => return Ok(()),
            };
            let line = String::from_utf8_lossy(&frame);
            let reply = self.dispatch(&line).await;
            write_framed(&mut tls_stream, reply.as_bytes()).await?;
        }
    }

    async fn dispatch(&self, line: &str) -> String {
        match protocol::parse(line) {
            Command::Buy {
                asset_id,
                username,
                amount,
            } => {
                pipeline::handle_buy(
                    &self.wallet,
                    &self.status,
                    &self.submission_tx,
                    &asset_id,
                    &username,
                    amount,
                )
                .await
            }
            Command::GetTxStatus { tx_id } => match self.status.get(&tx_id) {
                Some(record) => protocol::ok_status(status_label(record.status), &record.message),
                None => protocol::err_reply("NOT_FOUND", "Unknown tx_id"),
            },
            Command::Unknown(raw) => protocol::err_reply("UNKNOWN_COMMAND", &raw),
        }
    }
}

fn status_label(status: TxStatus) -> &'static str {
    match status {
        TxStatus::Queued => "QUEUED",
        TxStatus::Submitted => "SUBMITTED",
        TxStatus::Confirmed => "CONFIRMED",
        TxStatus::Failed => "FAILED",
        TxStatus::Timeout => "TIMEOUT",
    }
}

/// Wakes every `config.timeout_monitor_interval()` and transitions any
/// record unresolved past `config.purchase_timeout()` to `timeout` (§4.6).
async fn run_timeout_monitor(config: Config, status: Arc<StatusMap>) {
    let mut ticker = tokio::time::interval(config.timeout_monitor_interval());
    loop {
        ticker.tick().await;
        let stale = status.scan_unresolved_older_than(config.purchase_timeout_secs as i64);
        for tx_id in stale {
            if status.transition(&tx_id, TxStatus::Timeout, "PoW Timeout after 10 mins") {
                if status.mark_notified(&tx_id) {
                    tracing::info!(tx_id, "purchase timed out");
                }
            }
        }
    }
}
