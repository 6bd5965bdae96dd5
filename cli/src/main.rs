//! `forge` — one binary, one subcommand per long-running service (SPEC_FULL.md
//! §4.8/§9): `node`, `gateway`, `appserver`. No multi-process launcher; an
//! operator's own process supervisor starts each subcommand as its own
//! process, matching the explicit Non-goal against in-process multi-window
//! spawning.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use forge_appserver::AppServer;
use forge_core::config::Config;
use forge_gateway::Gateway;
use forge_node::Node;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "forge", about = "PoW marketplace chain services", version)]
struct Cli {
    /// Path to a TOML config file; falls back to the bundled dev topology if absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a PoW node listener on the given port.
    Node {
        #[arg(long)]
        port: u16,
    },
    /// Run the gateway fan-out/fan-in service.
    Gateway,
    /// Run the app server's BUY/GET_TX_STATUS pipeline.
    Appserver,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path).context("loading config file")?,
        None => Config::default(),
    };
    install_tracing(&config);

    match cli.command {
        Command::Node { port } => run_node(config, port).await,
        Command::Gateway => run_gateway(config).await,
        Command::Appserver => run_appserver(config).await,
    }
}

fn install_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.tracing_default_filter.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_node(config: Config, port: u16) -> anyhow::Result<()> {
    let node = Node::bootstrap(config, port)
        .await
        .context("bootstrapping node")?;
    node.run().await.context("node listener exited")
}

async fn run_gateway(config: Config) -> anyhow::Result<()> {
    let gateway = Gateway::bootstrap(config).context("bootstrapping gateway")?;
    gateway.run().await.context("gateway listener exited")
}

async fn run_appserver(config: Config) -> anyhow::Result<()> {
    let appserver = AppServer::bootstrap(config).context("bootstrapping app server")?;
    appserver.run().await.context("app server exited")
}
