//! One cluster member: binds its listening endpoint, runs the protocol
//! engine actor, and serves the accept loop until killed.

use clap::Parser;
use ledger_mutex::{
    config::ClusterConfig,
    ledger::Ledger,
    protocol::Engine,
    transport::{self, TcpNet},
};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
struct Args {
    /// This peer's id, matching a key in the cluster config (e.g. "A").
    #[arg(long)]
    id: String,

    /// Path to a JSON cluster config. Defaults to the built-in A/B/C@10
    /// deployment when omitted.
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => ClusterConfig::load(path)?,
        None => ClusterConfig::reference(),
    };
    let addr = config
        .addr_of(&args.id)
        .ok_or_else(|| anyhow::anyhow!("peer id {:?} not present in cluster config", args.id))?;
    let others = config.other_peers(&args.id);
    let ledger = Ledger::new(config.initial_balances.clone());
    let net = TcpNet::new(config.peers.clone());

    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = Engine::new(args.id.clone(), others, ledger, net);
    let engine_task = tokio::spawn(engine.run(events_rx));

    let listener = TcpListener::bind(addr).await?;
    info!(peer = %args.id, %addr, "listening");
    let accept_task = tokio::spawn(transport::accept_loop(listener, events_tx));

    tokio::select! {
        result = engine_task => {
            result??;
            anyhow::bail!("protocol engine exited unexpectedly")
        }
        result = accept_task => {
            result??;
            anyhow::bail!("accept loop exited unexpectedly")
        }
    }
}
