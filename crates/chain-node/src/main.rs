use anyhow::Result;
use chain_node::{App, NodeConfig};
use std::rc::Rc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Wiring a real Tendermint/ABCI socket server is out of scope here; this
/// binary exists to exercise `App` against an in-memory store the way the
/// adapter is meant to be driven, not to speak the wire protocol itself.
#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("===========================================");
    info!("  chain-node consensus adapter");
    info!("===========================================");

    let kv = Rc::new(chain_kv::MemoryKv::new());
    let mut app = App::new(kv, NodeConfig::default());

    app.begin(1, chain_crypto::EMPTY_HASH, 0)?;
    let block_hash = app.commit()?;
    info!(hash = %hex::encode(block_hash), "sealed genesis successor block");

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down gracefully...");

    Ok(())
}
