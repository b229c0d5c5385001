// crates/forkwatch-daemon/src/main.rs
//
// Binary entrypoint for the upgrade-vote monitoring daemon.
//
// Initializes tracing, parses CLI arguments, loads configuration,
// connects the chain-data source, and runs the poll/analyze/publish
// loop until shutdown.

mod config;
mod updater;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use config::DaemonConfig;

use forkwatch_analysis::SnapshotHandle;
use forkwatch_chain::{watch_best_blocks, RpcClient, RpcConfig, StubChain};
use forkwatch_core::{ChainData, ChainParams, Network};

/// Upgrade-vote monitor: tracks block and stake version adoption and
/// agenda voting on a running chain.
#[derive(Parser, Debug)]
#[command(name = "forkwatch-daemon", version = "0.1.0", about = "Chain upgrade vote monitor")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.forkwatch/config.toml")]
    config: String,

    /// Network to monitor: mainnet or testnet.
    #[arg(long)]
    network: Option<String>,

    /// Use the built-in deterministic chain instead of a node.
    #[arg(long)]
    stub: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber for structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found.
    let mut daemon_config = match DaemonConfig::load(&expand_tilde(&args.config)) {
        Ok(cfg) => {
            tracing::info!("Loaded configuration from {}", args.config);
            cfg
        }
        Err(e) => {
            tracing::warn!(
                "Could not load config from {}: {}. Using defaults.",
                args.config,
                e
            );
            DaemonConfig::default()
        }
    };

    // CLI flags override the config file values.
    if let Some(network) = args.network {
        daemon_config.network = network;
    }
    if args.stub {
        daemon_config.stub = true;
    }

    let network: Network = daemon_config.network.parse()?;
    let params = ChainParams::for_network(network);

    tracing::info!("Forkwatch daemon v0.1.0");
    tracing::info!("Network: {}", network);
    tracing::info!(
        "Block window: {} blocks, reject at {}",
        params.block_upgrade_window,
        params.block_reject_threshold
    );
    tracing::info!(
        "Stake interval: {} blocks from height {}",
        params.stake_version_interval,
        params.stake_validation_height
    );

    let client: Arc<dyn ChainData> = if daemon_config.stub {
        tracing::info!("Using built-in deterministic chain data");
        Arc::new(StubChain::demo(&params))
    } else {
        tracing::info!("Connecting to node at {}", daemon_config.rpc_url);
        Arc::new(RpcClient::new(RpcConfig {
            url: daemon_config.rpc_url.clone(),
            username: daemon_config.rpc_user.clone(),
            password: daemon_config.rpc_pass.clone(),
        }))
    };

    let handle = SnapshotHandle::new();
    let (height_tx, height_rx) = tokio::sync::mpsc::channel::<i64>(16);

    // Spawn the best-block poller; the update loop consumes its heights.
    let poller_client = client.clone();
    let poll_interval = Duration::from_secs(daemon_config.poll_secs);
    tokio::spawn(async move {
        watch_best_blocks(poller_client, poll_interval, height_tx).await;
    });

    updater::run_update_loop(client, params, handle, height_rx).await;

    tracing::info!("Forkwatch daemon shut down gracefully");
    Ok(())
}

/// Expand `~` at the start of a path to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{}", home.display(), &path[1..]);
        }
    }
    path.to_string()
}
