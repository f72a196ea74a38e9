//! CLI argument handling and process wiring.

use anyhow::Context;
use clap::Parser;
use hub_voter_relayer::{
    client::{
        HubRpcClient,
        SideRpcClient,
        Signer,
    },
    storage::SledCheckpoint,
    Config,
    RelayerHandle,
};
use std::path::PathBuf;
use tracing_subscriber::{
    filter::EnvFilter,
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Command-line options of the voter.
#[derive(Parser, Debug)]
#[clap(name = "hub-voter", about = "Relays side-chain deposits to the hub chain", version)]
pub struct Opt {
    /// Path to the JSON configuration file.
    #[clap(long = "config", default_value = "./config.json", env = "VOTER_CONFIG")]
    pub config: PathBuf,

    /// Replace the persisted relay height for this run. Zero means
    /// "resume from the persisted checkpoint".
    #[clap(long = "relay-height", default_value = "0")]
    pub relay_height: u64,
}

pub(crate) fn init_logging() {
    let filter = match std::env::var_os("RUST_LOG") {
        Some(_) => EnvFilter::try_from_default_env().expect("invalid `RUST_LOG` provided"),
        None => EnvFilter::new("info"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}

/// Load and parse the configuration file, applying the command-line
/// relay-height override.
pub fn load_config(opt: &Opt) -> anyhow::Result<Config> {
    let raw = std::fs::read_to_string(&opt.config)
        .with_context(|| format!("failed to read config file {}", opt.config.display()))?;
    let mut config: Config = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config file {}", opt.config.display()))?;
    if opt.relay_height > 0 {
        config.force_relay_height = opt.relay_height;
    }
    Ok(config)
}

/// Run the voter until interrupted.
pub async fn run_cli() -> anyhow::Result<()> {
    init_logging();
    let opt = Opt::parse();
    let config = load_config(&opt)?;
    exec(config).await
}

async fn exec(config: Config) -> anyhow::Result<()> {
    let signer = Signer::from_file(&config.hub.wallet_file)?;
    tracing::info!(signer = %signer.public_hex(), "voter identity loaded");

    let store = SledCheckpoint::open(&config.checkpoint_path)
        .context("failed to open the checkpoint database")?;
    let hub = HubRpcClient::new(config.hub.endpoint.clone(), signer);
    let endpoints: Vec<_> = config
        .side
        .endpoints
        .iter()
        .map(|url| SideRpcClient::new(url.clone(), config.side.bridge_contract))
        .collect();

    let handle = RelayerHandle::start(endpoints, hub, store, config)?;
    tracing::info!("relayer started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    handle.shutdown().await
}
