//! # Gossip Node
//!
//! Entry point of the overlay node.
//!
//! ## Startup
//!
//! 1. Load `[gossip]` from `GOSSIP_CONFIG` (default `./gossip.toml`), falling
//!    back to defaults when the file does not exist
//! 2. Apply `GOSSIP_*` environment overrides
//! 3. Install the log subscriber (`RUST_LOG` wins over `debug`)
//! 4. Load the host key, or generate an ephemeral one
//! 5. Bind listeners, start timers, wait for Ctrl+C

use std::path::Path;

use anyhow::{Context, Result};
use gossip_crypto::Ed25519KeyPair;
use gossip_node::{config_provider, GossipNode};
use gossip_overlay::OverlayConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const DEFAULT_CONFIG_PATH: &str = "gossip.toml";

fn load_config() -> Result<OverlayConfig> {
    let path = std::env::var("GOSSIP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = config_provider(Path::new(&path))
        .and_then(|provider| provider.overlay_config())
        .with_context(|| format!("Failed to load configuration from {path}"))?;

    if let Ok(address) = std::env::var("GOSSIP_P2P_ADDRESS") {
        config.p2p_address = address;
    }
    if let Ok(address) = std::env::var("GOSSIP_API_ADDRESS") {
        config.api_address = address;
    }
    if let Ok(address) = std::env::var("GOSSIP_BOOTSTRAPPER") {
        config.bootstrapper = (!address.is_empty()).then_some(address);
    }
    if let Ok(degree) = std::env::var("GOSSIP_DEGREE") {
        if let Ok(d) = degree.parse() {
            config.degree = d;
        }
    }
    if let Ok(debug) = std::env::var("GOSSIP_DEBUG") {
        if let Ok(d) = debug.parse() {
            config.debug = d;
        }
    }

    // Overrides may have broken what the file validated.
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn load_keypair(config: &OverlayConfig) -> Result<Ed25519KeyPair> {
    match &config.hostkey {
        Some(path) => {
            let pem = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read host key {}", path.display()))?;
            Ed25519KeyPair::from_pkcs8_pem(&pem)
                .with_context(|| format!("Invalid host key {}", path.display()))
        }
        None => {
            warn!("No hostkey configured, using an ephemeral identity");
            Ok(Ed25519KeyPair::generate())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;

    // Initialize logging
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let keypair = load_keypair(&config)?;
    let node = GossipNode::new(config, keypair).context("Failed to create node")?;
    node.start().await;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    node.shutdown();
    Ok(())
}
