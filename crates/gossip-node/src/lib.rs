//! # Gossip Node
//!
//! Runtime around one `OverlayService`:
//!
//! - binds the peer listener and the local-module listener,
//! - runs the periodic maintenance, counter reset and blocklist cleanup,
//! - closes every connection on shutdown.
//!
//! A listener that fails to bind is logged and skipped; the rest of the node
//! keeps running.

pub mod scheduler;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use gossip_crypto::{sha256, Ed25519KeyPair};
use gossip_overlay::{
    ConfigError, ConfigProvider, ModuleListener, OverlayApi, OverlayConfig, OverlayError,
    OverlayService, P2pTransport, StaticConfigProvider, SystemTimeSource, TomlConfigProvider,
};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub use scheduler::Scheduler;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Overlay error: {0}")]
    Overlay(#[from] OverlayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A running (or ready to run) overlay node.
pub struct GossipNode {
    service: Arc<OverlayService>,
    transport: P2pTransport,
    modules: ModuleListener,
    shutdown: CancellationToken,
    scheduler: Mutex<Scheduler>,
    p2p_address: Mutex<Option<SocketAddr>>,
    api_address: Mutex<Option<SocketAddr>>,
}

impl GossipNode {
    pub fn new(config: OverlayConfig, keypair: Ed25519KeyPair) -> Result<Self, NodeError> {
        let service = Arc::new(OverlayService::new(
            config,
            keypair,
            Arc::new(SystemTimeSource::new()),
        )?);
        let shutdown = CancellationToken::new();

        Ok(Self {
            transport: P2pTransport::new(Arc::clone(&service), shutdown.clone()),
            modules: ModuleListener::new(Arc::clone(&service), shutdown.clone()),
            service,
            shutdown,
            scheduler: Mutex::new(Scheduler::new()),
            p2p_address: Mutex::new(None),
            api_address: Mutex::new(None),
        })
    }

    /// Bind both listeners and start the timers.
    pub async fn start(&self) {
        let config = self.service.config();

        match TcpListener::bind(&config.p2p_address).await {
            Ok(listener) => {
                let bound = listener.local_addr().ok();
                if let Some(bound) = bound {
                    // An ephemeral port is only known after binding.
                    if requests_ephemeral_port(&config.p2p_address) {
                        self.service.set_advertised_address(bound.to_string());
                    }
                    info!(address = %bound, "Peer listener bound");
                }
                *self.p2p_address.lock() = bound;

                let transport = self.transport.clone();
                tokio::spawn(async move { transport.serve(listener).await });
            }
            Err(err) => {
                error!(address = %config.p2p_address, error = %err, "Failed to bind peer listener")
            }
        }

        match TcpListener::bind(&config.api_address).await {
            Ok(listener) => {
                let bound = listener.local_addr().ok();
                if let Some(bound) = bound {
                    info!(address = %bound, "Module listener bound");
                }
                *self.api_address.lock() = bound;

                let modules = self.modules.clone();
                tokio::spawn(async move { modules.serve(listener).await });
            }
            Err(err) => {
                error!(address = %config.api_address, error = %err, "Failed to bind module listener")
            }
        }

        self.restart_timers();
        info!(
            public_key = %short_key(&self.service.public_key_pem()),
            degree = config.degree,
            bootstrapper = config.bootstrapper.as_deref().unwrap_or("-"),
            "Gossip node started"
        );
    }

    /// Swap in a new configuration and restart the timers with its periods.
    pub fn reconfigure(&self, config: OverlayConfig) -> Result<(), NodeError> {
        self.service.replace_config(config)?;
        self.restart_timers();
        Ok(())
    }

    /// Stop the timers, the listeners and every open connection.
    pub fn shutdown(&self) {
        self.scheduler.lock().stop();
        self.shutdown.cancel();
        info!("Gossip node stopped");
    }

    pub fn service(&self) -> Arc<OverlayService> {
        Arc::clone(&self.service)
    }

    /// Address the peer listener is bound to, once started.
    pub fn p2p_address(&self) -> Option<SocketAddr> {
        *self.p2p_address.lock()
    }

    /// Address the module listener is bound to, once started.
    pub fn api_address(&self) -> Option<SocketAddr> {
        *self.api_address.lock()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled() && self.scheduler.lock().is_running()
    }

    fn restart_timers(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        let config = self.service.config();
        self.scheduler.lock().start(
            &config,
            Arc::clone(&self.service),
            self.transport.clone(),
        );
    }
}

impl Drop for GossipNode {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// The TOML file at `path`, or the defaults when there is no such file.
pub fn config_provider(path: &Path) -> Result<Box<dyn ConfigProvider>, ConfigError> {
    if path.exists() {
        Ok(Box::new(TomlConfigProvider::load(path)?))
    } else {
        Ok(Box::new(StaticConfigProvider::default()))
    }
}

fn requests_ephemeral_port(address: &str) -> bool {
    address
        .parse::<SocketAddr>()
        .map(|addr| addr.port() == 0)
        .unwrap_or(false)
}

/// Short fingerprint of a PEM key, for log lines.
fn short_key(pem: &str) -> String {
    hex::encode(&sha256(pem.as_bytes())[..8])
}
