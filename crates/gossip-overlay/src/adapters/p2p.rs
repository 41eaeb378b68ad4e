//! Peer listener and dialer.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::connection::{accept_loop, drive};
use crate::connection::PeerLink;
use crate::domain::{ConnectionId, OverlayError};
use crate::protocol::PeerCodec;
use crate::service::{LinkRole, OverlayService};

/// TCP transport for the peer channel.
#[derive(Clone)]
pub struct P2pTransport {
    service: Arc<OverlayService>,
    shutdown: CancellationToken,
}

impl P2pTransport {
    /// Connections opened through this transport close when `shutdown` fires.
    pub fn new(service: Arc<OverlayService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }

    /// Accept peers on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) {
        let transport = self.clone();
        accept_loop(listener, self.shutdown.clone(), move |stream, remote| {
            let transport = transport.clone();
            async move {
                debug!(peer = %remote, "Peer connection accepted");
                transport
                    .run(stream, remote.to_string(), LinkRole::Responder)
                    .await;
            }
        })
        .await;
    }

    /// Dial `address` and start enrolling with it.
    ///
    /// Returns once the TCP connection is up; the handshake continues in the
    /// background.
    pub async fn connect(&self, address: &str) -> Result<(), OverlayError> {
        self.service.begin_connect(address)?;

        let stream = match TcpStream::connect(address).await {
            Ok(stream) => stream,
            Err(err) => {
                self.service.connect_failed(address, &err.to_string());
                return Err(OverlayError::ConnectFailed {
                    address: address.to_string(),
                    reason: err.to_string(),
                });
            }
        };
        let remote = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| address.to_string());
        info!(peer = %address, "Connected, awaiting challenge");

        let transport = self.clone();
        let role = LinkRole::Initiator {
            dialed: address.to_string(),
        };
        tokio::spawn(async move { transport.run(stream, remote, role).await });
        Ok(())
    }

    /// Run one maintenance round: dial every planned address in the
    /// background. Returns how many dials were started.
    pub fn maintain(&self) -> usize {
        let planned = self.service.maintain();
        for address in &planned {
            let transport = self.clone();
            let address = address.clone();
            tokio::spawn(async move {
                if let Err(err) = transport.connect(&address).await {
                    debug!(peer = %address, error = %err, "Dial skipped");
                }
            });
        }
        planned.len()
    }

    async fn run(&self, stream: TcpStream, remote: String, role: LinkRole) {
        let (link, outbound) = PeerLink::with_parent(ConnectionId::new(), remote, &self.shutdown);
        self.service.on_peer_connected(link.clone(), role);

        let service = Arc::clone(&self.service);
        let handler_link = link.clone();
        drive(stream, PeerCodec::new(), link.clone(), outbound, move |message| {
            service.handle_peer_message(&handler_link, message)
        })
        .await;

        self.service.on_peer_disconnected(link.id());
    }
}
