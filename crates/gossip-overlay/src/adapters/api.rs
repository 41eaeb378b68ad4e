//! Local module listener.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use super::connection::{accept_loop, drive};
use crate::connection::ModuleLink;
use crate::domain::ConnectionId;
use crate::protocol::ModuleCodec;
use crate::service::OverlayService;

/// TCP listener for local modules.
#[derive(Clone)]
pub struct ModuleListener {
    service: Arc<OverlayService>,
    shutdown: CancellationToken,
}

impl ModuleListener {
    pub fn new(service: Arc<OverlayService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }

    /// Accept modules on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) {
        let this = self.clone();
        accept_loop(listener, self.shutdown.clone(), move |stream, remote| {
            let this = this.clone();
            async move { this.run(stream, remote.to_string()).await }
        })
        .await;
    }

    async fn run(&self, stream: TcpStream, remote: String) {
        let (link, outbound) =
            ModuleLink::with_parent(ConnectionId::new(), remote, &self.shutdown);
        self.service.on_module_connected(link.clone());

        let service = Arc::clone(&self.service);
        let handler_link = link.clone();
        drive(stream, ModuleCodec, link.clone(), outbound, move |message| {
            service.handle_module_message(&handler_link, message)
        })
        .await;

        self.service.on_module_disconnected(link.id());
    }
}
