//! Handle to a live connection task.
//!
//! The service never touches sockets. Each accepted or dialed stream is owned
//! by a connection task; the service holds a `ConnectionHandle` that queues
//! outbound messages and can ask the task to shut down.

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::ConnectionId;
use crate::protocol::{ModuleMessage, PeerMessage};

/// Sending side of one connection.
pub struct ConnectionHandle<M> {
    id: ConnectionId,
    remote: String,
    outbound: mpsc::UnboundedSender<M>,
    shutdown: CancellationToken,
}

/// Handle to a peer connection.
pub type PeerLink = ConnectionHandle<PeerMessage>;

/// Handle to a local module connection.
pub type ModuleLink = ConnectionHandle<ModuleMessage>;

impl<M> ConnectionHandle<M> {
    /// Create a handle and the queue its connection task drains.
    pub fn new(id: ConnectionId, remote: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<M>) {
        Self::with_shutdown(id, remote, CancellationToken::new())
    }

    /// Like `new`, but the connection also closes when `parent` is cancelled.
    pub fn with_parent(
        id: ConnectionId,
        remote: impl Into<String>,
        parent: &CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<M>) {
        Self::with_shutdown(id, remote, parent.child_token())
    }

    fn with_shutdown(
        id: ConnectionId,
        remote: impl Into<String>,
        shutdown: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<M>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (
            Self {
                id,
                remote: remote.into(),
                outbound,
                shutdown,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Remote socket address, `host:port`.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Queue a message. Returns false once the connection is gone.
    pub fn send(&self, message: M) -> bool {
        !self.shutdown.is_cancelled() && self.outbound.send(message).is_ok()
    }

    /// Ask the connection task to flush queued messages and close.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.outbound.is_closed()
    }

    /// Resolves once `close` has been called.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

impl<M> Clone for ConnectionHandle<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            remote: self.remote.clone(),
            outbound: self.outbound.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<M> fmt::Debug for ConnectionHandle<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("remote", &self.remote)
            .field("closed", &self.is_closed())
            .finish()
    }
}
