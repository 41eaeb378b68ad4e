use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::connection::PeerLink;
use crate::domain::{ConnectionId, OverlayError};
use crate::protocol::PeerMessage;
use crate::service::core::{LinkPhase, LinkRole, LinkState};
use crate::service::OverlayService;

impl OverlayService {
    /// Register a freshly established peer connection.
    ///
    /// The responder side opens the handshake by issuing a challenge; the
    /// initiator waits for it.
    pub fn on_peer_connected(self: &Arc<Self>, link: PeerLink, role: LinkRole) {
        let phase = match role {
            LinkRole::Responder => LinkPhase::AwaitingRegistration,
            LinkRole::Initiator { .. } => LinkPhase::AwaitingChallenge,
        };
        debug!(peer = %link.remote(), connection = %link.id(), ?role, "Peer connection opened");
        self.links.lock().insert(
            link.id(),
            LinkState {
                link: link.clone(),
                role: role.clone(),
                phase,
            },
        );

        if role == LinkRole::Responder {
            if let Err(err) = self.issue_challenge(&link) {
                warn!(peer = %link.remote(), error = %err, "Cannot issue enrollment challenge");
                link.send(PeerMessage::failure(err.to_string()));
                link.close();
            }
        }
    }

    /// Forget everything tied to a closed peer connection.
    pub fn on_peer_disconnected(&self, id: ConnectionId) {
        let state = self.links.lock().remove(&id);
        let peer = self.peers.lock().remove_by_connection(id);
        if let Some(pending) = self.challenges.lock().remove(&id) {
            pending.timeout.abort();
        }
        if let Some(LinkState {
            role: LinkRole::Initiator { dialed },
            ..
        }) = &state
        {
            self.dialing.lock().remove(dialed);
        }

        match peer {
            Some(peer) => info!(
                peer = %peer.server_address,
                connection = %id,
                "Peer disconnected"
            ),
            None => debug!(connection = %id, "Unenrolled connection closed"),
        }
    }

    /// Dispatch one decoded peer document.
    ///
    /// Errors for which [`OverlayError::closes_connection`] holds must end the
    /// connection; the rest only drop the message.
    pub fn handle_peer_message(
        self: &Arc<Self>,
        link: &PeerLink,
        message: PeerMessage,
    ) -> Result<(), OverlayError> {
        debug!(peer = %link.remote(), message = message.name(), "Peer message received");
        match message {
            PeerMessage::EnrollInit(init) => self.on_enroll_init(link, init),
            PeerMessage::EnrollChallenge(challenge) => self.on_challenge(link, challenge),
            PeerMessage::EnrollRegister(register) => self.on_register(link, register),
            PeerMessage::EnrollSuccess(success) => self.on_enroll_success(link, success),
            PeerMessage::EnrollFailure(failure) => self.on_enroll_failure(link, failure),
            PeerMessage::Broadcast(record) => self.on_remote_broadcast(link, record).map(|_| ()),
        }
    }
}
