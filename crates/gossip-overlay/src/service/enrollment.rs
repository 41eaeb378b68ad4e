//! Challenge/response enrollment on both sides of a peer connection.

use std::sync::Arc;

use gossip_crypto::Ed25519PublicKey;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::connection::PeerLink;
use crate::domain::{
    solve, AdmissionError, EnrollmentChallenge, Hardness, NeighbourInfo, OverlayError, Peer,
    PeerIdentity, RegistrationRecord,
};
use crate::protocol::p2p::challenge_type_of;
use crate::protocol::{
    EnrollChallenge, EnrollFailure, EnrollInit, EnrollRegister, EnrollSuccess, Neighbour,
    PeerMessage,
};
use crate::service::core::{LinkPhase, LinkRole, PendingChallenge};
use crate::service::OverlayService;

impl OverlayService {
    /// Issue a fresh challenge on `link` and arm its enrollment timeout.
    ///
    /// Hardness grows with the blocklist; an unsatisfiable value is refused.
    pub(crate) fn issue_challenge(self: &Arc<Self>, link: &PeerLink) -> Result<(), OverlayError> {
        let base = self.config.read().enroll_hardness;
        let blocked = self.block_list.lock().len();
        let hardness = Hardness::for_block_list(base, blocked)?;

        let challenge = EnrollmentChallenge::issue(hardness, self.now());
        let message = PeerMessage::EnrollChallenge(EnrollChallenge::new(
            &challenge,
            &self.public_key_pem,
        ));
        let timeout = self.arm_enroll_timeout(link.clone());
        if let Some(previous) = self
            .challenges
            .lock()
            .insert(link.id(), PendingChallenge { challenge, timeout })
        {
            previous.timeout.abort();
        }

        debug!(peer = %link.remote(), hardness = hardness.get(), "Challenge issued");
        link.send(message);
        Ok(())
    }

    fn arm_enroll_timeout(self: &Arc<Self>, link: PeerLink) -> AbortHandle {
        let service = Arc::downgrade(self);
        let timeout = self.config.read().enroll_timeout();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(service) = service.upgrade() else {
                return;
            };
            if service.challenges.lock().remove(&link.id()).is_some() {
                warn!(peer = %link.remote(), "Enrollment timed out");
                link.send(PeerMessage::failure("Enrollment timed out"));
                link.close();
            }
        })
        .abort_handle()
    }

    /// Responder: resend the challenge in flight, or issue one.
    pub(crate) fn on_enroll_init(
        self: &Arc<Self>,
        link: &PeerLink,
        init: EnrollInit,
    ) -> Result<(), OverlayError> {
        match self.link_role_and_phase(link.id()) {
            Some((LinkRole::Responder, LinkPhase::AwaitingRegistration)) => {}
            _ => return Err(OverlayError::UnexpectedMessage("ENROLL_INIT")),
        }
        debug!(peer = %link.remote(), key_len = init.public_key.len(), "Enrollment requested");

        let pending = self
            .challenges
            .lock()
            .get(&link.id())
            .map(|pending| EnrollChallenge::new(&pending.challenge, &self.public_key_pem));
        match pending {
            Some(message) => {
                link.send(PeerMessage::EnrollChallenge(message));
                Ok(())
            }
            None => self.issue_challenge(link).inspect_err(|err| {
                link.send(PeerMessage::failure(err.to_string()));
            }),
        }
    }

    /// Initiator: solve the challenge off the async workers, then register.
    pub(crate) fn on_challenge(
        self: &Arc<Self>,
        link: &PeerLink,
        message: EnrollChallenge,
    ) -> Result<(), OverlayError> {
        match self.link_role_and_phase(link.id()) {
            Some((LinkRole::Initiator { .. }, LinkPhase::AwaitingChallenge)) => {}
            Some((LinkRole::Initiator { .. }, phase)) => {
                debug!(peer = %link.remote(), ?phase, "Ignoring repeated challenge");
                return Ok(());
            }
            _ => return Err(OverlayError::UnexpectedMessage("ENROLL_CHALLENGE")),
        }

        challenge_type_of(&message)?;
        let hardness = Hardness::new(u32::from(message.challenge_hardness))?;
        let challenge = message.challenge_bytes()?;
        self.set_phase(link.id(), LinkPhase::Solving);

        let (server_address, max_attempts) = {
            let config = self.config.read();
            (config.p2p_address.clone(), config.pow_max_attempts)
        };
        let public_key = self.public_key_pem.clone();
        let service = Arc::clone(self);
        let link = link.clone();
        debug!(peer = %link.remote(), hardness = hardness.get(), "Solving challenge");

        tokio::spawn(async move {
            let solved = tokio::task::spawn_blocking(move || {
                solve(
                    &challenge,
                    hardness,
                    &public_key,
                    &server_address,
                    max_attempts,
                )
            })
            .await;
            match solved {
                Ok(result) => service.on_challenge_solved(&link, result),
                Err(err) => {
                    warn!(peer = %link.remote(), error = %err, "Challenge solver aborted");
                    link.close();
                }
            }
        });
        Ok(())
    }

    fn on_challenge_solved(
        &self,
        link: &PeerLink,
        result: Result<RegistrationRecord, AdmissionError>,
    ) {
        if link.is_closed() {
            return;
        }
        match result {
            Ok(record) => {
                self.set_phase(link.id(), LinkPhase::AwaitingVerdict);
                link.send(PeerMessage::EnrollRegister(EnrollRegister::from_record(
                    &record,
                )));
                debug!(peer = %link.remote(), "Registration sent");
            }
            Err(err) => {
                warn!(peer = %link.remote(), error = %err, "Giving up on challenge");
                link.close();
            }
        }
    }

    /// Responder: check the registration and promote the peer.
    pub(crate) fn on_register(
        &self,
        link: &PeerLink,
        register: EnrollRegister,
    ) -> Result<(), OverlayError> {
        match self.link_role_and_phase(link.id()) {
            Some((LinkRole::Responder, LinkPhase::AwaitingRegistration)) => {}
            _ => return Err(OverlayError::UnexpectedMessage("ENROLL_REGISTER")),
        }
        let record = register.to_record()?;

        match self.admit(link, &record) {
            Ok(neighbours) => {
                info!(
                    peer = %record.server_address,
                    shared = neighbours.len(),
                    "Peer enrolled"
                );
                link.send(PeerMessage::EnrollSuccess(EnrollSuccess {
                    public_key: self.public_key_pem.clone(),
                    neighbours: neighbours.into_iter().map(Neighbour::from).collect(),
                }));
                Ok(())
            }
            Err(err) => {
                link.send(PeerMessage::failure(err.to_string()));
                Err(err.into())
            }
        }
    }

    /// Verify `record` against the challenge issued on `link` and insert the
    /// peer. Returns the neighbours to share with it.
    fn admit(
        &self,
        link: &PeerLink,
        record: &RegistrationRecord,
    ) -> Result<Vec<NeighbourInfo>, AdmissionError> {
        let pending = self
            .challenges
            .lock()
            .remove(&link.id())
            .ok_or(AdmissionError::NoPendingChallenge)?;
        pending.timeout.abort();
        pending.challenge.verify(record)?;

        if record.public_key == self.public_key_pem {
            return Err(AdmissionError::SelfEnrollment);
        }
        Ed25519PublicKey::from_pem(&record.public_key)
            .map_err(|_| AdmissionError::InvalidPublicKey)?;
        if self.block_list.lock().contains(&record.public_key) {
            return Err(AdmissionError::Blocked);
        }

        let max_share = self.config.read().max_neighbours_to_share;
        let neighbours = {
            let mut peers = self.peers.lock();
            if peers.contains_key(&record.public_key) {
                return Err(AdmissionError::AlreadyConnected);
            }
            let share = (peers.len() / 2).min(max_share);
            let neighbours = peers.sample_neighbours(
                share,
                Some(&record.public_key),
                &mut rand::thread_rng(),
            );
            peers.insert(Peer {
                identity: PeerIdentity {
                    public_key: record.public_key.clone(),
                    network_address: link.remote().to_string(),
                },
                server_address: record.server_address.clone(),
                connection: link.id(),
            });

            let mut candidates = self.candidates.lock();
            candidates.remove(&record.server_address);
            candidates.remove_key(&record.public_key);
            neighbours
        };

        self.set_phase(
            link.id(),
            LinkPhase::Enrolled {
                public_key: record.public_key.clone(),
            },
        );
        Ok(neighbours)
    }

    /// Initiator: the responder accepted us.
    pub(crate) fn on_enroll_success(
        &self,
        link: &PeerLink,
        success: EnrollSuccess,
    ) -> Result<(), OverlayError> {
        let dialed = match self.link_role_and_phase(link.id()) {
            Some((LinkRole::Initiator { dialed }, LinkPhase::AwaitingVerdict)) => dialed,
            _ => return Err(OverlayError::UnexpectedMessage("ENROLL_SUCCESS")),
        };
        self.dialing.lock().remove(&dialed);

        if success.public_key == self.public_key_pem {
            self.candidates.lock().remove(&dialed);
            return Err(AdmissionError::SelfEnrollment.into());
        }
        Ed25519PublicKey::from_pem(&success.public_key)
            .map_err(|_| AdmissionError::InvalidPublicKey)?;

        {
            let mut peers = self.peers.lock();
            let inserted = peers.insert(Peer {
                identity: PeerIdentity {
                    public_key: success.public_key.clone(),
                    network_address: link.remote().to_string(),
                },
                server_address: dialed.clone(),
                connection: link.id(),
            });
            let mut candidates = self.candidates.lock();
            candidates.remove(&dialed);
            if !inserted {
                return Err(AdmissionError::AlreadyConnected.into());
            }
            candidates.remove_key(&success.public_key);
        }

        self.set_phase(
            link.id(),
            LinkPhase::Enrolled {
                public_key: success.public_key,
            },
        );
        let learned = self.learn_neighbours(&success.neighbours);
        info!(peer = %dialed, learned, "Enrolled with peer");
        Ok(())
    }

    /// Initiator: the responder refused us. Always ends the connection.
    pub(crate) fn on_enroll_failure(
        &self,
        link: &PeerLink,
        failure: EnrollFailure,
    ) -> Result<(), OverlayError> {
        if let Some((LinkRole::Initiator { dialed }, _)) = self.link_role_and_phase(link.id()) {
            self.dialing.lock().remove(&dialed);
            self.candidates.lock().remove(&dialed);
        }
        Err(AdmissionError::Refused(failure.error_message).into())
    }
}
