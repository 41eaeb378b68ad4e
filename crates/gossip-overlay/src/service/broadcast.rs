//! Epidemic dissemination with loop suppression.
//!
//! Every hop wraps the envelope it received in its own signed layer and
//! appends its key to `key_list`, so the message id (hash of the original
//! payload) stays stable while the envelope grows.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gossip_crypto::{message_id, unwrap_with_key_list, wrap_layer, CryptoError, Ed25519PublicKey};
use tracing::{debug, warn};

use crate::connection::PeerLink;
use crate::domain::{
    CachedMessage, ConnectionId, DataTypeId, OverlayError, RelayState, Timestamp,
};
use crate::protocol::p2p::{MAX_FRAME_LEN, MAX_MESSAGE_LEN};
use crate::protocol::{GossipBroadcast, PeerMessage};
use crate::service::OverlayService;

/// What became of a message handed to the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// Sent to this many peers.
    Forwarded(usize),
    /// Held until a local subscriber validates it.
    AwaitingValidation,
    /// Cached and delivered, but its hop budget is spent.
    HopLimitReached,
    /// Already forwarded or rejected earlier.
    AlreadyHandled,
    /// Evicted from the cache or never seen.
    NotCached,
    /// A local subscriber rejected it.
    Rejected,
    /// Our layer would push it past the frame limit; dropped.
    Oversized,
}

impl OverlayService {
    /// Local origin: disseminate `payload` under `data_type`.
    ///
    /// Other local subscribers of the type are notified, `origin` excluded.
    /// Returns the message id, or [`OverlayError::Duplicate`] if the same
    /// payload was seen before.
    pub fn announce(
        &self,
        data_type: DataTypeId,
        payload: Vec<u8>,
        origin: Option<ConnectionId>,
    ) -> Result<String, OverlayError> {
        let message_id = message_id(&payload);
        let ttl = self.config.read().default_ttl;
        let message = CachedMessage {
            message_id: message_id.clone(),
            data_type,
            payload: payload.clone(),
            envelope: payload,
            key_list: Vec::new(),
            ttl,
            state: RelayState::Received,
        };

        let outcome = self.broadcast(message.clone())?;
        let delivered = self.deliver_notification(&message_id, data_type, &message.payload, origin);
        debug!(%message_id, data_type, delivered, ?outcome, "Announced");
        Ok(message_id)
    }

    /// Cache `message` and forward it. Idempotent per message id.
    pub fn broadcast(&self, message: CachedMessage) -> Result<RelayOutcome, OverlayError> {
        let message_id = message.message_id.clone();
        if !self.cache.lock().insert(message) {
            return Err(OverlayError::Duplicate);
        }
        self.forward(&message_id)
    }

    /// Sign and send a cached message to every peer, at most once.
    pub(crate) fn forward(&self, message_id: &str) -> Result<RelayOutcome, OverlayError> {
        let message = {
            let mut cache = self.cache.lock();
            if !cache.is_forwardable(message_id) {
                return Ok(if cache.contains(message_id) {
                    RelayOutcome::AlreadyHandled
                } else {
                    RelayOutcome::NotCached
                });
            }
            cache.set_state(message_id, RelayState::Forwarded);
            cache.get(message_id).cloned()
        };
        let Some(message) = message else {
            return Ok(RelayOutcome::NotCached);
        };

        // Zero means unlimited; one means this hop was the last.
        let ttl = match message.ttl {
            0 => 0,
            1 => return Ok(RelayOutcome::HopLimitReached),
            ttl => ttl - 1,
        };

        let envelope = wrap_layer(&message.envelope, &self.keypair)?;
        let mut key_list = message.key_list;
        key_list.push(self.public_key_pem.clone());

        let record = PeerMessage::Broadcast(GossipBroadcast {
            data_type_id: message.data_type,
            message_id: message.message_id,
            message: STANDARD.encode(envelope),
            key_list,
            ttl,
        });
        let size = record.encode()?.len();
        if size > MAX_FRAME_LEN {
            warn!(message_id, size, "Broadcast too large to relay");
            return Ok(RelayOutcome::Oversized);
        }
        Ok(RelayOutcome::Forwarded(self.send_to_peers(&record)))
    }

    /// Remote origin: authenticate, rate-check, dedup, deliver and relay.
    pub fn on_remote_broadcast(
        &self,
        link: &PeerLink,
        record: GossipBroadcast,
    ) -> Result<RelayOutcome, OverlayError> {
        let Some(sender) = self.enrolled_key(link.id()) else {
            return Err(OverlayError::UnexpectedMessage("BROADCAST"));
        };
        if record.key_list.is_empty() {
            return Err(OverlayError::EmptyKeyList);
        }
        let now = self.now();

        // The outermost layer is the sender's; nothing else in the chain is
        // attributable until it verifies.
        if record.key_list.last() != Some(&sender) {
            warn!(peer = %link.remote(), "Broadcast not signed by the sending peer");
            self.penalize(std::slice::from_ref(&sender), now);
            return Err(OverlayError::SenderMismatch);
        }
        if record.message.len() > MAX_MESSAGE_LEN {
            debug!(peer = %link.remote(), size = record.message.len(), "Broadcast too large");
            return Err(OverlayError::Oversized(record.message.len()));
        }

        let (envelope, payload) = match recover_payload(&record) {
            Ok(recovered) => recovered,
            Err(err) => {
                warn!(peer = %link.remote(), error = %err, "Broadcast failed authentication");
                self.penalize(std::slice::from_ref(&sender), now);
                return Err(err);
            }
        };

        let keys = record.key_list.iter().map(String::as_str);
        if self.counters.lock().record_and_check(keys.clone()) {
            warn!(peer = %link.remote(), message_id = %record.message_id, "Rate limit exceeded");
            self.penalize(&record.key_list, now);
            return Err(OverlayError::RateLimited);
        }
        if self.block_list.lock().any_blocked(keys) {
            return Err(OverlayError::Blocked);
        }

        let gated = !self
            .subscriptions
            .lock()
            .subscribers(record.data_type_id)
            .is_empty();
        let message_id = record.message_id;
        let message = CachedMessage {
            message_id: message_id.clone(),
            data_type: record.data_type_id,
            payload,
            envelope,
            key_list: record.key_list,
            ttl: record.ttl,
            state: if gated {
                RelayState::PendingValidation
            } else {
                RelayState::Received
            },
        };
        let data_type = message.data_type;
        let payload = message.payload.clone();
        if !self.cache.lock().insert(message) {
            return Err(OverlayError::Duplicate);
        }

        let delivered = self.deliver_notification(&message_id, data_type, &payload, None);
        debug!(%message_id, data_type, delivered, "Broadcast accepted");
        if delivered > 0 {
            return Ok(RelayOutcome::AwaitingValidation);
        }
        self.forward(&message_id)
    }

    /// Block every key of a misbehaving chain, except our own.
    pub(crate) fn penalize(&self, keys: &[String], now: Timestamp) {
        let mut block_list = self.block_list.lock();
        for key in keys.iter().filter(|key| **key != self.public_key_pem) {
            block_list.block(key, now);
        }
    }
}

/// Unwrap the signature chain and check the payload hashes to the claimed id.
/// Returns the envelope as received and the recovered payload.
fn recover_payload(record: &GossipBroadcast) -> Result<(Vec<u8>, Vec<u8>), OverlayError> {
    let signers = record
        .key_list
        .iter()
        .map(|pem| Ed25519PublicKey::from_pem(pem))
        .collect::<Result<Vec<_>, _>>()?;
    let envelope = record
        .envelope()
        .map_err(|e| CryptoError::Decoding(e.to_string()))?;
    let payload = unwrap_with_key_list(&envelope, &signers)?;

    let computed = message_id(&payload);
    if computed != record.message_id {
        return Err(OverlayError::IntegrityMismatch {
            claimed: record.message_id.clone(),
            computed,
        });
    }
    Ok((envelope, payload))
}
