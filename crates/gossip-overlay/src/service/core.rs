use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use gossip_crypto::Ed25519KeyPair;
use parking_lot::{Mutex, RwLock};
use tokio::task::AbortHandle;

use crate::connection::{ModuleLink, PeerLink};
use crate::domain::{
    BlockList, CandidatePool, ConnectionId, EnrollmentChallenge, MessageCache, OverlayConfig,
    OverlayError, PeerTable, PendingValidations, RateCounters, Subscriptions, Timestamp,
};
use crate::ports::TimeSource;
use crate::protocol::PeerMessage;

/// Which side of the enrollment handshake a peer connection plays.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkRole {
    /// Accepted connection; we issue the challenge.
    Responder,
    /// Outbound dial to `dialed`, the address the remote accepts on.
    Initiator { dialed: String },
}

/// Handshake progress of one peer connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LinkPhase {
    AwaitingRegistration,
    AwaitingChallenge,
    Solving,
    AwaitingVerdict,
    Enrolled { public_key: String },
}

pub(crate) struct LinkState {
    pub(crate) link: PeerLink,
    pub(crate) role: LinkRole,
    pub(crate) phase: LinkPhase,
}

/// A challenge issued on one accepted connection.
pub(crate) struct PendingChallenge {
    pub(crate) challenge: EnrollmentChallenge,
    pub(crate) timeout: AbortHandle,
}

/// The overlay node's shared state and protocol logic.
///
/// Connection tasks call into the service concurrently, so every table has
/// its own lock. Locks are never held across an `.await`; when two are needed
/// `peers` is taken before `candidates`.
///
/// # Example
///
/// ```rust,ignore
/// let service = Arc::new(OverlayService::new(
///     OverlayConfig::default(),
///     Ed25519KeyPair::generate(),
///     Arc::new(SystemTimeSource),
/// )?);
/// let message_id = service.announce(7, b"deadbeef".to_vec(), None)?;
/// ```
pub struct OverlayService {
    pub(crate) config: RwLock<OverlayConfig>,
    pub(crate) keypair: Arc<Ed25519KeyPair>,
    pub(crate) public_key_pem: String,
    pub(crate) time_source: Arc<dyn TimeSource>,

    // Membership
    pub(crate) peers: Mutex<PeerTable>,
    pub(crate) candidates: Mutex<CandidatePool>,
    pub(crate) dialing: Mutex<HashSet<String>>,
    pub(crate) links: Mutex<HashMap<ConnectionId, LinkState>>,
    pub(crate) challenges: Mutex<HashMap<ConnectionId, PendingChallenge>>,

    // Dissemination
    pub(crate) cache: Mutex<MessageCache>,
    pub(crate) counters: Mutex<RateCounters>,
    pub(crate) block_list: Mutex<BlockList>,

    // Local modules
    pub(crate) modules: Mutex<HashMap<ConnectionId, ModuleLink>>,
    pub(crate) subscriptions: Mutex<Subscriptions>,
    pub(crate) validations: Mutex<PendingValidations>,
}

impl OverlayService {
    /// Create a service with empty tables.
    ///
    /// Fails if `config` does not validate or the key cannot be PEM encoded.
    pub fn new(
        config: OverlayConfig,
        keypair: Ed25519KeyPair,
        time_source: Arc<dyn TimeSource>,
    ) -> Result<Self, OverlayError> {
        config.validate()?;
        let public_key_pem = keypair.public_key_pem()?;

        Ok(Self {
            cache: Mutex::new(MessageCache::new(config.cache_size)),
            counters: Mutex::new(RateCounters::new(config.counter_limit)),
            validations: Mutex::new(PendingValidations::new(config.cache_size)),
            config: RwLock::new(config),
            keypair: Arc::new(keypair),
            public_key_pem,
            time_source,
            peers: Mutex::new(PeerTable::new()),
            candidates: Mutex::new(CandidatePool::new()),
            dialing: Mutex::new(HashSet::new()),
            links: Mutex::new(HashMap::new()),
            challenges: Mutex::new(HashMap::new()),
            block_list: Mutex::new(BlockList::new()),
            modules: Mutex::new(HashMap::new()),
            subscriptions: Mutex::new(Subscriptions::new()),
        })
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    /// Record the address the peer listener actually bound, so it is what we
    /// advertise and what self-connection checks compare against.
    pub fn set_advertised_address(&self, address: impl Into<String>) {
        self.config.write().p2p_address = address.into();
    }

    pub fn advertised_address(&self) -> String {
        self.config.read().p2p_address.clone()
    }

    /// Queue `message` on every enrolled peer. Returns how many accepted it.
    pub(crate) fn send_to_peers(&self, message: &PeerMessage) -> usize {
        let connections = self.peers.lock().connections();
        let targets: Vec<PeerLink> = {
            let links = self.links.lock();
            connections
                .iter()
                .filter_map(|id| links.get(id).map(|state| state.link.clone()))
                .collect()
        };
        targets
            .iter()
            .filter(|link| link.send(message.clone()))
            .count()
    }

    pub(crate) fn link_role_and_phase(&self, id: ConnectionId) -> Option<(LinkRole, LinkPhase)> {
        self.links
            .lock()
            .get(&id)
            .map(|state| (state.role.clone(), state.phase.clone()))
    }

    pub(crate) fn set_phase(&self, id: ConnectionId, phase: LinkPhase) {
        if let Some(state) = self.links.lock().get_mut(&id) {
            state.phase = phase;
        }
    }

    /// Key the peer on `id` enrolled with.
    pub(crate) fn enrolled_key(&self, id: ConnectionId) -> Option<String> {
        match self.links.lock().get(&id).map(|state| &state.phase) {
            Some(LinkPhase::Enrolled { public_key }) => Some(public_key.clone()),
            _ => None,
        }
    }
}
