use tracing::{debug, warn};

use crate::domain::OverlayError;
use crate::protocol::Neighbour;
use crate::service::OverlayService;

impl OverlayService {
    /// Plan one maintenance round: the addresses to dial now.
    ///
    /// Nothing is planned once connected peers plus dials in flight reach the
    /// target degree. With an empty candidate pool the bootstrapper is tried;
    /// otherwise up to the missing count is sampled from the pool.
    pub fn maintain(&self) -> Vec<String> {
        let (degree, bootstrapper) = {
            let config = self.config.read();
            (config.degree, config.bootstrapper.clone())
        };
        let connected = self.peers.lock().len();
        let in_flight = self.dialing.lock().len();
        let missing = degree.saturating_sub(connected + in_flight);
        if missing == 0 {
            return Vec::new();
        }

        let sampled = {
            let candidates = self.candidates.lock();
            if candidates.is_empty() {
                None
            } else {
                Some(candidates.sample(missing.min(candidates.len()), &mut rand::thread_rng()))
            }
        };
        let planned: Vec<String> = sampled
            .unwrap_or_else(|| bootstrapper.into_iter().collect())
            .into_iter()
            .filter(|address| self.is_dialable(address))
            .collect();

        debug!(connected, in_flight, planned = planned.len(), "Maintenance round");
        planned
    }

    fn is_dialable(&self, address: &str) -> bool {
        let own_address = self.advertised_address();
        address != own_address
            && !self.peers.lock().has_server_address(address)
            && !self.dialing.lock().contains(address)
    }

    /// Reserve `address` for an outbound dial.
    ///
    /// Refuses our own address, addresses of connected peers and addresses
    /// already being dialed.
    pub fn begin_connect(&self, address: &str) -> Result<(), OverlayError> {
        if address == self.advertised_address() {
            return Err(OverlayError::SelfConnection(address.to_string()));
        }
        if self.peers.lock().has_server_address(address) {
            return Err(OverlayError::AlreadyConnected(address.to_string()));
        }
        if !self.dialing.lock().insert(address.to_string()) {
            return Err(OverlayError::AlreadyConnected(address.to_string()));
        }
        Ok(())
    }

    /// The dial to `address` failed before a connection existed.
    pub fn connect_failed(&self, address: &str, reason: &str) {
        self.dialing.lock().remove(address);
        let was_candidate = self.candidates.lock().remove(address).is_some();
        warn!(peer = %address, reason, was_candidate, "Connect failed");
    }

    /// Merge neighbours shared by a peer into the candidate pool, skipping
    /// ourselves and anyone already connected. Returns how many were added.
    pub(crate) fn learn_neighbours(&self, neighbours: &[Neighbour]) -> usize {
        let own_address = self.config.read().p2p_address.clone();
        let peers = self.peers.lock();
        let mut candidates = self.candidates.lock();

        let mut learned = 0;
        for neighbour in neighbours {
            if neighbour.public_key == self.public_key_pem
                || neighbour.address == own_address
                || peers.contains_key(&neighbour.public_key)
                || peers.has_server_address(&neighbour.address)
            {
                continue;
            }
            candidates.insert(neighbour.address.clone(), neighbour.public_key.clone());
            learned += 1;
        }
        learned
    }
}
