//! # Membership Tables
//!
//! - `PeerTable`: enrolled peers, unique by public key.
//! - `CandidatePool`: `address -> public_key` pairs learnt from neighbour
//!   lists, not yet connected.

use std::collections::HashMap;

use rand::seq::IteratorRandom;
use rand::Rng;

use super::entities::{ConnectionId, NeighbourInfo, Peer};

/// Connected peers keyed by public key.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<String, Peer>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer. Returns false if its key is already connected.
    pub fn insert(&mut self, peer: Peer) -> bool {
        if self.peers.contains_key(peer.public_key()) {
            return false;
        }
        self.peers.insert(peer.public_key().to_string(), peer);
        true
    }

    pub fn contains_key(&self, public_key: &str) -> bool {
        self.peers.contains_key(public_key)
    }

    pub fn has_server_address(&self, address: &str) -> bool {
        self.peers.values().any(|p| p.server_address == address)
    }

    pub fn remove_by_connection(&mut self, connection: ConnectionId) -> Option<Peer> {
        let key = self
            .peers
            .values()
            .find(|p| p.connection == connection)?
            .public_key()
            .to_string();
        self.peers.remove(&key)
    }

    pub fn remove(&mut self, public_key: &str) -> Option<Peer> {
        self.peers.remove(public_key)
    }

    pub fn connections(&self) -> Vec<ConnectionId> {
        self.peers.values().map(|p| p.connection).collect()
    }

    /// Uniform sample without replacement of up to `count` neighbours,
    /// leaving out `exclude` (usually the peer being answered).
    pub fn sample_neighbours<R: Rng + ?Sized>(
        &self,
        count: usize,
        exclude: Option<&str>,
        rng: &mut R,
    ) -> Vec<NeighbourInfo> {
        self.peers
            .values()
            .filter(|p| Some(p.public_key()) != exclude)
            .choose_multiple(rng, count)
            .into_iter()
            .map(|p| NeighbourInfo {
                address: p.server_address.clone(),
                public_key: p.public_key().to_string(),
            })
            .collect()
    }

    pub fn server_addresses(&self) -> Vec<String> {
        self.peers.values().map(|p| p.server_address.clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<Peer> {
        self.peers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

/// Known but unconnected peers.
#[derive(Debug, Default)]
pub struct CandidatePool {
    candidates: HashMap<String, String>,
}

impl CandidatePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, address: String, public_key: String) {
        self.candidates.insert(address, public_key);
    }

    pub fn remove(&mut self, address: &str) -> Option<String> {
        self.candidates.remove(address)
    }

    /// Drop every candidate advertising `public_key`.
    pub fn remove_key(&mut self, public_key: &str) {
        self.candidates.retain(|_, key| key != public_key);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.candidates.contains_key(address)
    }

    /// Uniform sample without replacement; candidates stay in the pool.
    pub fn sample<R: Rng + ?Sized>(&self, count: usize, rng: &mut R) -> Vec<String> {
        self.candidates.keys().cloned().choose_multiple(rng, count)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.candidates.keys().cloned().collect()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.candidates.clone()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::PeerIdentity;
    use std::collections::HashSet;

    fn peer(n: u8) -> Peer {
        Peer {
            identity: PeerIdentity {
                public_key: format!("key-{n}"),
                network_address: format!("10.0.0.{n}:50000"),
            },
            server_address: format!("10.0.0.{n}:4002"),
            connection: ConnectionId::new(),
        }
    }

    #[test]
    fn test_peer_table_unique_by_key() {
        let mut table = PeerTable::new();
        assert!(table.insert(peer(1)));

        let mut same_key = peer(2);
        same_key.identity.public_key = "key-1".to_string();
        assert!(!table.insert(same_key));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_by_connection() {
        let mut table = PeerTable::new();
        let p = peer(1);
        let connection = p.connection;
        table.insert(p);
        table.insert(peer(2));

        let removed = table.remove_by_connection(connection).unwrap();
        assert_eq!(removed.public_key(), "key-1");
        assert!(table.remove_by_connection(connection).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_server_address_lookup() {
        let mut table = PeerTable::new();
        table.insert(peer(1));
        assert!(table.has_server_address("10.0.0.1:4002"));
        assert!(!table.has_server_address("10.0.0.1:50000"));
    }

    #[test]
    fn test_neighbour_sample_is_distinct_and_excludes() {
        let mut table = PeerTable::new();
        for n in 1..=6 {
            table.insert(peer(n));
        }
        let mut rng = rand::thread_rng();

        let sample = table.sample_neighbours(3, Some("key-1"), &mut rng);
        assert_eq!(sample.len(), 3);
        let keys: HashSet<_> = sample.iter().map(|n| n.public_key.clone()).collect();
        assert_eq!(keys.len(), 3);
        assert!(!keys.contains("key-1"));

        assert_eq!(table.sample_neighbours(10, None, &mut rng).len(), 6);
    }

    #[test]
    fn test_candidate_sample_keeps_pool() {
        let mut pool = CandidatePool::new();
        for n in 0..5 {
            pool.insert(format!("10.0.1.{n}:4002"), format!("key-{n}"));
        }
        let mut rng = rand::thread_rng();

        let sample = pool.sample(3, &mut rng);
        assert_eq!(sample.len(), 3);
        assert_eq!(sample.iter().collect::<HashSet<_>>().len(), 3);
        assert_eq!(pool.len(), 5);
        assert_eq!(pool.sample(9, &mut rng).len(), 5);
    }

    #[test]
    fn test_candidate_remove_key() {
        let mut pool = CandidatePool::new();
        pool.insert("a:1".to_string(), "key".to_string());
        pool.insert("b:1".to_string(), "key".to_string());
        pool.insert("c:1".to_string(), "other".to_string());

        pool.remove_key("key");
        assert_eq!(pool.addresses(), vec!["c:1".to_string()]);
    }
}
