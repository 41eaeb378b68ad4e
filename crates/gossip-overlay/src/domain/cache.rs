//! Bounded message cache used for loop suppression.

use std::collections::{HashMap, VecDeque};

use super::entities::DataTypeId;

/// Where a cached message is in its relay lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayState {
    /// Cached, not yet forwarded.
    Received,
    /// Delivered to local subscribers, forwarding waits for a verdict.
    PendingValidation,
    /// Handed to every connected peer (or hop budget exhausted).
    Forwarded,
    /// A local subscriber rejected it; never forwarded.
    Rejected,
}

/// A message as seen by this node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedMessage {
    /// `base64(sha256(payload))`
    pub message_id: String,
    pub data_type: DataTypeId,
    /// Original payload, recovered from the signature chain.
    pub payload: Vec<u8>,
    /// Signed envelope as received; equals `payload` for local announcements.
    pub envelope: Vec<u8>,
    /// Signer keys of `envelope`, oldest first.
    pub key_list: Vec<String>,
    pub ttl: u8,
    pub state: RelayState,
}

/// FIFO-bounded cache: at capacity the oldest insertion is evicted, lookups
/// never refresh an entry.
#[derive(Debug)]
pub struct MessageCache {
    entries: HashMap<String, CachedMessage>,
    insertion_order: VecDeque<String>,
    max_size: usize,
}

impl MessageCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(max_size),
            insertion_order: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.entries.contains_key(message_id)
    }

    /// Insert unless already present. Returns false for duplicates.
    pub fn insert(&mut self, message: CachedMessage) -> bool {
        if self.entries.contains_key(&message.message_id) {
            return false;
        }
        while self.entries.len() >= self.max_size {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.insertion_order.push_back(message.message_id.clone());
        self.entries.insert(message.message_id.clone(), message);
        true
    }

    pub fn get(&self, message_id: &str) -> Option<&CachedMessage> {
        self.entries.get(message_id)
    }

    pub fn state(&self, message_id: &str) -> Option<RelayState> {
        self.entries.get(message_id).map(|m| m.state)
    }

    /// Whether the message may still be handed to peers.
    pub fn is_forwardable(&self, message_id: &str) -> bool {
        matches!(
            self.state(message_id),
            Some(RelayState::Received | RelayState::PendingValidation)
        )
    }

    pub fn set_state(&mut self, message_id: &str, state: RelayState) {
        if let Some(message) = self.entries.get_mut(message_id) {
            message.state = state;
        }
    }

    /// Change the bound, evicting oldest entries if it shrank.
    pub fn resize(&mut self, max_size: usize) {
        self.max_size = max_size.max(1);
        while self.entries.len() > self.max_size {
            match self.insertion_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    /// Resident messages, oldest first.
    pub fn snapshot(&self) -> Vec<CachedMessage> {
        self.insertion_order
            .iter()
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> CachedMessage {
        CachedMessage {
            message_id: id.to_string(),
            data_type: 7,
            payload: id.as_bytes().to_vec(),
            envelope: id.as_bytes().to_vec(),
            key_list: Vec::new(),
            ttl: 10,
            state: RelayState::Forwarded,
        }
    }

    #[test]
    fn test_insert_and_duplicate() {
        let mut cache = MessageCache::new(10);
        assert!(cache.insert(message("a")));
        assert!(!cache.insert(message("a")));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_oldest_inserted() {
        let mut cache = MessageCache::new(3);
        for id in ["a", "b", "c"] {
            cache.insert(message(id));
        }
        // Reading "a" must not protect it.
        assert!(cache.get("a").is_some());

        cache.insert(message("d"));
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("a"));
        assert!(cache.contains("d"));
    }

    #[test]
    fn test_bound_holds_for_many_insertions() {
        let mut cache = MessageCache::new(5);
        for i in 0..100 {
            cache.insert(message(&i.to_string()));
            assert!(cache.len() <= 5);
        }
        let ids: Vec<_> = cache.snapshot().into_iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec!["95", "96", "97", "98", "99"]);
    }

    #[test]
    fn test_state_transitions() {
        let mut cache = MessageCache::new(3);
        let mut pending = message("a");
        pending.state = RelayState::PendingValidation;
        cache.insert(pending);

        assert!(cache.is_forwardable("a"));

        cache.set_state("a", RelayState::Rejected);
        assert_eq!(cache.state("a"), Some(RelayState::Rejected));
        assert!(!cache.is_forwardable("a"));
        assert_eq!(cache.state("missing"), None);
    }

    #[test]
    fn test_shrink_evicts() {
        let mut cache = MessageCache::new(4);
        for id in ["a", "b", "c", "d"] {
            cache.insert(message(id));
        }
        cache.resize(2);
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("c") && cache.contains("d"));
    }
}
