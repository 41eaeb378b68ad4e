//! # Abuse Monitor
//!
//! Two independent tables keyed by signer public key:
//!
//! - `RateCounters`: fixed-window message counts, cleared wholesale by a timer.
//! - `BlockList`: keys stamped with the time they were blocked; entries older
//!   than the removal duration are dropped by a periodic cleanup.

use std::collections::HashMap;

use super::entities::Timestamp;

/// Per-key message counters for the current window.
#[derive(Debug, Clone)]
pub struct RateCounters {
    counts: HashMap<String, u32>,
    limit: u32,
}

impl RateCounters {
    pub fn new(limit: u32) -> Self {
        Self {
            counts: HashMap::new(),
            limit,
        }
    }

    /// Count one message for every key; true if any key went over the limit.
    pub fn record_and_check<'a, I>(&mut self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut exceeded = false;
        for key in keys {
            let count = self.counts.entry(key.to_string()).or_insert(0);
            *count = count.saturating_add(1);
            exceeded |= *count > self.limit;
        }
        exceeded
    }

    /// Start a new window.
    pub fn reset(&mut self) {
        self.counts.clear();
    }

    pub fn set_limit(&mut self, limit: u32) {
        self.limit = limit;
    }

    pub fn count(&self, key: &str) -> u32 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, u32> {
        self.counts.clone()
    }
}

/// Time-decaying denylist of signer keys.
#[derive(Debug, Clone, Default)]
pub struct BlockList {
    entries: HashMap<String, Timestamp>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block `key` as of `now`; re-blocking refreshes the stamp.
    pub fn block(&mut self, key: &str, now: Timestamp) {
        self.entries.insert(key.to_string(), now);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// True if any of `keys` is blocked.
    pub fn any_blocked<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().any(|key| self.contains(key))
    }

    /// Drop entries blocked more than `removal_ms` ago. Returns how many.
    pub fn gc_expired(&mut self, now: Timestamp, removal_ms: u64) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, blocked_at| now.millis_since(*blocked_at) <= removal_ms);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> HashMap<String, Timestamp> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_trips_after_limit() {
        let mut counters = RateCounters::new(3);

        for _ in 0..3 {
            assert!(!counters.record_and_check(["alice"]));
        }
        assert!(counters.record_and_check(["alice"]));
        assert_eq!(counters.count("alice"), 4);
    }

    #[test]
    fn test_counter_checks_every_key() {
        let mut counters = RateCounters::new(1);
        assert!(!counters.record_and_check(["alice"]));

        // bob is fresh but alice is now over
        assert!(counters.record_and_check(["bob", "alice"]));
        assert_eq!(counters.count("bob"), 1);
    }

    #[test]
    fn test_counter_reset_opens_new_window() {
        let mut counters = RateCounters::new(1);
        counters.record_and_check(["alice"]);
        assert!(counters.record_and_check(["alice"]));

        counters.reset();
        assert!(counters.snapshot().is_empty());
        assert!(!counters.record_and_check(["alice"]));
    }

    #[test]
    fn test_block_list_decay() {
        let mut block_list = BlockList::new();
        block_list.block("mallory", Timestamp::new(1_000));

        assert!(block_list.contains("mallory"));
        assert_eq!(block_list.gc_expired(Timestamp::new(1_500), 500), 0);
        assert!(block_list.contains("mallory"));

        assert_eq!(block_list.gc_expired(Timestamp::new(1_501), 500), 1);
        assert!(!block_list.contains("mallory"));
        assert!(block_list.is_empty());
    }

    #[test]
    fn test_reblock_refreshes_stamp() {
        let mut block_list = BlockList::new();
        block_list.block("mallory", Timestamp::new(0));
        block_list.block("mallory", Timestamp::new(900));

        assert_eq!(block_list.gc_expired(Timestamp::new(1_000), 500), 0);
        assert_eq!(block_list.len(), 1);
    }

    #[test]
    fn test_any_blocked() {
        let mut block_list = BlockList::new();
        block_list.block("mallory", Timestamp::new(0));

        assert!(block_list.any_blocked(["alice", "mallory"]));
        assert!(!block_list.any_blocked(["alice", "bob"]));
    }
}
