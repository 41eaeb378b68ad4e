//! Local subscriptions and the validation gate bookkeeping.
//!
//! Notifications to local modules carry a 16-bit id instead of the full
//! message id; `PendingValidations` maps it back when the verdict arrives.

use std::collections::{HashMap, VecDeque};

use super::entities::{ConnectionId, DataTypeId};

/// `data_type -> subscribers`, in subscription order.
#[derive(Debug, Default)]
pub struct Subscriptions {
    topics: HashMap<DataTypeId, Vec<ConnectionId>>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if already subscribed.
    pub fn subscribe(&mut self, data_type: DataTypeId, subscriber: ConnectionId) -> bool {
        let subscribers = self.topics.entry(data_type).or_default();
        if subscribers.contains(&subscriber) {
            return false;
        }
        subscribers.push(subscriber);
        true
    }

    pub fn subscribers(&self, data_type: DataTypeId) -> Vec<ConnectionId> {
        self.topics.get(&data_type).cloned().unwrap_or_default()
    }

    /// Prune a disconnected module from every topic.
    pub fn remove_subscriber(&mut self, subscriber: ConnectionId) {
        for subscribers in self.topics.values_mut() {
            subscribers.retain(|s| *s != subscriber);
        }
        self.topics.retain(|_, subscribers| !subscribers.is_empty());
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[derive(Debug)]
struct Pending {
    message_id: String,
    subscriber: ConnectionId,
}

/// Outstanding notifications awaiting a verdict, bounded FIFO.
#[derive(Debug)]
pub struct PendingValidations {
    next_id: u16,
    by_id: HashMap<u16, Pending>,
    order: VecDeque<u16>,
    capacity: usize,
}

impl PendingValidations {
    pub fn new(capacity: usize) -> Self {
        Self {
            next_id: 0,
            by_id: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.clamp(1, usize::from(u16::MAX)),
        }
    }

    /// Allocate a notification id for `message_id` sent to `subscriber`.
    pub fn register(&mut self, message_id: &str, subscriber: ConnectionId) -> u16 {
        while self.by_id.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.by_id.remove(&oldest);
                }
                None => break,
            }
        }
        // Skip ids still in use after wrap-around.
        while self.by_id.contains_key(&self.next_id) {
            self.next_id = self.next_id.wrapping_add(1);
        }
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.by_id.insert(
            id,
            Pending {
                message_id: message_id.to_string(),
                subscriber,
            },
        );
        self.order.push_back(id);
        id
    }

    /// First verdict wins: the entry is consumed.
    pub fn take(&mut self, notification_id: u16) -> Option<String> {
        let pending = self.by_id.remove(&notification_id)?;
        self.order.retain(|id| *id != notification_id);
        Some(pending.message_id)
    }

    /// Drop every notification owed by `subscriber`. Returns the message ids
    /// that no other subscriber still owes a verdict on.
    pub fn remove_subscriber(&mut self, subscriber: ConnectionId) -> Vec<String> {
        let mut dropped = Vec::new();
        self.by_id.retain(|_, pending| {
            if pending.subscriber == subscriber {
                dropped.push(std::mem::take(&mut pending.message_id));
                false
            } else {
                true
            }
        });
        let by_id = &self.by_id;
        self.order.retain(|id| by_id.contains_key(id));

        dropped.sort();
        dropped.dedup();
        dropped.retain(|message_id| !self.has_message(message_id));
        dropped
    }

    /// Whether any subscriber still owes a verdict on `message_id`.
    pub fn has_message(&self, message_id: &str) -> bool {
        self.by_id
            .values()
            .any(|pending| pending.message_id == message_id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
