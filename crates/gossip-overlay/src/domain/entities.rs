//! Core entities shared by the overlay tables.

use std::fmt;

use uuid::Uuid;

/// Application data type carried in announcements and broadcasts.
pub type DataTypeId = u16;

/// Milliseconds since the Unix epoch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from milliseconds.
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Milliseconds since the epoch.
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Identifies one TCP connection for its whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Who a peer is and where its socket came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerIdentity {
    /// SPKI PEM public key; unique within the peer table.
    pub public_key: String,
    /// Remote socket address of the connection (`host:port`).
    pub network_address: String,
}

/// A connected, enrolled peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    pub identity: PeerIdentity,
    /// Address the peer accepts overlay connections on.
    pub server_address: String,
    pub connection: ConnectionId,
}

impl Peer {
    pub fn public_key(&self) -> &str {
        &self.identity.public_key
    }
}

/// `{address, public_key}` pair shared with a newly enrolled peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighbourInfo {
    pub address: String,
    pub public_key: String,
}
