//! # Gossip Overlay
//!
//! A peer-to-peer dissemination layer: nodes admit each other through a
//! proof-of-work challenge, keep a degree-bounded set of peers, and relay
//! application messages epidemically. Every hop adds a signature layer, a
//! bounded cache suppresses loops, and an abuse monitor rate-limits and
//! temporarily blocks misbehaving signer keys.
//!
//! ## Architecture
//!
//! - **Domain Layer:** tables and rules with no I/O (cache, blocklist,
//!   counters, peer table, PoW).
//! - **Protocol Layer:** the two wire formats (CBOR peer documents, binary
//!   module frames) as `tokio_util` codecs.
//! - **Ports Layer:** `OverlayApi`, `TimeSource`, `ConfigProvider`.
//! - **Service Layer:** `OverlayService`, the single owner of overlay state.
//! - **Adapters Layer:** TCP listeners, dialer, clock, TOML config.
//!
//! ## Example
//!
//! ```rust
//! use gossip_overlay::{CachedMessage, MessageCache, RelayState};
//!
//! let mut cache = MessageCache::new(2);
//! for id in ["a", "b", "c"] {
//!     cache.insert(CachedMessage {
//!         message_id: id.to_string(),
//!         data_type: 7,
//!         payload: Vec::new(),
//!         envelope: Vec::new(),
//!         key_list: Vec::new(),
//!         ttl: 10,
//!         state: RelayState::Received,
//!     });
//! }
//! assert!(!cache.contains("a"));
//! assert_eq!(cache.len(), 2);
//! ```

pub mod adapters;
pub mod connection;
pub mod domain;
pub mod ports;
pub mod protocol;
pub mod service;

// Domain
pub use domain::{
    AdmissionError, BlockList, CachedMessage, CandidatePool, ChallengeType, ConfigError,
    ConnectionId, DataTypeId, EnrollmentChallenge, Hardness, MessageCache, NeighbourInfo,
    OverlayConfig, OverlayError, Peer, PeerIdentity, PeerTable, PendingValidations, RateCounters,
    RegistrationRecord, RelayState, Subscriptions, Timestamp, WireError,
};

// Connections
pub use connection::{ConnectionHandle, ModuleLink, PeerLink};

// Protocol
pub use protocol::{ModuleCodec, ModuleMessage, PeerCodec, PeerMessage};

// Ports
pub use ports::{ConfigProvider, OverlayApi, TimeSource};

// Service
pub use service::{LinkRole, OverlayService, RelayOutcome};

// Adapters
pub use adapters::{
    ModuleListener, P2pTransport, StaticConfigProvider, SystemTimeSource, TomlConfigProvider,
};
