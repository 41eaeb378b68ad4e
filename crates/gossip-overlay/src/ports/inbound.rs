//! # Driving Port
//!
//! Read access to the overlay tables plus the two control operations a host
//! needs: injecting an announcement and swapping the configuration.

use std::collections::HashMap;
use std::sync::Arc;

use gossip_crypto::Ed25519KeyPair;

use crate::domain::{
    CachedMessage, ConfigError, DataTypeId, OverlayConfig, OverlayError, Peer, Timestamp,
};

/// Query and control surface of a running overlay.
///
/// Every accessor returns a snapshot; nothing here holds a lock past the call.
pub trait OverlayApi: Send + Sync {
    fn config(&self) -> OverlayConfig;

    /// Validate and apply a new configuration. The cache bound and counter
    /// limit take effect immediately; timers are restarted by the node.
    fn replace_config(&self, config: OverlayConfig) -> Result<(), ConfigError>;

    /// Per-key message counts of the current window.
    fn counters(&self) -> HashMap<String, u32>;

    /// Blocked keys and when they were blocked.
    fn block_list(&self) -> HashMap<String, Timestamp>;

    fn keypair(&self) -> Arc<Ed25519KeyPair>;

    fn public_key_pem(&self) -> String;

    fn peers(&self) -> Vec<Peer>;

    /// Server addresses of connected peers.
    fn peer_addresses(&self) -> Vec<String>;

    /// `address -> public_key` of known, unconnected peers.
    fn candidates(&self) -> HashMap<String, String>;

    fn candidate_addresses(&self) -> Vec<String>;

    /// Cached messages, oldest first.
    fn cached_messages(&self) -> Vec<CachedMessage>;

    /// Announce `payload` as if a local module had sent it. Returns the
    /// message id.
    fn announce(&self, data_type: DataTypeId, payload: Vec<u8>) -> Result<String, OverlayError>;
}
