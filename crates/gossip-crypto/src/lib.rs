//! # Gossip Crypto - Identities and Signature Chains
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Node identity, per-hop signing |
//! | `hashing` | SHA-256 | Message ids, proof-of-work digests |
//! | `chain` | Ed25519 + CBOR | Multi-hop signature envelopes |
//!
//! Public keys travel between nodes as SPKI PEM strings; the PEM text is the
//! peer identity used throughout the overlay.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use chain::{sign_with_key_list, unwrap_layer, unwrap_with_key_list, wrap_layer};
pub use errors::CryptoError;
pub use hashing::{leading_hex_zeros, message_id, sha256, sha256_hex, Hash};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
