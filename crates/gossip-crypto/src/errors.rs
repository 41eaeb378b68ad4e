//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid signature length or format
    #[error("Invalid signature format: expected 64 bytes, got {0}")]
    InvalidSignatureFormat(usize),

    /// Public key bytes or PEM text did not decode to a curve point
    #[error("Invalid public key")]
    InvalidPublicKey,

    /// Private key material could not be decoded
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// Envelope or key serialization failed
    #[error("Encoding failed: {0}")]
    Encoding(String),

    /// Envelope could not be decoded
    #[error("Decoding failed: {0}")]
    Decoding(String),
}
