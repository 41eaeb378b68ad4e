//! Domain errors for the gossip overlay.
//!
//! Errors are grouped by how the connection task reacts to them: wire and
//! admission errors end the connection, relay errors only drop the message.

use gossip_crypto::CryptoError;
use thiserror::Error;

/// Framing or document errors on either channel.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u16),

    #[error("Frame too short: {length} bytes (minimum {minimum})")]
    FrameTooShort { length: usize, minimum: usize },

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Invalid base64 field: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl WireError {
    /// Whether the stream itself is broken. Anything else concerns one
    /// message and leaves the connection usable.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

/// Reasons an enrollment is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Hardness {0} outside the satisfiable range 1..=64")]
    HardnessOutOfRange(u32),

    #[error("Challenge does not match the one issued")]
    ChallengeMismatch,

    #[error("Insufficient work: {found} leading zeros, {required} required")]
    InsufficientWork { required: u8, found: u32 },

    #[error("No solution found in {0} attempts")]
    AttemptsExhausted(u64),

    #[error("No challenge issued to this connection")]
    NoPendingChallenge,

    #[error("Public key is blocked")]
    Blocked,

    #[error("Cannot enroll with our own key")]
    SelfEnrollment,

    #[error("Public key already connected")]
    AlreadyConnected,

    #[error("Public key is not a valid PEM key")]
    InvalidPublicKey,

    #[error("Enrollment refused by peer: {0}")]
    Refused(String),

    #[error("Unsupported challenge type: {0}")]
    UnsupportedChallengeType(u8),

    #[error("Registration encoding failed: {0}")]
    Encoding(String),
}

/// Errors surfaced by overlay operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Recovered payload does not hash to the claimed message id.
    #[error("Message id mismatch: claimed {claimed}, computed {computed}")]
    IntegrityMismatch { claimed: String, computed: String },

    #[error("Broadcast carries no signer keys")]
    EmptyKeyList,

    #[error("Rate limit exceeded by a signer key")]
    RateLimited,

    #[error("Signer key is blocked")]
    Blocked,

    #[error("Message already seen")]
    Duplicate,

    #[error("Broadcast of {0} bytes exceeds the frame limit")]
    Oversized(usize),

    #[error("Key list does not end with the sending peer's key")]
    SenderMismatch,

    #[error("Unexpected message in this connection state: {0}")]
    UnexpectedMessage(&'static str),

    #[error("Refusing to connect to our own address {0}")]
    SelfConnection(String),

    #[error("Already connected or dialing {0}")]
    AlreadyConnected(String),

    #[error("Connect to {address} failed: {reason}")]
    ConnectFailed { address: String, reason: String },
}

impl OverlayError {
    /// Whether the connection that produced this error must be closed.
    pub fn closes_connection(&self) -> bool {
        matches!(
            self,
            Self::Wire(_) | Self::Admission(_) | Self::UnexpectedMessage(_)
        )
    }
}

/// Configuration validation and loading errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
