//! # Domain Layer
//!
//! Pure overlay state: no I/O, no timers. The service layer owns one lock per
//! table and drives these types from connection events.

pub mod abuse;
pub mod admission;
pub mod cache;
pub mod config;
pub mod entities;
pub mod errors;
pub mod membership;
pub mod notification;

pub use abuse::{BlockList, RateCounters};
pub use admission::{
    solve, verify_registration, ChallengeType, EnrollmentChallenge, Hardness, RegistrationRecord,
    CHALLENGE_LEN, MAX_HARDNESS,
};
pub use cache::{CachedMessage, MessageCache, RelayState};
pub use config::OverlayConfig;
pub use entities::{ConnectionId, DataTypeId, NeighbourInfo, Peer, PeerIdentity, Timestamp};
pub use errors::{AdmissionError, ConfigError, OverlayError, WireError};
pub use membership::{CandidatePool, PeerTable};
pub use notification::{PendingValidations, Subscriptions};
