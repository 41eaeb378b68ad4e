//! # Wire Protocols
//!
//! | Channel | Module | Framing | Body |
//! |---------|--------|---------|------|
//! | peer-to-peer | `p2p` | u32 length prefix | CBOR map tagged by `messageTypeId` |
//! | local module | `api` | u16 size in fixed header | big-endian binary |

pub mod api;
pub mod p2p;

pub use api::{ModuleCodec, ModuleMessage};
pub use p2p::{
    EnrollChallenge, EnrollFailure, EnrollInit, EnrollRegister, EnrollSuccess, GossipBroadcast,
    Neighbour, PeerCodec, PeerMessage,
};

/// Message type codes shared by both channels.
pub mod message_type {
    pub const ANNOUNCE: u16 = 500;
    pub const NOTIFY: u16 = 501;
    pub const NOTIFICATION: u16 = 502;
    pub const VALIDATION: u16 = 503;
    pub const ENROLL_INIT: u16 = 505;
    pub const ENROLL_CHALLENGE: u16 = 506;
    pub const ENROLL_REGISTER: u16 = 507;
    pub const ENROLL_SUCCESS: u16 = 508;
    pub const ENROLL_FAILURE: u16 = 509;
    pub const BROADCAST: u16 = 510;
}
