//! # Admission Control
//!
//! Proof-of-work gate for enrollment. The responder issues 64 random bytes and
//! a hardness; the initiator searches for a nonce such that the SHA-256 digest
//! of the canonical registration record starts with `hardness` zero hex digits.
//!
//! ## Hardness
//!
//! Hardness grows with abuse: `base + floor(log2(block_list_len + 1))`.
//! A SHA-256 hex digest has 64 digits, so anything above 64 can never be
//! satisfied and is refused at issuance.

use gossip_crypto::{leading_hex_zeros, sha256, Hash};
use rand::RngCore;
use serde::Serialize;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::entities::Timestamp;
use super::errors::AdmissionError;

/// Challenge and nonce length in bytes.
pub const CHALLENGE_LEN: usize = 64;

/// Largest satisfiable hardness.
pub const MAX_HARDNESS: u8 = 64;

/// Puzzle kinds a responder may issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeType {
    /// Leading zero hex digits of SHA-256 over the registration record.
    Sha256HexZeros,
}

impl ChallengeType {
    pub fn code(self) -> u8 {
        match self {
            Self::Sha256HexZeros => 0,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, AdmissionError> {
        match code {
            0 => Ok(Self::Sha256HexZeros),
            other => Err(AdmissionError::UnsupportedChallengeType(other)),
        }
    }
}

/// Required number of leading zero hex digits, always within `1..=64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Hardness(u8);

impl Hardness {
    pub fn new(value: u32) -> Result<Self, AdmissionError> {
        if value == 0 || value > u32::from(MAX_HARDNESS) {
            return Err(AdmissionError::HardnessOutOfRange(value));
        }
        Ok(Self(value as u8))
    }

    /// Hardness for the current abuse level.
    pub fn for_block_list(base: u8, block_list_len: usize) -> Result<Self, AdmissionError> {
        let bonus = (block_list_len as u64 + 1).ilog2();
        Self::new(u32::from(base) + bonus)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// The initiator's answer to a challenge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationRecord {
    pub challenge: Vec<u8>,
    pub nonce: Vec<u8>,
    pub public_key: String,
    pub server_address: String,
}

/// Field order here is the hashing contract between initiator and responder.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalRecord<'a> {
    challenge: String,
    nonce: String,
    public_key: &'a str,
    server_address: &'a str,
}

impl RegistrationRecord {
    /// CBOR encoding of the record with base64 byte fields.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, AdmissionError> {
        let canonical = CanonicalRecord {
            challenge: STANDARD.encode(&self.challenge),
            nonce: STANDARD.encode(&self.nonce),
            public_key: &self.public_key,
            server_address: &self.server_address,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&canonical, &mut buf)
            .map_err(|e| AdmissionError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    pub fn digest(&self) -> Result<Hash, AdmissionError> {
        Ok(sha256(&self.canonical_bytes()?))
    }

    /// Leading zero hex digits of the record digest.
    pub fn work(&self) -> Result<u32, AdmissionError> {
        Ok(leading_hex_zeros(&self.digest()?))
    }
}

/// A challenge issued to one connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrollmentChallenge {
    pub challenge: Vec<u8>,
    pub challenge_type: ChallengeType,
    pub hardness: Hardness,
    pub issued_at: Timestamp,
}

impl EnrollmentChallenge {
    /// Draw fresh random challenge bytes.
    pub fn issue(hardness: Hardness, now: Timestamp) -> Self {
        let mut challenge = vec![0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut challenge);
        Self {
            challenge,
            challenge_type: ChallengeType::Sha256HexZeros,
            hardness,
            issued_at: now,
        }
    }

    /// Responder-side check: binding first, then the work itself.
    pub fn verify(&self, record: &RegistrationRecord) -> Result<(), AdmissionError> {
        if record.challenge != self.challenge {
            return Err(AdmissionError::ChallengeMismatch);
        }
        verify_registration(record, self.hardness)
    }
}

/// Check that `record` carries at least `hardness` zero hex digits of work.
pub fn verify_registration(
    record: &RegistrationRecord,
    hardness: Hardness,
) -> Result<(), AdmissionError> {
    let found = record.work()?;
    if found < u32::from(hardness.get()) {
        return Err(AdmissionError::InsufficientWork {
            required: hardness.get(),
            found,
        });
    }
    Ok(())
}

/// Initiator-side search for a nonce, bounded by `max_attempts`.
///
/// CPU bound; callers on an async runtime run it on a blocking thread.
pub fn solve(
    challenge: &[u8],
    hardness: Hardness,
    public_key: &str,
    server_address: &str,
    max_attempts: u64,
) -> Result<RegistrationRecord, AdmissionError> {
    let mut rng = rand::thread_rng();
    let mut record = RegistrationRecord {
        challenge: challenge.to_vec(),
        nonce: vec![0u8; CHALLENGE_LEN],
        public_key: public_key.to_string(),
        server_address: server_address.to_string(),
    };

    for _ in 0..max_attempts {
        rng.fill_bytes(&mut record.nonce);
        if record.work()? >= u32::from(hardness.get()) {
            return Ok(record);
        }
    }
    Err(AdmissionError::AttemptsExhausted(max_attempts))
}
