//! # SHA-256 Hashing
//!
//! Message ids and proof-of-work digests both use SHA-256. A message id is
//! the standard base64 encoding of the digest of the original payload, so it
//! stays identical however many times the payload is re-wrapped.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 output (256-bit).
pub type Hash = [u8; 32];

/// Hash data with SHA-256 (one-shot).
pub fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Lower-case hexadecimal SHA-256 digest.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Content-derived message id: `base64(sha256(payload))`.
pub fn message_id(payload: &[u8]) -> String {
    STANDARD.encode(sha256(payload))
}

/// Count leading zero hex digits (nibbles) of a digest.
pub fn leading_hex_zeros(digest: &Hash) -> u32 {
    let mut count = 0u32;
    for byte in digest {
        if *byte == 0 {
            count += 2;
        } else {
            if byte >> 4 == 0 {
                count += 1;
            }
            break;
        }
    }
    count
}
