//! # Signature Chain
//!
//! Every hop that forwards a broadcast wraps the bytes it received in a new
//! signed layer and appends its public key to the key list. A layer is a CBOR
//! map `{data, signature}` whose values are CBOR byte strings, so a hop adds
//! the signature and a few bytes of framing and nothing more:
//!
//! ```text
//! hop 1:  L1 = {data: P,  signature: sig_k1(P)}
//! hop 2:  L2 = {data: L1, signature: sig_k2(L1)}
//! keyList = [k1, k2]          (oldest signer first)
//! ```
//!
//! Unwrapping walks the key list in reverse: the last signer's layer is the
//! outermost one.

use serde::{Deserialize, Serialize};

use crate::{CryptoError, Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// One signed layer of the chain.
#[derive(Debug, Serialize, Deserialize)]
struct SignedLayer {
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
    #[serde(with = "serde_bytes")]
    signature: Vec<u8>,
}

/// Wrap `payload` in one signed layer.
pub fn wrap_layer(payload: &[u8], keypair: &Ed25519KeyPair) -> Result<Vec<u8>, CryptoError> {
    let signature = keypair.sign(payload);
    let layer = SignedLayer {
        data: payload.to_vec(),
        signature: signature.as_bytes().to_vec(),
    };

    let mut buf = Vec::new();
    ciborium::into_writer(&layer, &mut buf).map_err(|e| CryptoError::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Remove the outermost layer, verifying it was signed by `signer`.
pub fn unwrap_layer(wrapped: &[u8], signer: &Ed25519PublicKey) -> Result<Vec<u8>, CryptoError> {
    let layer: SignedLayer =
        ciborium::from_reader(wrapped).map_err(|e| CryptoError::Decoding(e.to_string()))?;
    let signature = Ed25519Signature::from_slice(&layer.signature)?;

    signer.verify(&layer.data, &signature)?;
    Ok(layer.data)
}

/// Wrap `payload` once per signer, in hop order.
pub fn sign_with_key_list(
    payload: &[u8],
    signers: &[&Ed25519KeyPair],
) -> Result<Vec<u8>, CryptoError> {
    signers
        .iter()
        .try_fold(payload.to_vec(), |current, signer| wrap_layer(&current, signer))
}

/// Recover the original payload from a chain signed by `key_list` (hop order).
///
/// An empty key list returns the input unchanged.
pub fn unwrap_with_key_list(
    wrapped: &[u8],
    key_list: &[Ed25519PublicKey],
) -> Result<Vec<u8>, CryptoError> {
    key_list
        .iter()
        .rev()
        .try_fold(wrapped.to_vec(), |current, signer| unwrap_layer(&current, signer))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (Ed25519KeyPair, Ed25519KeyPair, Ed25519KeyPair) {
        (
            Ed25519KeyPair::from_seed([1u8; 32]),
            Ed25519KeyPair::from_seed([2u8; 32]),
            Ed25519KeyPair::from_seed([3u8; 32]),
        )
    }

    #[test]
    fn test_three_hop_roundtrip() {
        let (k1, k2, k3) = keys();
        let payload = b"deadbeef".to_vec();

        let wrapped = sign_with_key_list(&payload, &[&k1, &k2, &k3]).unwrap();
        let publics = [k1.public_key(), k2.public_key(), k3.public_key()];

        assert_eq!(unwrap_with_key_list(&wrapped, &publics).unwrap(), payload);
    }

    #[test]
    fn test_hop_by_hop_wrapping_matches_key_list() {
        let (k1, k2, _) = keys();
        let payload = b"hop by hop";

        let first = wrap_layer(payload, &k1).unwrap();
        let second = wrap_layer(&first, &k2).unwrap();

        assert_eq!(unwrap_layer(&second, &k2.public_key()).unwrap(), first);
        assert_eq!(
            unwrap_with_key_list(&second, &[k1.public_key(), k2.public_key()]).unwrap(),
            payload
        );
    }

    #[test]
    fn test_replaced_key_fails_verification() {
        let (k1, k2, k3) = keys();
        let intruder = Ed25519KeyPair::from_seed([9u8; 32]);
        let wrapped = sign_with_key_list(b"payload", &[&k1, &k2, &k3]).unwrap();

        for position in 0..3 {
            let mut publics = [k1.public_key(), k2.public_key(), k3.public_key()];
            publics[position] = intruder.public_key();
            assert_eq!(
                unwrap_with_key_list(&wrapped, &publics),
                Err(CryptoError::SignatureVerificationFailed)
            );
        }
    }

    #[test]
    fn test_forward_order_fails() {
        let (k1, k2, _) = keys();
        let wrapped = sign_with_key_list(b"payload", &[&k1, &k2]).unwrap();

        // Key list given newest-first is not a valid chain.
        let result = unwrap_with_key_list(&wrapped, &[k2.public_key(), k1.public_key()]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_key_list_is_identity() {
        assert_eq!(unwrap_with_key_list(b"raw", &[]).unwrap(), b"raw".to_vec());
    }

    #[test]
    fn test_garbage_layer_is_decoding_error() {
        let (k1, _, _) = keys();
        let result = unwrap_layer(b"\xff\x00garbage", &k1.public_key());
        assert!(matches!(result, Err(CryptoError::Decoding(_))));
    }

    #[test]
    fn test_layer_overhead_is_constant() {
        let (k1, k2, _) = keys();
        let payload = vec![0x5Au8; 10_000];

        let first = wrap_layer(&payload, &k1).unwrap();
        let second = wrap_layer(&first, &k2).unwrap();
        let overhead = first.len() - payload.len();
        assert!(overhead < 100, "one layer added {overhead} bytes");
        assert_eq!(second.len() - first.len(), overhead);

        let layer: ciborium::Value = ciborium::from_reader(first.as_slice()).unwrap();
        let fields = layer.as_map().unwrap();
        assert!(fields.iter().all(|(_, value)| value.is_bytes()));
    }
}
