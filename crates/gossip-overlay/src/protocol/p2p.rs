//! Peer-to-peer documents.
//!
//! Each frame is a CBOR map. The `messageTypeId` key selects the shape; the
//! remaining keys are the camelCase fields of the matching struct. Byte fields
//! (challenge, nonce, wrapped message) travel as base64 text.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use ciborium::value::Value;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use super::message_type;
use crate::domain::{
    ChallengeType, DataTypeId, EnrollmentChallenge, NeighbourInfo, RegistrationRecord, WireError,
};

/// Upper bound on a single peer frame.
pub const MAX_FRAME_LEN: usize = 4 * 1024 * 1024;

/// Largest base64 `message` accepted on an inbound BROADCAST. The margin
/// below `MAX_FRAME_LEN` leaves room for our layer and key on the way out.
pub const MAX_MESSAGE_LEN: usize = MAX_FRAME_LEN - 64 * 1024;

const TYPE_KEY: &str = "messageTypeId";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollInit {
    pub public_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollChallenge {
    pub challenge_type: u8,
    pub challenge_hardness: u8,
    pub challenge: String,
    pub public_key: String,
}

impl EnrollChallenge {
    pub fn new(issued: &EnrollmentChallenge, public_key: &str) -> Self {
        Self {
            challenge_type: issued.challenge_type.code(),
            challenge_hardness: issued.hardness.get(),
            challenge: STANDARD.encode(&issued.challenge),
            public_key: public_key.to_string(),
        }
    }

    pub fn challenge_bytes(&self) -> Result<Vec<u8>, WireError> {
        Ok(STANDARD.decode(&self.challenge)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollRegister {
    pub challenge: String,
    pub nonce: String,
    pub public_key: String,
    pub server_address: String,
}

impl EnrollRegister {
    pub fn from_record(record: &RegistrationRecord) -> Self {
        Self {
            challenge: STANDARD.encode(&record.challenge),
            nonce: STANDARD.encode(&record.nonce),
            public_key: record.public_key.clone(),
            server_address: record.server_address.clone(),
        }
    }

    pub fn to_record(&self) -> Result<RegistrationRecord, WireError> {
        Ok(RegistrationRecord {
            challenge: STANDARD.decode(&self.challenge)?,
            nonce: STANDARD.decode(&self.nonce)?,
            public_key: self.public_key.clone(),
            server_address: self.server_address.clone(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Neighbour {
    pub address: String,
    pub public_key: String,
}

impl From<NeighbourInfo> for Neighbour {
    fn from(info: NeighbourInfo) -> Self {
        Self {
            address: info.address,
            public_key: info.public_key,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollSuccess {
    pub public_key: String,
    #[serde(default)]
    pub neighbours: Vec<Neighbour>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollFailure {
    pub error_message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GossipBroadcast {
    pub data_type_id: DataTypeId,
    pub message_id: String,
    /// base64 of the signature-chain envelope.
    pub message: String,
    /// Signer PEM keys, oldest first.
    pub key_list: Vec<String>,
    pub ttl: u8,
}

impl GossipBroadcast {
    pub fn envelope(&self) -> Result<Vec<u8>, WireError> {
        Ok(STANDARD.decode(&self.message)?)
    }
}

/// Closed set of peer documents.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PeerMessage {
    EnrollInit(EnrollInit),
    EnrollChallenge(EnrollChallenge),
    EnrollRegister(EnrollRegister),
    EnrollSuccess(EnrollSuccess),
    EnrollFailure(EnrollFailure),
    Broadcast(GossipBroadcast),
}

impl PeerMessage {
    pub fn message_type(&self) -> u16 {
        match self {
            Self::EnrollInit(_) => message_type::ENROLL_INIT,
            Self::EnrollChallenge(_) => message_type::ENROLL_CHALLENGE,
            Self::EnrollRegister(_) => message_type::ENROLL_REGISTER,
            Self::EnrollSuccess(_) => message_type::ENROLL_SUCCESS,
            Self::EnrollFailure(_) => message_type::ENROLL_FAILURE,
            Self::Broadcast(_) => message_type::BROADCAST,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EnrollInit(_) => "ENROLL_INIT",
            Self::EnrollChallenge(_) => "ENROLL_CHALLENGE",
            Self::EnrollRegister(_) => "ENROLL_REGISTER",
            Self::EnrollSuccess(_) => "ENROLL_SUCCESS",
            Self::EnrollFailure(_) => "ENROLL_FAILURE",
            Self::Broadcast(_) => "BROADCAST",
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::EnrollFailure(EnrollFailure {
            error_message: reason.into(),
        })
    }

    /// Encode as one CBOR document.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let body = match self {
            Self::EnrollInit(m) => Value::serialized(m),
            Self::EnrollChallenge(m) => Value::serialized(m),
            Self::EnrollRegister(m) => Value::serialized(m),
            Self::EnrollSuccess(m) => Value::serialized(m),
            Self::EnrollFailure(m) => Value::serialized(m),
            Self::Broadcast(m) => Value::serialized(m),
        }
        .map_err(|e| WireError::Malformed(e.to_string()))?;

        let Value::Map(mut entries) = body else {
            return Err(WireError::Malformed("message body is not a map".to_string()));
        };
        entries.insert(
            0,
            (
                Value::Text(TYPE_KEY.to_string()),
                Value::Integer(self.message_type().into()),
            ),
        );

        let mut buf = Vec::new();
        ciborium::into_writer(&Value::Map(entries), &mut buf)
            .map_err(|e| WireError::Malformed(e.to_string()))?;
        Ok(buf)
    }

    /// Decode one CBOR document.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        let value: Value =
            ciborium::from_reader(bytes).map_err(|e| WireError::Malformed(e.to_string()))?;

        match message_type_of(&value)? {
            message_type::ENROLL_INIT => Ok(Self::EnrollInit(body(&value)?)),
            message_type::ENROLL_CHALLENGE => Ok(Self::EnrollChallenge(body(&value)?)),
            message_type::ENROLL_REGISTER => Ok(Self::EnrollRegister(body(&value)?)),
            message_type::ENROLL_SUCCESS => Ok(Self::EnrollSuccess(body(&value)?)),
            message_type::ENROLL_FAILURE => Ok(Self::EnrollFailure(body(&value)?)),
            message_type::BROADCAST => Ok(Self::Broadcast(body(&value)?)),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

fn message_type_of(value: &Value) -> Result<u16, WireError> {
    let entries = value
        .as_map()
        .ok_or_else(|| WireError::Malformed("document is not a map".to_string()))?;

    entries
        .iter()
        .find(|(key, _)| key.as_text() == Some(TYPE_KEY))
        .and_then(|(_, v)| v.as_integer())
        .and_then(|i| u16::try_from(i).ok())
        .ok_or(WireError::MissingField(TYPE_KEY))
}

fn body<T: for<'de> Deserialize<'de>>(value: &Value) -> Result<T, WireError> {
    value
        .deserialized()
        .map_err(|e| WireError::Malformed(e.to_string()))
}

/// Length-delimited framing around `PeerMessage`.
#[derive(Debug)]
pub struct PeerCodec {
    frames: LengthDelimitedCodec,
}

impl PeerCodec {
    pub fn new() -> Self {
        Self {
            frames: LengthDelimitedCodec::builder()
                .max_frame_length(MAX_FRAME_LEN)
                .new_codec(),
        }
    }
}

impl Default for PeerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PeerCodec {
    type Item = PeerMessage;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frames.decode(src)? {
            Some(frame) => PeerMessage::decode(&frame).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<PeerMessage> for PeerCodec {
    type Error = WireError;

    fn encode(&mut self, item: PeerMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let bytes = item.encode()?;
        if bytes.len() > MAX_FRAME_LEN {
            return Err(WireError::FrameTooLarge(bytes.len()));
        }
        self.frames.encode(Bytes::from(bytes), dst)?;
        Ok(())
    }
}

/// Parse the wire challenge type, rejecting unknown puzzles.
pub fn challenge_type_of(message: &EnrollChallenge) -> Result<ChallengeType, WireError> {
    ChallengeType::from_code(message.challenge_type)
        .map_err(|_| WireError::Malformed(format!("challenge type {}", message.challenge_type)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broadcast() -> PeerMessage {
        PeerMessage::Broadcast(GossipBroadcast {
            data_type_id: 7,
            message_id: "aWQ=".to_string(),
            message: STANDARD.encode(b"deadbeef"),
            key_list: vec!["k1".to_string()],
            ttl: 9,
        })
    }

    #[test]
    fn test_document_carries_type_tag_and_camel_case_fields() {
        let bytes = broadcast().encode().unwrap();
        let value: Value = ciborium::from_reader(bytes.as_slice()).unwrap();
        let keys: Vec<_> = value
            .as_map()
            .unwrap()
            .iter()
            .filter_map(|(k, _)| k.as_text().map(str::to_string))
            .collect();

        assert_eq!(
            keys,
            vec!["messageTypeId", "dataTypeId", "messageId", "message", "keyList", "ttl"]
        );
        assert_eq!(message_type_of(&value).unwrap(), 510);
    }

    #[test]
    fn test_decode_each_shape() {
        let messages = vec![
            PeerMessage::EnrollInit(EnrollInit {
                public_key: "pk".to_string(),
            }),
            PeerMessage::EnrollSuccess(EnrollSuccess {
                public_key: "pk".to_string(),
                neighbours: vec![Neighbour {
                    address: "10.0.0.1:4002".to_string(),
                    public_key: "n1".to_string(),
                }],
            }),
            PeerMessage::failure("Challenge failed"),
            broadcast(),
        ];
        for message in messages {
            let decoded = PeerMessage::decode(&message.encode().unwrap()).unwrap();
            assert_eq!(decoded, message);
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let value = Value::Map(vec![(
            Value::Text(TYPE_KEY.to_string()),
            Value::Integer(599u16.into()),
        )]);
        let mut buf = Vec::new();
        ciborium::into_writer(&value, &mut buf).unwrap();

        assert!(matches!(
            PeerMessage::decode(&buf),
            Err(WireError::UnknownMessageType(599))
        ));
    }

    #[test]
    fn test_missing_tag_and_garbage() {
        let value = Value::Map(vec![(
            Value::Text("publicKey".to_string()),
            Value::Text("pk".to_string()),
        )]);
        let mut buf = Vec::new();
        ciborium::into_writer(&value, &mut buf).unwrap();

        assert!(matches!(
            PeerMessage::decode(&buf),
            Err(WireError::MissingField(TYPE_KEY))
        ));
        assert!(matches!(
            PeerMessage::decode(b"\xff\xff"),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let value = Value::Map(vec![(
            Value::Text(TYPE_KEY.to_string()),
            Value::Integer(505u16.into()),
        )]);
        let mut buf = Vec::new();
        ciborium::into_writer(&value, &mut buf).unwrap();

        assert!(matches!(
            PeerMessage::decode(&buf),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_codec_handles_split_frames() {
        let mut codec = PeerCodec::new();
        let mut wire = BytesMut::new();
        codec.encode(broadcast(), &mut wire).unwrap();
        codec
            .encode(PeerMessage::failure("bye"), &mut wire)
            .unwrap();

        let mut partial = wire.split_to(5);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        partial.unsplit(wire);

        assert_eq!(codec.decode(&mut partial).unwrap(), Some(broadcast()));
        assert_eq!(
            codec.decode(&mut partial).unwrap(),
            Some(PeerMessage::failure("bye"))
        );
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn test_oversized_frame_rejected_before_writing() {
        let mut codec = PeerCodec::new();
        let mut wire = BytesMut::new();
        let huge = PeerMessage::Broadcast(GossipBroadcast {
            message: "A".repeat(MAX_FRAME_LEN),
            ..match broadcast() {
                PeerMessage::Broadcast(record) => record,
                _ => unreachable!(),
            }
        });

        assert!(matches!(
            codec.encode(huge, &mut wire),
            Err(WireError::FrameTooLarge(_))
        ));
        assert!(wire.is_empty());

        codec.encode(broadcast(), &mut wire).unwrap();
        assert_eq!(codec.decode(&mut wire).unwrap(), Some(broadcast()));
    }

    #[test]
    fn test_register_record_conversion() {
        let record = RegistrationRecord {
            challenge: vec![1u8; 64],
            nonce: vec![2u8; 64],
            public_key: "pk".to_string(),
            server_address: "127.0.0.1:4002".to_string(),
        };
        let wire = EnrollRegister::from_record(&record);
        assert_eq!(wire.to_record().unwrap(), record);

        let bad = EnrollRegister {
            nonce: "***".to_string(),
            ..wire
        };
        assert!(matches!(bad.to_record(), Err(WireError::Base64(_))));
    }
}
