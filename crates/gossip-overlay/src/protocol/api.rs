//! Local-module frames.
//!
//! Every frame starts with `[u16 size][u16 type]`, big-endian, where `size`
//! counts the whole frame. The remaining four header bytes depend on the type:
//!
//! ```text
//! ANNOUNCE      [size][500][u8 ttl][u8 reserved][u16 data_type][payload]
//! NOTIFY        [size][501][u16 reserved][u16 data_type]
//! NOTIFICATION  [size][502][u16 message_id][u16 data_type][payload]
//! VALIDATION    [size][503][u16 message_id][u15 reserved | u1 valid]
//! ```

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message_type;
use crate::domain::{DataTypeId, WireError};

/// Fixed header length shared by all module frames.
pub const HEADER_LEN: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModuleMessage {
    Announce {
        ttl: u8,
        data_type: DataTypeId,
        payload: Vec<u8>,
    },
    Notify {
        data_type: DataTypeId,
    },
    Notification {
        message_id: u16,
        data_type: DataTypeId,
        payload: Vec<u8>,
    },
    Validation {
        message_id: u16,
        valid: bool,
    },
}

impl ModuleMessage {
    pub fn message_type(&self) -> u16 {
        match self {
            Self::Announce { .. } => message_type::ANNOUNCE,
            Self::Notify { .. } => message_type::NOTIFY,
            Self::Notification { .. } => message_type::NOTIFICATION,
            Self::Validation { .. } => message_type::VALIDATION,
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Self::Announce { payload, .. } | Self::Notification { payload, .. } => payload.len(),
            Self::Notify { .. } | Self::Validation { .. } => 0,
        }
    }
}

/// Codec for module frames; stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleCodec;

impl Decoder for ModuleCodec {
    type Item = ModuleMessage;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }
        let size = usize::from(u16::from_be_bytes([src[0], src[1]]));
        let kind = u16::from_be_bytes([src[2], src[3]]);

        if !matches!(
            kind,
            message_type::ANNOUNCE
                | message_type::NOTIFY
                | message_type::NOTIFICATION
                | message_type::VALIDATION
        ) {
            return Err(WireError::UnknownMessageType(kind));
        }
        if size < HEADER_LEN {
            return Err(WireError::FrameTooShort {
                length: size,
                minimum: HEADER_LEN,
            });
        }
        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(size);
        frame.advance(4);
        let message = match kind {
            message_type::ANNOUNCE => {
                let ttl = frame.get_u8();
                let _reserved = frame.get_u8();
                let data_type = frame.get_u16();
                ModuleMessage::Announce {
                    ttl,
                    data_type,
                    payload: frame.to_vec(),
                }
            }
            message_type::NOTIFY => {
                let _reserved = frame.get_u16();
                ModuleMessage::Notify {
                    data_type: frame.get_u16(),
                }
            }
            message_type::NOTIFICATION => {
                let message_id = frame.get_u16();
                let data_type = frame.get_u16();
                ModuleMessage::Notification {
                    message_id,
                    data_type,
                    payload: frame.to_vec(),
                }
            }
            _ => {
                let message_id = frame.get_u16();
                let flags = frame.get_u16();
                ModuleMessage::Validation {
                    message_id,
                    valid: flags & 1 == 1,
                }
            }
        };
        Ok(Some(message))
    }
}

impl Encoder<ModuleMessage> for ModuleCodec {
    type Error = WireError;

    fn encode(&mut self, item: ModuleMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = HEADER_LEN + item.payload_len();
        let wire_size = u16::try_from(size).map_err(|_| WireError::FrameTooLarge(size))?;

        dst.reserve(size);
        dst.put_u16(wire_size);
        dst.put_u16(item.message_type());
        match item {
            ModuleMessage::Announce {
                ttl,
                data_type,
                payload,
            } => {
                dst.put_u8(ttl);
                dst.put_u8(0);
                dst.put_u16(data_type);
                dst.put_slice(&payload);
            }
            ModuleMessage::Notify { data_type } => {
                dst.put_u16(0);
                dst.put_u16(data_type);
            }
            ModuleMessage::Notification {
                message_id,
                data_type,
                payload,
            } => {
                dst.put_u16(message_id);
                dst.put_u16(data_type);
                dst.put_slice(&payload);
            }
            ModuleMessage::Validation { message_id, valid } => {
                dst.put_u16(message_id);
                dst.put_u16(u16::from(valid));
            }
        }
        Ok(())
    }
}
