use std::fmt;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProtocolError, RelayError};

/// Size of the fixed frame header: packet type + payload length.
pub const HEADER_LEN: usize = 8;

/// Default cap on a single payload (8 MiB). Avatars are the largest thing
/// clients send.
pub const DEFAULT_MAX_PAYLOAD: usize = 8 * 1024 * 1024;

/// Packet type tag carried in the first header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    UserInfo = 0,
    Message = 1,
    Disconnect = 2,
}

impl PacketType {
    pub fn as_i32(&self) -> i32 {
        *self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInfo => "UserInfo",
            Self::Message => "Message",
            Self::Disconnect => "Disconnect",
        }
    }
}

impl TryFrom<i32> for PacketType {
    type Error = ProtocolError;

    fn try_from(tag: i32) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::UserInfo),
            1 => Ok(Self::Message),
            2 => Ok(Self::Disconnect),
            other => Err(ProtocolError::UnknownPacketType(other)),
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded frame whose tag has not been interpreted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub tag: i32,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn packet_type(&self) -> Result<PacketType, ProtocolError> {
        PacketType::try_from(self.tag)
    }
}

/// Encode a typed packet into a complete frame.
pub fn encode(packet_type: PacketType, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    encode_raw(packet_type.as_i32(), payload)
}

/// Encode an arbitrary tag. Only clients exercising the server with
/// nonstandard packets need this directly.
pub fn encode_raw(tag: i32, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let length = i32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        length: payload.len(),
        limit: i32::MAX as usize,
    })?;

    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&tag.to_le_bytes());
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` when the stream ends before a full header arrives.
/// Short payload reads are resumed until the declared length is in hand;
/// the stream closing mid-payload is [`ProtocolError::Truncated`]. The
/// length is checked against `max_payload` before any buffer is allocated.
pub async fn read_frame<R>(reader: &mut R, max_payload: usize) -> Result<Option<RawFrame>, RelayError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            return Ok(None);
        }
        filled += n;
    }

    let tag = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let declared = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let length = usize::try_from(declared).map_err(|_| ProtocolError::NegativeLength {
        field: "payload",
        length: declared,
    })?;
    if length > max_payload {
        return Err(ProtocolError::PayloadTooLarge {
            length,
            limit: max_payload,
        }
        .into());
    }

    let mut payload = vec![0u8; length];
    let mut received = 0;
    while received < length {
        let n = reader.read(&mut payload[received..]).await?;
        if n == 0 {
            return Err(ProtocolError::Truncated {
                expected: length,
                received,
            }
            .into());
        }
        received += n;
    }

    Ok(Some(RawFrame { tag, payload }))
}
