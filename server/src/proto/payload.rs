//! Typed payload layouts carried inside frames.

use crate::error::ProtocolError;
use crate::proto::frame::{self, PacketType, RawFrame};

/// A payload shape bound to the packet type that carries it.
pub trait Payload: Sized {
    const PACKET_TYPE: PacketType;

    fn encode(&self) -> Result<Vec<u8>, ProtocolError>;

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError>;

    /// Encode the payload and wrap it in a frame.
    fn to_frame(&self) -> Result<Vec<u8>, ProtocolError> {
        frame::encode(Self::PACKET_TYPE, &self.encode()?)
    }
}

/// First packet a client sends: who it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub username: String,
    pub avatar: Vec<u8>,
}

impl Payload for Handshake {
    const PACKET_TYPE: PacketType = PacketType::UserInfo;

    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = PayloadWriter::new();
        w.put_string("username", &self.username)?;
        w.put_bytes("avatar", &self.avatar)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = PayloadReader::new(bytes);
        Ok(Self {
            username: r.read_string("username")?,
            avatar: r.read_bytes("avatar")?,
        })
    }
}

/// Identity of a connected user as relayed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub sender_id: String,
    pub username: String,
    pub avatar: Vec<u8>,
}

impl Payload for UserInfo {
    const PACKET_TYPE: PacketType = PacketType::UserInfo;

    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = PayloadWriter::new();
        w.put_string("sender_id", &self.sender_id)?;
        w.put_string("username", &self.username)?;
        w.put_bytes("avatar", &self.avatar)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = PayloadReader::new(bytes);
        Ok(Self {
            sender_id: r.read_string("sender_id")?,
            username: r.read_string("username")?,
            avatar: r.read_bytes("avatar")?,
        })
    }
}

/// Chat text sent by a client. The whole payload is the UTF-8 text;
/// invalid sequences are replaced rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub text: String,
}

impl Payload for OutgoingMessage {
    const PACKET_TYPE: PacketType = PacketType::Message;

    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(self.text.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Self {
            text: String::from_utf8_lossy(bytes).into_owned(),
        })
    }
}

/// Chat text relayed by the server, tagged with its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_id: String,
    pub text: String,
}

impl Payload for ChatMessage {
    const PACKET_TYPE: PacketType = PacketType::Message;

    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = PayloadWriter::new();
        w.put_string("sender_id", &self.sender_id)?;
        w.put_string("text", &self.text)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = PayloadReader::new(bytes);
        Ok(Self {
            sender_id: r.read_string("sender_id")?,
            text: r.read_string("text")?,
        })
    }
}

/// Announces that a user left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub sender_id: String,
}

impl Payload for Disconnect {
    const PACKET_TYPE: PacketType = PacketType::Disconnect;

    fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut w = PayloadWriter::new();
        w.put_string("sender_id", &self.sender_id)?;
        Ok(w.finish())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = PayloadReader::new(bytes);
        Ok(Self {
            sender_id: r.read_string("sender_id")?,
        })
    }
}

/// Anything the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    UserInfo(UserInfo),
    Message(ChatMessage),
    Disconnect(Disconnect),
}

impl ServerEvent {
    pub fn from_frame(frame: &RawFrame) -> Result<Self, ProtocolError> {
        match frame.packet_type()? {
            PacketType::UserInfo => UserInfo::decode(&frame.payload).map(Self::UserInfo),
            PacketType::Message => ChatMessage::decode(&frame.payload).map(Self::Message),
            PacketType::Disconnect => Disconnect::decode(&frame.payload).map(Self::Disconnect),
        }
    }
}

struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], ProtocolError> {
        let remaining = self.buf.len() - self.pos;
        if n > remaining {
            return Err(ProtocolError::ShortPayload {
                field,
                needed: n,
                remaining,
            });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_len(&mut self, field: &'static str) -> Result<usize, ProtocolError> {
        let raw = self.take(field, 4)?;
        let length = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        usize::try_from(length).map_err(|_| ProtocolError::NegativeLength { field, length })
    }

    fn read_bytes(&mut self, field: &'static str) -> Result<Vec<u8>, ProtocolError> {
        let n = self.read_len(field)?;
        Ok(self.take(field, n)?.to_vec())
    }

    fn read_string(&mut self, field: &'static str) -> Result<String, ProtocolError> {
        let n = self.read_len(field)?;
        let bytes = self.take(field, n)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8 { field })
    }
}

struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn put_len(&mut self, field: &'static str, length: usize) -> Result<(), ProtocolError> {
        let n = i32::try_from(length).map_err(|_| ProtocolError::FieldTooLarge { field, length })?;
        self.buf.extend_from_slice(&n.to_le_bytes());
        Ok(())
    }

    fn put_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<(), ProtocolError> {
        self.put_len(field, bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    fn put_string(&mut self, field: &'static str, s: &str) -> Result<(), ProtocolError> {
        self.put_bytes(field, s.as_bytes())
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_layout() {
        let handshake = Handshake {
            username: "alice".to_string(),
            avatar: vec![9, 8],
        };
        let bytes = handshake.encode().unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&5i32.to_le_bytes());
        expected.extend_from_slice(b"alice");
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(&[9, 8]);
        assert_eq!(bytes, expected);
        assert_eq!(Handshake::decode(&bytes).unwrap(), handshake);
    }

    #[test]
    fn test_user_info_with_empty_avatar() {
        let info = UserInfo {
            sender_id: "id-1".to_string(),
            username: "bob".to_string(),
            avatar: Vec::new(),
        };
        let decoded = UserInfo::decode(&info.encode().unwrap()).unwrap();
        assert_eq!(decoded, info);
    }

    #[test]
    fn test_multibyte_username() {
        let handshake = Handshake {
            username: "Zoë 🌙".to_string(),
            avatar: vec![],
        };
        let bytes = handshake.encode().unwrap();
        // length prefix counts bytes, not chars
        assert_eq!(&bytes[0..4], &("Zoë 🌙".len() as i32).to_le_bytes());
        assert_eq!(Handshake::decode(&bytes).unwrap(), handshake);
    }

    #[test]
    fn test_outgoing_message_is_raw_text() {
        let msg = OutgoingMessage {
            text: "hi".to_string(),
        };
        assert_eq!(msg.encode().unwrap(), b"hi");
        let lossy = OutgoingMessage::decode(&[b'o', b'k', 0xff]).unwrap();
        assert_eq!(lossy.text, "ok\u{fffd}");
    }

    #[test]
    fn test_truncated_string_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&10i32.to_le_bytes());
        bytes.extend_from_slice(b"abc");
        let err = Disconnect::decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::ShortPayload {
                field: "sender_id",
                needed: 10,
                remaining: 3
            }
        ));
    }

    #[test]
    fn test_missing_avatar_length_rejected() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.push(b'x');
        let err = Handshake::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::ShortPayload { field: "avatar", .. }));
    }

    #[test]
    fn test_negative_string_length_rejected() {
        let bytes = (-1i32).to_le_bytes();
        let err = Disconnect::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::NegativeLength { length: -1, .. }));
    }

    #[test]
    fn test_invalid_utf8_in_string_field() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&[0xc3, 0x28]);
        let err = Disconnect::decode(&bytes).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidUtf8 { field: "sender_id" }));
    }

    #[test]
    fn test_server_event_dispatch() {
        let msg = ChatMessage {
            sender_id: "abc".to_string(),
            text: "hello".to_string(),
        };
        let frame = RawFrame {
            tag: PacketType::Message.as_i32(),
            payload: msg.encode().unwrap(),
        };
        assert_eq!(ServerEvent::from_frame(&frame).unwrap(), ServerEvent::Message(msg));

        let unknown = RawFrame {
            tag: 7,
            payload: Vec::new(),
        };
        assert!(ServerEvent::from_frame(&unknown).is_err());
    }
}
