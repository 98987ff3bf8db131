//! Binary wire protocol.
//!
//! Every packet travels as one frame: an 8-byte header (little-endian `i32`
//! packet type, little-endian `i32` payload length) followed by the payload.
//! Payload layouts live in [`payload`]; strings and blobs inside a payload
//! carry a fixed 4-byte little-endian length prefix.

pub mod frame;
pub mod payload;

pub use frame::{encode, encode_raw, read_frame, PacketType, RawFrame, DEFAULT_MAX_PAYLOAD, HEADER_LEN};
pub use payload::{
    ChatMessage, Disconnect, Handshake, OutgoingMessage, Payload, ServerEvent, UserInfo,
};
