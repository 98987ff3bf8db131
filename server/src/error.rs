use std::net::AddrParseError;

use thiserror::Error;

use crate::proto::PacketType;

/// Malformed or truncated wire data. Always fatal to the offending
/// connection, never to the server.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("stream closed mid-payload: expected {expected} bytes, received {received}")]
    Truncated { expected: usize, received: usize },

    #[error("negative length {length} for `{field}`")]
    NegativeLength { field: &'static str, length: i32 },

    #[error("payload length {length} exceeds limit of {limit} bytes")]
    PayloadTooLarge { length: usize, limit: usize },

    #[error("`{field}` is too large to encode ({length} bytes)")]
    FieldTooLarge { field: &'static str, length: usize },

    #[error("unknown packet type {0}")]
    UnknownPacketType(i32),

    #[error("`{field}` needs {needed} bytes but only {remaining} remain")]
    ShortPayload {
        field: &'static str,
        needed: usize,
        remaining: usize,
    },

    #[error("`{field}` is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

/// Errors that end a single connection's lifecycle.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("unexpected {0} packet")]
    UnexpectedPacket(PacketType),

    #[error("connection id {0} is already registered")]
    DuplicateId(String),
}

/// Startup configuration errors surfaced from `main`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid bind address `{address}`: {source}")]
    InvalidBindAddress {
        address: String,
        source: AddrParseError,
    },
}
