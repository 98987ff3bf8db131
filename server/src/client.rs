//! Minimal async client for the relay protocol.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::RelayError;
use crate::proto::{read_frame, Handshake, OutgoingMessage, Payload, ServerEvent, DEFAULT_MAX_PAYLOAD};

pub struct RelayClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    max_payload: usize,
}

impl RelayClient {
    /// Open a connection without sending anything yet.
    pub async fn connect(addr: SocketAddr) -> Result<Self, RelayError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader,
            writer,
            max_payload: DEFAULT_MAX_PAYLOAD,
        })
    }

    /// Connect and send the handshake.
    pub async fn join(addr: SocketAddr, username: &str, avatar: &[u8]) -> Result<Self, RelayError> {
        let mut client = Self::connect(addr).await?;
        client
            .send(&Handshake {
                username: username.to_string(),
                avatar: avatar.to_vec(),
            })
            .await?;
        Ok(client)
    }

    pub async fn send_message(&mut self, text: &str) -> Result<(), RelayError> {
        self.send(&OutgoingMessage {
            text: text.to_string(),
        })
        .await
    }

    pub async fn send<P: Payload>(&mut self, payload: &P) -> Result<(), RelayError> {
        let frame = payload.to_frame()?;
        self.send_frame(&frame).await
    }

    /// Write pre-encoded bytes as-is.
    pub async fn send_frame(&mut self, frame: &[u8]) -> Result<(), RelayError> {
        self.writer.write_all(frame).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next packet from the server, or `None` once the server closed the
    /// connection.
    pub async fn next_event(&mut self) -> Result<Option<ServerEvent>, RelayError> {
        match read_frame(&mut self.reader, self.max_payload).await? {
            Some(frame) => Ok(Some(ServerEvent::from_frame(&frame)?)),
            None => Ok(None),
        }
    }

    /// Close the write side and drop the connection.
    pub async fn close(mut self) -> Result<(), RelayError> {
        self.writer.shutdown().await?;
        Ok(())
    }
}
