use tokio::io::AsyncRead;
use tokio::time::timeout;

use crate::chat;
use crate::error::RelayError;
use crate::proto::{read_frame, Handshake, OutgoingMessage, PacketType, Payload, RawFrame};
use crate::relay::Connection;
use crate::state::RelayState;

/// Read the first packet of a new connection and decode it as a handshake.
///
/// Anything but a well-formed UserInfo packet within the handshake timeout
/// is a rejection.
pub async fn await_handshake<R>(reader: &mut R, state: &RelayState) -> Result<Handshake, RelayError>
where
    R: AsyncRead + Unpin,
{
    let read = read_frame(reader, state.settings.max_payload_bytes);
    let frame = match timeout(state.settings.handshake_timeout, read).await {
        Err(_) => return Err(RelayError::HandshakeRejected("timed out".to_string())),
        Ok(Ok(None)) => {
            return Err(RelayError::HandshakeRejected(
                "stream closed before handshake".to_string(),
            ))
        }
        Ok(Ok(Some(frame))) => frame,
        Ok(Err(e)) => return Err(e),
    };

    match frame.packet_type()? {
        PacketType::UserInfo => Ok(Handshake::decode(&frame.payload)?),
        other => Err(RelayError::HandshakeRejected(format!(
            "expected UserInfo, got {other}"
        ))),
    }
}

/// Handle one packet from an active connection. An `Err` ends the
/// connection's read loop.
pub async fn handle_frame(frame: RawFrame, state: &RelayState, conn: &Connection) -> Result<(), RelayError> {
    match frame.packet_type()? {
        PacketType::Message => {
            let message = OutgoingMessage::decode(&frame.payload)?;
            tracing::info!(
                client_id = %conn.id(),
                username = %conn.username(),
                "[{}] {}",
                conn.username(),
                message.text
            );
            chat::broadcast::broadcast_message(state, conn.id(), &message.text).await;
            Ok(())
        }
        other => Err(RelayError::UnexpectedPacket(other)),
    }
}
