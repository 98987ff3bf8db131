//! Typed broadcast helpers for chat events.
//! Encode a payload and hand it to the relay's fan-out.

use crate::proto::{ChatMessage, Payload, UserInfo};
use crate::relay::broadcast::broadcast_to_all;
use crate::relay::Connection;
use crate::state::RelayState;

fn encode_or_log<P: Payload>(payload: &P) -> Option<Vec<u8>> {
    match payload.encode() {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(packet_type = %P::PACKET_TYPE, error = %e, "Failed to encode payload");
            None
        }
    }
}

/// Build the relay-side UserInfo for a registered connection.
pub fn user_info_for(conn: &Connection) -> UserInfo {
    UserInfo {
        sender_id: conn.id().to_string(),
        username: conn.username().to_string(),
        avatar: conn.avatar().to_vec(),
    }
}

/// Announce a newly joined user to everyone, the user included.
pub async fn broadcast_user_info(state: &RelayState, conn: &Connection) {
    let info = user_info_for(conn);
    if let Some(bytes) = encode_or_log(&info) {
        broadcast_to_all(state, UserInfo::PACKET_TYPE, &bytes).await;
    }
}

/// Relay a chat message from `sender_id` to everyone.
pub async fn broadcast_message(state: &RelayState, sender_id: &str, text: &str) {
    let message = ChatMessage {
        sender_id: sender_id.to_string(),
        text: text.to_string(),
    };
    if let Some(bytes) = encode_or_log(&message) {
        broadcast_to_all(state, ChatMessage::PACKET_TYPE, &bytes).await;
    }
}
