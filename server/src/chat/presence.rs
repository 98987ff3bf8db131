//! Roster sync for a newly joined client.

use crate::chat::broadcast::user_info_for;
use crate::proto::{Payload, UserInfo};
use crate::relay::broadcast::send_to;
use crate::state::RelayState;

/// Send `receiver_id` one UserInfo packet per other registered user.
///
/// Stops early if the receiver goes away mid-sync. Returns the number of
/// packets delivered.
pub async fn send_users_info(state: &RelayState, receiver_id: &str) -> usize {
    let mut sent = 0;
    for peer in state.registry.snapshot() {
        if peer.id() == receiver_id {
            continue;
        }

        let bytes = match user_info_for(&peer).encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(client_id = %peer.id(), error = %e, "Failed to encode user info");
                continue;
            }
        };

        if !send_to(state, receiver_id, UserInfo::PACKET_TYPE, &bytes).await {
            break;
        }
        sent += 1;
    }

    tracing::debug!(client_id = %receiver_id, peers = sent, "Sent roster to new client");
    sent
}
