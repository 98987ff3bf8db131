use std::sync::Arc;

use futures_util::future::join_all;

use crate::proto::{self, PacketType};
use crate::relay::actor;
use crate::relay::Connection;
use crate::state::RelayState;

/// Write one frame to each target concurrently. Returns the targets whose
/// write failed; the caller decides what to do with them.
pub async fn fan_out(targets: &[Arc<Connection>], frame: &[u8]) -> Vec<Arc<Connection>> {
    let writes = targets.iter().map(|conn| async move {
        match conn.send_frame(frame).await {
            Ok(()) => None,
            Err(e) => {
                tracing::debug!(client_id = %conn.id(), error = %e, "Write failed during broadcast");
                Some(Arc::clone(conn))
            }
        }
    });

    join_all(writes).await.into_iter().flatten().collect()
}

/// Broadcast a packet to every registered connection, sender included.
///
/// A recipient whose write fails is disconnected (which in turn announces
/// its departure); delivery to the others is unaffected and nothing is
/// reported back to the caller.
pub async fn broadcast_to_all(state: &RelayState, packet_type: PacketType, payload: &[u8]) {
    let frame = match proto::encode(packet_type, payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(packet_type = %packet_type, error = %e, "Failed to encode broadcast frame");
            return;
        }
    };

    let failed = fan_out(&state.registry.snapshot(), &frame).await;
    for conn in failed {
        actor::disconnect(state, conn.id()).await;
    }
}

/// Send a packet to one connection. Returns false if the receiver is not
/// registered or the write failed (in which case it has been disconnected).
pub async fn send_to(state: &RelayState, receiver_id: &str, packet_type: PacketType, payload: &[u8]) -> bool {
    let Some(conn) = state.registry.get(receiver_id) else {
        return false;
    };

    let frame = match proto::encode(packet_type, payload) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(packet_type = %packet_type, error = %e, "Failed to encode frame");
            return false;
        }
    };

    match conn.send_frame(&frame).await {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(client_id = %receiver_id, error = %e, "Write failed");
            actor::disconnect(state, receiver_id).await;
            false
        }
    }
}
