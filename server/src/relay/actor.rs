use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use crate::chat;
use crate::error::RelayError;
use crate::proto::{read_frame, Disconnect, Payload};
use crate::relay::broadcast::fan_out;
use crate::relay::{monitor, protocol, Connection};
use crate::state::RelayState;

/// Drive one accepted connection from handshake to teardown.
///
/// ```text
/// AwaitingHandshake --UserInfo--> Active --read ends--> Disconnected
///         \_____________anything else____________________/
/// ```
///
/// A connection that never completes its handshake is dropped without
/// being registered or announced.
pub async fn run_connection(stream: TcpStream, peer_addr: SocketAddr, state: RelayState) {
    let client_id = state.new_client_id();

    let control = match Connection::control_handle(&stream) {
        Ok(control) => control,
        Err(e) => {
            tracing::warn!(peer = %peer_addr, error = %e, "Failed to duplicate socket handle");
            return;
        }
    };
    let (mut reader, writer) = stream.into_split();

    let handshake = tokio::select! {
        result = protocol::await_handshake(&mut reader, &state) => match result {
            Ok(handshake) => handshake,
            Err(e) => {
                tracing::warn!(peer = %peer_addr, error = %e, "Closing connection before handshake");
                return;
            }
        },
        _ = state.stopped() => {
            tracing::debug!(peer = %peer_addr, "Relay stopping, dropping pending handshake");
            return;
        }
    };

    let conn = Arc::new(Connection::new(
        client_id.clone(),
        handshake.username,
        handshake.avatar,
        peer_addr,
        writer,
        control,
    ));

    if !state.registry.add(&client_id, Arc::clone(&conn)) {
        let err = RelayError::DuplicateId(client_id);
        tracing::error!(peer = %peer_addr, error = %err, "Refusing connection");
        conn.close();
        return;
    }

    // Shutdown may have snapshotted the registry just before this entry
    // landed; whichever side runs second sees the other.
    if state.is_stopping() {
        state.registry.remove(conn.id());
        conn.close();
        tracing::debug!(peer = %peer_addr, "Relay stopping, refusing registration");
        return;
    }

    tracing::info!(
        client_id = %conn.id(),
        peer = %peer_addr,
        "{} connected!",
        conn.username()
    );

    monitor::spawn(state.clone(), Arc::clone(&conn));

    chat::broadcast::broadcast_user_info(&state, &conn).await;
    chat::presence::send_users_info(&state, conn.id()).await;

    match read_loop(&mut reader, &state, &conn).await {
        Ok(()) => tracing::debug!(client_id = %conn.id(), "Stream ended"),
        Err(e) => tracing::debug!(client_id = %conn.id(), error = %e, "Read loop ended"),
    }

    disconnect(&state, conn.id()).await;
}

async fn read_loop(reader: &mut OwnedReadHalf, state: &RelayState, conn: &Connection) -> Result<(), RelayError> {
    while let Some(frame) = read_frame(&mut *reader, state.settings.max_payload_bytes).await? {
        protocol::handle_frame(frame, state, conn).await?;
    }
    Ok(())
}

/// Tear down a connection: remove it from the registry, close its socket,
/// and announce its departure to everyone left.
///
/// Safe to call any number of times from any task; only the call that
/// actually removes the entry does anything. Recipients whose write fails
/// while the departure is announced are torn down the same way, one after
/// another, without recursion.
pub async fn disconnect(state: &RelayState, client_id: &str) {
    let mut pending = VecDeque::from([client_id.to_string()]);

    while let Some(id) = pending.pop_front() {
        let Some(conn) = state.registry.remove(&id) else {
            continue;
        };

        let connected_for = Utc::now().signed_duration_since(conn.joined_at());
        tracing::info!(
            client_id = %id,
            peer = %conn.peer_addr(),
            connected_secs = connected_for.num_seconds(),
            "{} disconnected!",
            conn.username()
        );
        conn.close();

        let frame = match (Disconnect { sender_id: id.clone() }).to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(client_id = %id, error = %e, "Failed to encode disconnect");
                continue;
            }
        };

        let failed = fan_out(&state.registry.snapshot(), &frame).await;
        pending.extend(failed.iter().map(|c| c.id().to_string()));
    }
}
