//! Loopback socket fixtures for relay unit tests.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::relay::Connection;
use crate::state::RelayState;

/// Build a server-side `Connection` over a real loopback socket and return
/// it with the client end of the socket.
pub(crate) async fn accepted_connection(id: &str, username: &str) -> (Arc<Connection>, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, peer_addr) = listener.accept().await.unwrap();

    let control = Connection::control_handle(&server).unwrap();
    let (_reader, writer) = server.into_split();
    let conn = Connection::new(
        id.to_string(),
        username.to_string(),
        Vec::new(),
        peer_addr,
        writer,
        control,
    );
    (Arc::new(conn), client)
}

/// Same as [`accepted_connection`] but with a fresh id, already registered.
pub(crate) async fn register_peer(state: &RelayState, username: &str) -> (Arc<Connection>, TcpStream) {
    let id = state.new_client_id();
    let (conn, client) = accepted_connection(&id, username).await;
    assert!(state.registry.add(&id, Arc::clone(&conn)));
    (conn, client)
}
