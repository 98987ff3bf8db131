use std::time::Duration;

use tokio::net::TcpListener;

use crate::relay::actor;
use crate::state::RelayState;

/// Pause after a failed accept (e.g. out of file descriptors) before trying
/// again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections until the relay starts stopping, spawning one actor
/// per connection. Never waits on any single client.
pub async fn accept_loop(listener: TcpListener, state: RelayState) {
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer_addr)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!(peer = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                    }
                    tracing::debug!(peer = %peer_addr, "Accepted connection");
                    tokio::spawn(actor::run_connection(stream, peer_addr, state.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
            _ = state.stopped() => {
                tracing::debug!("Accept loop stopping");
                break;
            }
        }
    }
}
