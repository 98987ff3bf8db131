use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::relay::listener;
use crate::state::{RelaySettings, RelayState};

/// How long shutdown waits for connection actors to unregister themselves.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running relay: bound listener, accept loop, and the shared state.
pub struct Server {
    state: RelayState,
    local_addr: SocketAddr,
    accept_handle: JoinHandle<()>,
}

impl Server {
    /// Bind `addr` and start accepting connections in the background.
    pub async fn bind(addr: SocketAddr, settings: RelaySettings) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let state = RelayState::new(settings);
        let accept_handle = tokio::spawn(listener::accept_loop(listener, state.clone()));

        tracing::info!(
            addr = %local_addr,
            monitor_interval_ms = state.settings.monitor_interval.as_millis() as u64,
            max_payload_bytes = state.settings.max_payload_bytes,
            "Relay listening"
        );

        Ok(Self {
            state,
            local_addr,
            accept_handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Stop accepting, abandon pending handshakes, close every tracked
    /// connection, and give the connection actors a moment to finish their
    /// teardown.
    pub async fn shutdown(self) {
        self.state.begin_shutdown();
        if let Err(e) = self.accept_handle.await {
            tracing::warn!(error = %e, "Accept loop ended abnormally");
        }

        let connections = self.state.registry.snapshot();
        tracing::info!(connections = connections.len(), "Closing all connections");
        for conn in &connections {
            conn.close();
        }

        let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
            while !self.state.registry.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(remaining = self.state.registry.len(), "Connections still registered after shutdown");
        }
    }
}
