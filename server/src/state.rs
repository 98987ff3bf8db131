use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::proto::DEFAULT_MAX_PAYLOAD;
use crate::relay::ConnectionRegistry;

/// Runtime knobs shared by every connection.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// How often each connection's liveness monitor peeks at its socket.
    pub monitor_interval: Duration,
    /// How long a new connection may take to send its handshake.
    pub handshake_timeout: Duration,
    /// Largest payload accepted in a single frame.
    pub max_payload_bytes: usize,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            monitor_interval: Duration::from_secs(1),
            handshake_timeout: Duration::from_secs(30),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Shared relay state handed to the acceptor and every connection actor.
/// Created when the server starts and dropped when it stops.
#[derive(Clone)]
pub struct RelayState {
    /// Clients that have completed their handshake
    pub registry: ConnectionRegistry,
    pub settings: Arc<RelaySettings>,
    stopping: Arc<watch::Sender<bool>>,
}

impl RelayState {
    pub fn new(settings: RelaySettings) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            settings: Arc::new(settings),
            stopping: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Mark the relay as stopping. Connections still in their handshake
    /// are abandoned and new registrations are refused from here on.
    pub fn begin_shutdown(&self) {
        self.stopping.send_replace(true);
    }

    pub fn is_stopping(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Resolves once [`begin_shutdown`](Self::begin_shutdown) has been
    /// called, immediately if it already was.
    pub async fn stopped(&self) {
        let mut rx = self.stopping.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|stopping| *stopping).await;
    }

    /// Generate an identifier for a newly accepted connection.
    pub fn new_client_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
