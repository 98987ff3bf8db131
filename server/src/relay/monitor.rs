//! Per-connection liveness monitor.
//!
//! Catches peers that went away without the read loop noticing yet. Every
//! interval it peeks one byte on the socket without consuming anything; a
//! zero-length peek or a failed probe tears the connection down. The task
//! ends on its own once its connection is no longer registered.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::relay::{actor, Connection, Liveness};
use crate::state::RelayState;

pub fn spawn(state: RelayState, conn: Arc<Connection>) -> JoinHandle<()> {
    tokio::spawn(run(state, conn))
}

async fn run(state: RelayState, conn: Arc<Connection>) {
    let mut ticker = interval(state.settings.monitor_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let still_registered = state
            .registry
            .get(conn.id())
            .is_some_and(|registered| Arc::ptr_eq(&registered, &conn));
        if !still_registered {
            break;
        }

        match conn.probe() {
            Liveness::Alive => continue,
            Liveness::Closed => {
                tracing::debug!(client_id = %conn.id(), "Peer closed its side");
            }
            Liveness::Failed(e) => {
                tracing::debug!(client_id = %conn.id(), error = %e, "Liveness probe failed");
            }
        }

        actor::disconnect(&state, conn.id()).await;
        break;
    }

    tracing::trace!(client_id = %conn.id(), "Liveness monitor stopped");
}
