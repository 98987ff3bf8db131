pub mod actor;
pub mod broadcast;
pub mod connection;
pub mod listener;
pub mod monitor;
pub mod protocol;

#[cfg(test)]
pub(crate) mod test_support;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

pub use connection::{Connection, Liveness};

/// Connection registry: every client that has completed its handshake and
/// has not yet torn down, keyed by connection id.
///
/// Cloning is cheap and every clone sees the same table. All operations are
/// safe to call concurrently without outside locking.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<String, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a connection. Returns false, leaving the existing entry in
    /// place, if the id is already taken.
    pub fn add(&self, id: &str, connection: Arc<Connection>) -> bool {
        match self.connections.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(connection);
                tracing::debug!(client_id = %id, total = self.connections.len(), "Connection registered");
                true
            }
        }
    }

    /// Remove a connection. Exactly one of any number of concurrent callers
    /// for the same id gets `Some`.
    pub fn remove(&self, id: &str) -> Option<Arc<Connection>> {
        let removed = self.connections.remove(id).map(|(_, conn)| conn);
        if removed.is_some() {
            tracing::debug!(client_id = %id, "Connection unregistered");
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.connections.contains_key(id)
    }

    /// Visit every connection registered at the moment of the call. The
    /// visitor may freely add to or remove from the registry.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<Connection>),
    {
        for conn in self.snapshot() {
            visitor(&conn);
        }
    }

    /// Point-in-time copy of all registered connections.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
