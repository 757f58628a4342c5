//! Set of live connections.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use huddle_core::{ConnectionId, RelayError};

use super::connection::Connection;

/// Thread-safe registry of live, upgraded connections.
///
/// Locks are held only for the map mutation or the snapshot copy, never
/// while writing to a connection.
#[derive(Default)]
pub struct ConnectionRegistry {
    /// Keyed by time-ordered ID, so iteration follows connection creation
    /// order, not the order `register` was called.
    connections: RwLock<BTreeMap<ConnectionId, Arc<Connection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Rejects an ID that is already present.
    pub fn register(&self, connection: Arc<Connection>) -> Result<(), RelayError> {
        let mut conns = self.connections.write();
        match conns.entry(connection.id().clone()) {
            Entry::Occupied(entry) => Err(RelayError::DuplicateConnection(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(conn_id = %connection.id(), username = connection.username(), "connection registered");
                let _ = entry.insert(connection);
                Ok(())
            }
        }
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn deregister(&self, id: &ConnectionId) -> bool {
        let removed = self.connections.write().remove(id).is_some();
        if removed {
            debug!(conn_id = %id, "connection deregistered");
        }
        removed
    }

    /// Point-in-time copy of every registered connection, ordered by when
    /// each connection was created. The lock is released before this returns.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.read().contains_key(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }
}
