use super::stream::Connection;
use crate::utils::Slab;

/// A collection of live connections.
///
/// Servers usually keep every client they accepted and service them in
/// turn. Each inserted connection gets a stable key that stays valid
/// until it is removed; keys of removed connections are reused.
///
/// # Examples
///
/// ```rust
/// use overlink::{Connection, ConnectionSet};
///
/// let mut clients = ConnectionSet::new();
/// let key = clients.insert(Connection::new());
///
/// // An unconnected connection is pruned straight away.
/// assert_eq!(clients.prune(), 1);
/// assert!(clients.get_mut(key).is_none());
/// ```
pub struct ConnectionSet {
    slots: Slab<Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self { slots: Slab::new() }
    }

    /// Adds a connection and returns its key.
    pub fn insert(&mut self, connection: Connection) -> usize {
        self.slots.insert(connection)
    }

    /// Removes and returns the connection stored under `key`.
    pub fn remove(&mut self, key: usize) -> Option<Connection> {
        self.slots.remove(key)
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut Connection> {
        self.slots.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.len() == 0
    }

    /// Iterates over `(key, connection)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut Connection)> {
        self.slots.iter_mut()
    }

    /// Drops every connection that is no longer connected.
    ///
    /// Returns how many were dropped. Their sockets close unless another
    /// clone still holds them.
    pub fn prune(&mut self) -> usize {
        let removed = self.slots.retain(|connection| connection.connected());

        if removed > 0 {
            tracing::debug!(removed, remaining = self.slots.len(), "pruned connections");
        }

        removed
    }
}

impl Default for ConnectionSet {
    fn default() -> Self {
        Self::new()
    }
}
