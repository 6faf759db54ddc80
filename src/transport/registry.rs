//! # Connection Registry
//!
//! The authoritative, ordered set of live connections.
//!
//! ## Notification ordering
//! - `add` appends first, then raises `Connected`, so listeners already see
//!   the new entry.
//! - `remove` / `remove_at` raise `Disconnected` while the entry is still
//!   listed, then remove it.
//!
//! No lock is held while notifications are delivered, so handlers may read
//! the registry and may also add or remove connections, including the one
//! they are being told about. Each connection is removed at most once: the
//! first remover claims it, later attempts are no-ops.

use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::core::{Connection, ConnectionId};
use crate::error::{Result, TransportError};
use crate::protocol::{Event, EventHub};

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: RwLock<Vec<Arc<Connection>>>,
    events: EventHub<Event>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hub raising `Connected` / `Disconnected` for this registry
    pub fn events(&self) -> &EventHub<Event> {
        &self.events
    }

    /// Append `conn` unless the same handle is already present or was
    /// already removed once.
    ///
    /// Returns true if the connection was added.
    pub fn add(&self, conn: Arc<Connection>) -> Result<bool> {
        if conn.is_detaching() {
            return Ok(false);
        }
        {
            let mut entries = self.write_entries()?;
            if entries.iter().any(|c| Arc::ptr_eq(c, &conn)) {
                return Ok(false);
            }
            entries.push(Arc::clone(&conn));
        }

        debug!(conn_id = %conn.id(), peer = %conn.peer_addr(), "Connection registered");
        self.events.emit(&Event::Connected(conn));
        Ok(true)
    }

    /// Remove `conn` if present. Absent connections are a silent no-op.
    pub fn remove(&self, conn: &Arc<Connection>) -> Result<bool> {
        if !self.contains(conn)? {
            return Ok(false);
        }
        self.detach(conn)
    }

    /// Remove the connection at `index`
    pub fn remove_at(&self, index: usize) -> Result<Arc<Connection>> {
        let conn = self.get(index)?;
        self.detach(&conn)?;
        Ok(conn)
    }

    /// Remove the connection with the given id, if any
    pub fn remove_by_id(&self, id: ConnectionId) -> Result<Option<Arc<Connection>>> {
        match self.find(id)? {
            Some(conn) => {
                self.detach(&conn)?;
                Ok(Some(conn))
            }
            None => Ok(None),
        }
    }

    // Notify while the entry is listed, then drop it by identity: handlers may
    // have shifted every index in the meantime.
    fn detach(&self, conn: &Arc<Connection>) -> Result<bool> {
        if !conn.begin_detach() {
            return Ok(false);
        }

        self.events.emit(&Event::Disconnected(Arc::clone(conn)));

        self.write_entries()?.retain(|c| !Arc::ptr_eq(c, conn));
        conn.mark_closed();
        debug!(conn_id = %conn.id(), peer = %conn.peer_addr(), "Connection unregistered");
        Ok(true)
    }

    /// Drop every entry without raising notifications.
    ///
    /// Used at teardown once all subscribers have been detached.
    pub fn clear_silently(&self) -> Result<Vec<Arc<Connection>>> {
        let drained: Vec<_> = self.write_entries()?.drain(..).collect();
        for conn in &drained {
            conn.mark_closed();
        }
        Ok(drained)
    }

    /// A defensive copy of the current entries, in insertion order
    pub fn snapshot(&self) -> Result<Vec<Arc<Connection>>> {
        Ok(self.read_entries()?.clone())
    }

    pub fn get(&self, index: usize) -> Result<Arc<Connection>> {
        let entries = self.read_entries()?;
        entries
            .get(index)
            .cloned()
            .ok_or(TransportError::OutOfRange {
                index,
                len: entries.len(),
            })
    }

    pub fn find(&self, id: ConnectionId) -> Result<Option<Arc<Connection>>> {
        Ok(self.read_entries()?.iter().find(|c| c.id() == id).cloned())
    }

    pub fn contains(&self, conn: &Arc<Connection>) -> Result<bool> {
        Ok(self.read_entries()?.iter().any(|c| Arc::ptr_eq(c, conn)))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_entries()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_entries()?.is_empty())
    }

    fn read_entries(&self) -> Result<RwLockReadGuard<'_, Vec<Arc<Connection>>>> {
        self.entries.read().map_err(|_| TransportError::LockPoisoned)
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.entries.write();
            panic!("poisoning registry entries");
        }));
    }

    fn write_entries(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<Arc<Connection>>>> {
        self.entries.write().map_err(|_| TransportError::LockPoisoned)
    }
}
