use std::sync::{Arc, PoisonError, RwLock};

use crate::core::{Connection, ConnectionId};

/// A component's working copy of the registry's connection set.
///
/// Cloning shares the same underlying list. The view never decides
/// membership on its own; it only mirrors `Connected` / `Disconnected`
/// notifications delivered by the wiring.
#[derive(Debug, Clone, Default)]
pub struct ConnectionView {
    inner: Arc<RwLock<Vec<Arc<Connection>>>>,
}

impl ConnectionView {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, conn: &Arc<Connection>) {
        let mut list = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // A removal already under way must not be undone by a late insert
        if conn.is_detaching() {
            return;
        }
        if !list.iter().any(|c| Arc::ptr_eq(c, conn)) {
            list.push(Arc::clone(conn));
        }
    }

    pub(crate) fn remove(&self, conn: &Arc<Connection>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|c| !Arc::ptr_eq(c, conn));
    }

    pub(crate) fn clear(&self) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Copy of the current list, in registration order
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|c| c.id())
            .collect()
    }

    pub fn find(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|c| c.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
