//! The set of connected clients.
//!
//! Membership changes are rare (a join, a leave) while broadcasts happen
//! every tick from every client, so the map is copy-on-write: writers clone
//! it and swap the `Arc`, readers grab a snapshot and iterate it without
//! holding the lock.

use std::collections::HashMap;
use std::sync::Arc;

use duelnet_transport::ConnectionId;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// A frame shared by every recipient of one broadcast.
pub type SharedFrame = Arc<[u8]>;

/// The relay's way of reaching one client: its writer task's queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<SharedFrame>,
}

impl ClientHandle {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<SharedFrame>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// `false` once the client's writer task is gone.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Connected clients keyed by connection.
#[derive(Debug, Default)]
pub struct Registry {
    clients: RwLock<Arc<HashMap<ConnectionId, ClientHandle>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, handle: ClientHandle) {
        let mut guard = self.clients.write();
        let mut next = HashMap::clone(&guard);
        next.insert(handle.id, handle);
        *guard = Arc::new(next);
    }

    /// Deregisters `id`. Returns whether it was present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let mut guard = self.clients.write();
        if !guard.contains_key(&id) {
            return false;
        }
        let mut next = HashMap::clone(&guard);
        next.remove(&id);
        *guard = Arc::new(next);
        true
    }

    /// Drops every client. Their writer tasks finish and close the sockets.
    pub fn clear(&self) {
        *self.clients.write() = Arc::new(HashMap::new());
    }

    pub fn snapshot(&self) -> Arc<HashMap<ConnectionId, ClientHandle>> {
        Arc::clone(&self.clients.read())
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.read().contains_key(&id)
    }

    /// Queues `frame` to every client except `exclude`. Returns how many
    /// clients it was queued to; clients whose writer is gone are removed.
    pub fn broadcast(&self, frame: &SharedFrame, exclude: Option<ConnectionId>) -> usize {
        let snapshot = self.snapshot();
        let mut delivered = 0;
        let mut dead = Vec::new();

        for handle in snapshot.values() {
            if Some(handle.id) == exclude {
                continue;
            }
            if handle.tx.send(Arc::clone(frame)).is_ok() {
                delivered += 1;
            } else {
                dead.push(handle.id);
            }
        }

        for id in dead {
            debug!(%id, "removing client with closed writer");
            self.remove(id);
        }
        trace!(bytes = frame.len(), delivered, "broadcast");
        delivered
    }
}
