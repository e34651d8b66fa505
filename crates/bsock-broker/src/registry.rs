//! Owner-scoped socket resource registry.
//!
//! The registry is the only structure touched by both the control context
//! and the device worker; every mutation goes through its single `RwLock`,
//! so a device callback writing state and a concurrent close removing the
//! entry cannot lose updates against each other. The registry itself holds
//! no device handles beyond storage and performs no I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use bsock_core::{Error, Result, ServiceId, SocketId, SocketInfo, SocketProperties, SocketState};

use crate::adapter::DeviceSocket;

/// One open or pending socket, as known to the broker.
#[derive(Debug, Clone)]
pub struct SocketResource {
    pub id: SocketId,
    pub owner: String,
    pub name: Option<String>,
    pub persistent: bool,
    pub buffer_size: Option<u32>,
    pub paused: bool,
    pub state: SocketState,
    pub remote_address: Option<String>,
    pub service_id: Option<ServiceId>,
    /// Device-level handle, exclusively owned by this resource. Released on
    /// close or disconnect.
    pub handle: Option<Arc<dyn DeviceSocket>>,
    /// True while a mutating device operation is in flight for this socket.
    pub(crate) pending: bool,
}

impl SocketResource {
    /// Create an unbound resource for `owner`. The id is assigned when the
    /// resource is added to a registry.
    pub fn new(owner: &str) -> Self {
        Self {
            id: 0,
            owner: owner.to_string(),
            name: None,
            persistent: false,
            buffer_size: None,
            paused: false,
            state: SocketState::Unbound,
            remote_address: None,
            service_id: None,
            handle: None,
            pending: false,
        }
    }

    /// Merge properties into this resource. Only fields present in `props`
    /// are changed.
    pub fn apply_properties(&mut self, props: &SocketProperties) {
        if let Some(name) = &props.name {
            self.name = Some(name.clone());
        }
        if let Some(persistent) = props.persistent {
            self.persistent = persistent;
        }
        if let Some(buffer_size) = props.buffer_size {
            // Checked against the payload length when a send is issued.
            self.buffer_size = Some(buffer_size);
        }
    }

    /// Snapshot the externally visible fields.
    pub fn info(&self) -> SocketInfo {
        let connected = self.state.is_connected();
        SocketInfo {
            id: self.id,
            name: self.name.clone(),
            persistent: self.persistent,
            buffer_size: self.buffer_size,
            paused: self.paused,
            connected,
            remote_address: if connected {
                self.remote_address.clone()
            } else {
                None
            },
            service_id: self.service_id.clone(),
        }
    }
}

/// Keyed store of socket resources with stable, process-unique ids.
///
/// All lookups are scoped by `(owner, id)`; a socket is never visible to a
/// different owner than the one that created it.
pub struct ResourceRegistry {
    sockets: RwLock<HashMap<SocketId, SocketResource>>,
    next_id: AtomicU64,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            sockets: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Store a resource, assigning it a fresh id. Ids are never reused
    /// while the process runs.
    pub async fn add(&self, mut resource: SocketResource) -> SocketId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        resource.id = id;
        let mut sockets = self.sockets.write().await;
        sockets.insert(id, resource);
        id
    }

    /// Scoped lookup returning a snapshot of the resource.
    pub async fn get(&self, owner: &str, id: SocketId) -> Result<SocketResource> {
        let sockets = self.sockets.read().await;
        sockets
            .get(&id)
            .filter(|socket| socket.owner == owner)
            .cloned()
            .ok_or(Error::SocketNotFound(id))
    }

    /// Mutate a resource in place, returning the closure's result.
    pub async fn update<F, R>(&self, owner: &str, id: SocketId, f: F) -> Result<R>
    where
        F: FnOnce(&mut SocketResource) -> R,
    {
        let mut sockets = self.sockets.write().await;
        sockets
            .get_mut(&id)
            .filter(|socket| socket.owner == owner)
            .map(f)
            .ok_or(Error::SocketNotFound(id))
    }

    /// Remove a resource. Idempotent: removing an absent id is a no-op,
    /// since races between an explicit close and device-initiated teardown
    /// are expected. Returns the removed resource so the caller can release
    /// its handle.
    pub async fn remove(&self, owner: &str, id: SocketId) -> Option<SocketResource> {
        let mut sockets = self.sockets.write().await;
        if sockets.get(&id).is_some_and(|socket| socket.owner == owner) {
            sockets.remove(&id)
        } else {
            None
        }
    }

    /// Ids of all resources owned by `owner`.
    pub async fn ids(&self, owner: &str) -> Vec<SocketId> {
        let sockets = self.sockets.read().await;
        sockets
            .values()
            .filter(|socket| socket.owner == owner)
            .map(|socket| socket.id)
            .collect()
    }

    /// Info snapshots of all resources owned by `owner`.
    pub async fn infos(&self, owner: &str) -> Vec<SocketInfo> {
        let sockets = self.sockets.read().await;
        sockets
            .values()
            .filter(|socket| socket.owner == owner)
            .map(|socket| socket.info())
            .collect()
    }

    /// Remove every resource owned by `owner`, returning them so their
    /// handles can be released. Used when a client detaches.
    pub async fn remove_owner(&self, owner: &str) -> Vec<SocketResource> {
        let mut sockets = self.sockets.write().await;
        let ids: Vec<SocketId> = sockets
            .values()
            .filter(|socket| socket.owner == owner)
            .map(|socket| socket.id)
            .collect();
        let removed: Vec<SocketResource> = ids
            .into_iter()
            .filter_map(|id| sockets.remove(&id))
            .collect();
        if !removed.is_empty() {
            debug!(owner, count = removed.len(), "removed all sockets for owner");
        }
        removed
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
