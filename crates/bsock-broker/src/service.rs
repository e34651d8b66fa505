//! Command surface of the broker.
//!
//! `SocketService` methods run on the caller's (control) context: they
//! validate input, consult the registry, and either complete synchronously
//! or dispatch one device operation and await its reply. For a given socket
//! at most one mutating device operation may be outstanding; overlapping
//! calls fail fast with [`Error::Busy`] instead of queueing, which keeps
//! callback ordering per socket unambiguous.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use bsock_core::{
    Error, ListenMode, Result, ServiceId, SocketEvent, SocketId, SocketInfo, SocketProperties,
    DEVICE_QUEUE_DEPTH,
};

use crate::adapter::DeviceAdapter;
use crate::capabilities::Capabilities;
use crate::device::{DeviceRequest, DeviceWorker};
use crate::events::EventSink;
use crate::registry::{ResourceRegistry, SocketResource};

/// Runtime knobs for the broker.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Depth of the device worker's request queue.
    pub device_queue_depth: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            device_queue_depth: DEVICE_QUEUE_DEPTH,
        }
    }
}

/// The public-facing operation surface over a shared device adapter.
///
/// One instance serves many owners; every lookup is scoped by
/// `(owner, socket id)`. Construction spawns the device worker task, which
/// stops when the service is dropped.
pub struct SocketService {
    registry: Arc<ResourceRegistry>,
    capabilities: Arc<dyn Capabilities>,
    events: Arc<dyn EventSink>,
    device_tx: mpsc::Sender<DeviceRequest>,
}

impl SocketService {
    pub fn new(
        adapter: Arc<dyn DeviceAdapter>,
        capabilities: Arc<dyn Capabilities>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::with_config(adapter, capabilities, events, ServiceConfig::default())
    }

    pub fn with_config(
        adapter: Arc<dyn DeviceAdapter>,
        capabilities: Arc<dyn Capabilities>,
        events: Arc<dyn EventSink>,
        config: ServiceConfig,
    ) -> Self {
        let registry = Arc::new(ResourceRegistry::new());
        let (device_tx, device_rx) = mpsc::channel(config.device_queue_depth);
        let worker = DeviceWorker::new(adapter, registry.clone(), events.clone(), device_rx);
        tokio::spawn(worker.run());
        Self {
            registry,
            capabilities,
            events,
            device_tx,
        }
    }

    /// Allocate a new unbound socket, applying any initial properties.
    pub async fn create(&self, owner: &str, properties: Option<&SocketProperties>) -> SocketId {
        let mut socket = SocketResource::new(owner);
        if let Some(props) = properties {
            socket.apply_properties(props);
        }
        let id = self.registry.add(socket).await;
        info!(owner, socket_id = id, "socket created");
        id
    }

    /// Merge the fields present in `properties`; absent fields are
    /// untouched.
    pub async fn update(
        &self,
        owner: &str,
        id: SocketId,
        properties: &SocketProperties,
    ) -> Result<()> {
        self.registry
            .update(owner, id, |socket| socket.apply_properties(properties))
            .await
    }

    /// Pause or resume inbound-data delivery. A pause-to-resume transition
    /// fires a `Resumed` event.
    pub async fn set_paused(&self, owner: &str, id: SocketId, paused: bool) -> Result<()> {
        let resumed = self
            .registry
            .update(owner, id, |socket| {
                let changed = socket.paused != paused;
                socket.paused = paused;
                changed && !paused
            })
            .await?;
        if resumed {
            self.events.publish(owner, id, SocketEvent::Resumed);
        }
        Ok(())
    }

    /// Register an RFCOMM listening service on the socket.
    pub async fn listen_rfcomm(
        &self,
        owner: &str,
        id: SocketId,
        service_id: &str,
        channel: Option<u16>,
    ) -> Result<()> {
        self.listen(owner, id, ListenMode::Rfcomm { channel }, service_id)
            .await
    }

    /// Register an L2CAP listening service on the socket.
    pub async fn listen_l2cap(
        &self,
        owner: &str,
        id: SocketId,
        service_id: &str,
        psm: Option<u16>,
    ) -> Result<()> {
        self.listen(owner, id, ListenMode::L2cap { psm }, service_id)
            .await
    }

    async fn listen(
        &self,
        owner: &str,
        id: SocketId,
        mode: ListenMode,
        service_id: &str,
    ) -> Result<()> {
        // Existence, then well-formedness, then capability; the busy check
        // is the atomic check-and-set inside mark_pending. Malformed ids
        // never reach the device layer.
        self.registry.get(owner, id).await?;
        let service_id = ServiceId::parse(service_id)?;
        self.check_capability(owner, &service_id)?;
        self.mark_pending(owner, id).await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch(
            owner,
            id,
            DeviceRequest::Listen {
                owner: owner.to_string(),
                id,
                mode,
                service_id,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(owner, id, reply_rx).await
    }

    /// Connect the socket to the peer at `address` on `service_id`.
    pub async fn connect(
        &self,
        owner: &str,
        id: SocketId,
        address: &str,
        service_id: &str,
    ) -> Result<()> {
        self.registry.get(owner, id).await?;
        let service_id = ServiceId::parse(service_id)?;
        self.check_capability(owner, &service_id)?;
        self.mark_pending(owner, id).await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch(
            owner,
            id,
            DeviceRequest::Connect {
                owner: owner.to_string(),
                id,
                address: address.to_string(),
                service_id,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(owner, id, reply_rx).await
    }

    /// Release the socket's device handle. The socket always ends up
    /// Disconnected, even when it never held a connection.
    pub async fn disconnect(&self, owner: &str, id: SocketId) -> Result<()> {
        self.mark_pending(owner, id).await?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch(
            owner,
            id,
            DeviceRequest::Disconnect {
                owner: owner.to_string(),
                id,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(owner, id, reply_rx).await
    }

    /// Forward bytes to the connected peer, returning the count sent.
    pub async fn send(&self, owner: &str, id: SocketId, payload: Bytes) -> Result<usize> {
        // Busy, state, and handle are checked in one registry transaction,
        // so a disconnect completing in between cannot hand us a handle it
        // has already released.
        let handle = self
            .registry
            .update(owner, id, |socket| {
                if socket.pending {
                    return Err(Error::Busy(socket.id));
                }
                if !socket.state.is_connected() {
                    return Err(Error::NotConnected { id: socket.id });
                }
                // Buffer size is validated against the payload here, not
                // when the property is set.
                if let Some(buffer_size) = socket.buffer_size {
                    if payload.len() > buffer_size as usize {
                        return Err(Error::PayloadTooLarge {
                            len: payload.len(),
                            buffer_size,
                        });
                    }
                }
                let handle = socket
                    .handle
                    .clone()
                    .ok_or(Error::NotConnected { id: socket.id })?;
                socket.pending = true;
                Ok(handle)
            })
            .await??;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.dispatch(
            owner,
            id,
            DeviceRequest::Send {
                owner: owner.to_string(),
                id,
                handle,
                payload,
                reply: reply_tx,
            },
        )
        .await?;
        self.await_reply(owner, id, reply_rx).await
    }

    /// Remove the socket from the registry. Idempotent: closing an absent
    /// id is acknowledged, since a device-initiated teardown may have raced
    /// this call. Any device handle is released fire-and-forget.
    pub async fn close(&self, owner: &str, id: SocketId) -> Result<()> {
        if let Some(mut socket) = self.registry.remove(owner, id).await {
            if let Some(handle) = socket.handle.take() {
                self.release_handle(handle);
            }
            info!(owner, socket_id = id, "socket closed");
        }
        Ok(())
    }

    /// Snapshot of one socket's externally visible fields.
    pub async fn get_info(&self, owner: &str, id: SocketId) -> Result<SocketInfo> {
        self.registry.get(owner, id).await.map(|socket| socket.info())
    }

    /// Snapshots of every socket owned by `owner`.
    pub async fn get_all(&self, owner: &str) -> Vec<SocketInfo> {
        self.registry.infos(owner).await
    }

    /// Remove every socket owned by `owner`, releasing their handles.
    /// Used when a client detaches. Returns the number of sockets removed.
    pub async fn close_owner(&self, owner: &str) -> usize {
        let removed = self.registry.remove_owner(owner).await;
        let count = removed.len();
        for mut socket in removed {
            if let Some(handle) = socket.handle.take() {
                self.release_handle(handle);
            }
        }
        if count > 0 {
            info!(owner, count, "closed all sockets for owner");
        }
        count
    }

    fn check_capability(&self, owner: &str, service_id: &ServiceId) -> Result<()> {
        if self.capabilities.allows(owner, service_id) {
            Ok(())
        } else {
            warn!(owner, service_id = %service_id, "capability check failed");
            Err(Error::PermissionDenied(service_id.to_string()))
        }
    }

    /// Flag the socket as having a mutating device operation in flight.
    /// The device worker clears the flag when the operation completes.
    async fn mark_pending(&self, owner: &str, id: SocketId) -> Result<()> {
        self.registry
            .update(owner, id, |socket| {
                if socket.pending {
                    Err(Error::Busy(socket.id))
                } else {
                    socket.pending = true;
                    Ok(())
                }
            })
            .await?
    }

    async fn dispatch(&self, owner: &str, id: SocketId, request: DeviceRequest) -> Result<()> {
        if self.device_tx.send(request).await.is_err() {
            // Nothing will clear the flag for us once the worker is gone.
            let _ = self
                .registry
                .update(owner, id, |socket| socket.pending = false)
                .await;
            return Err(Error::WorkerUnavailable);
        }
        Ok(())
    }

    async fn await_reply<T>(
        &self,
        owner: &str,
        id: SocketId,
        reply_rx: oneshot::Receiver<Result<T>>,
    ) -> Result<T> {
        match reply_rx.await {
            Ok(result) => result,
            Err(_) => {
                // The worker died without answering; nothing will clear the
                // flag for us, and the socket must not stay busy forever.
                let _ = self
                    .registry
                    .update(owner, id, |socket| socket.pending = false)
                    .await;
                Err(Error::WorkerUnavailable)
            }
        }
    }

    fn release_handle(&self, handle: Arc<dyn crate::adapter::DeviceSocket>) {
        // Fire and forget; the caller already has its acknowledgment.
        if self
            .device_tx
            .try_send(DeviceRequest::Release { handle })
            .is_err()
        {
            debug!("device queue unavailable; dropping handle without release");
        }
    }
}
