//! Device worker: the single execution context that drives the adapter.
//!
//! Control-side code never calls the adapter or writes device-owned socket
//! fields; it enqueues a [`DeviceRequest`] and awaits the oneshot reply.
//! The worker processes requests strictly in order, so callbacks for one
//! socket are observed in the order their operations were issued.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use bsock_core::{Error, ListenMode, Result, ServiceId, SocketEvent, SocketId, SocketState};

use crate::adapter::{DeviceAdapter, DeviceSocket};
use crate::events::EventSink;
use crate::registry::ResourceRegistry;

/// One in-flight pairing of a control-side command with its device work.
///
/// The reply sender is the command's continuation; it is consumed exactly
/// once, when the device work completes (success or error). A dropped
/// receiver means the caller went away and the reply is discarded.
pub(crate) enum DeviceRequest {
    Listen {
        owner: String,
        id: SocketId,
        mode: ListenMode,
        service_id: ServiceId,
        reply: oneshot::Sender<Result<()>>,
    },
    Connect {
        owner: String,
        id: SocketId,
        address: String,
        service_id: ServiceId,
        reply: oneshot::Sender<Result<()>>,
    },
    Send {
        owner: String,
        id: SocketId,
        handle: Arc<dyn DeviceSocket>,
        payload: Bytes,
        reply: oneshot::Sender<Result<usize>>,
    },
    Disconnect {
        owner: String,
        id: SocketId,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Best-effort release of a handle taken from a closed socket. No reply;
    /// the close acknowledgment has already been delivered.
    Release { handle: Arc<dyn DeviceSocket> },
}

pub(crate) struct DeviceWorker {
    adapter: Arc<dyn DeviceAdapter>,
    registry: Arc<ResourceRegistry>,
    events: Arc<dyn EventSink>,
    rx: mpsc::Receiver<DeviceRequest>,
}

impl DeviceWorker {
    pub(crate) fn new(
        adapter: Arc<dyn DeviceAdapter>,
        registry: Arc<ResourceRegistry>,
        events: Arc<dyn EventSink>,
        rx: mpsc::Receiver<DeviceRequest>,
    ) -> Self {
        Self {
            adapter,
            registry,
            events,
            rx,
        }
    }

    /// Process requests until every sender is dropped.
    pub(crate) async fn run(mut self) {
        while let Some(request) = self.rx.recv().await {
            match request {
                DeviceRequest::Listen {
                    owner,
                    id,
                    mode,
                    service_id,
                    reply,
                } => {
                    let result = self.handle_listen(&owner, id, mode, service_id).await;
                    self.clear_pending(&owner, id).await;
                    let _ = reply.send(result);
                }
                DeviceRequest::Connect {
                    owner,
                    id,
                    address,
                    service_id,
                    reply,
                } => {
                    let result = self.handle_connect(&owner, id, address, service_id).await;
                    self.clear_pending(&owner, id).await;
                    let _ = reply.send(result);
                }
                DeviceRequest::Send {
                    owner,
                    id,
                    handle,
                    payload,
                    reply,
                } => {
                    let result = handle.send(&payload).await.map_err(Error::from);
                    self.clear_pending(&owner, id).await;
                    let _ = reply.send(result);
                }
                DeviceRequest::Disconnect { owner, id, reply } => {
                    let result = self.handle_disconnect(&owner, id).await;
                    self.clear_pending(&owner, id).await;
                    let _ = reply.send(result);
                }
                DeviceRequest::Release { handle } => {
                    self.release(handle).await;
                }
            }
        }
        debug!("device worker stopped");
    }

    async fn handle_listen(
        &self,
        owner: &str,
        id: SocketId,
        mode: ListenMode,
        service_id: ServiceId,
    ) -> Result<()> {
        let handle = self.adapter.create_service(mode, &service_id).await?;

        let adopted = self
            .registry
            .update(owner, id, |socket| {
                socket.state = SocketState::Listening;
                socket.service_id = Some(service_id.clone());
                // A handle is exclusively owned; a re-listen displaces the
                // previous one, which still has to be closed.
                socket.handle.replace(handle.clone())
            })
            .await;

        match adopted {
            Ok(displaced) => {
                if let Some(previous) = displaced {
                    self.release(previous).await;
                }
                debug!(owner, socket_id = id, mode = %mode, "listening service registered");
                self.events.publish(owner, id, SocketEvent::Listening);
                Ok(())
            }
            Err(err) => {
                // The socket was closed while the adapter call was in
                // flight; drop the fresh handle instead of resurrecting it.
                debug!(socket_id = id, "socket gone after create_service; releasing handle");
                self.release(handle).await;
                Err(err)
            }
        }
    }

    async fn handle_connect(
        &self,
        owner: &str,
        id: SocketId,
        address: String,
        service_id: ServiceId,
    ) -> Result<()> {
        let previous = self
            .registry
            .update(owner, id, |socket| {
                let previous = socket.state;
                socket.state = SocketState::Connecting;
                previous
            })
            .await?;

        if !self.adapter.has_peer(&address).await {
            self.restore_state(owner, id, previous).await;
            return Err(Error::PeerNotFound(address));
        }

        let handle = match self.adapter.connect(&address, &service_id).await {
            Ok(handle) => handle,
            Err(err) => {
                self.restore_state(owner, id, previous).await;
                return Err(err.into());
            }
        };

        let adopted = self
            .registry
            .update(owner, id, |socket| {
                socket.state = SocketState::Connected;
                socket.remote_address = Some(address.clone());
                socket.service_id = Some(service_id.clone());
                // A reconnect displaces the previous handle, which still
                // has to be closed.
                socket.handle.replace(handle.clone())
            })
            .await;

        match adopted {
            Ok(displaced) => {
                if let Some(previous) = displaced {
                    self.release(previous).await;
                }
                debug!(owner, socket_id = id, address, "socket connected");
                self.events.publish(owner, id, SocketEvent::Connected);
                Ok(())
            }
            Err(err) => {
                debug!(socket_id = id, "socket gone after connect; releasing handle");
                self.release(handle).await;
                Err(err)
            }
        }
    }

    async fn handle_disconnect(&self, owner: &str, id: SocketId) -> Result<()> {
        let taken = self
            .registry
            .update(owner, id, |socket| {
                socket.state = SocketState::Disconnected;
                socket.remote_address = None;
                socket.handle.take()
            })
            .await?;

        // Disconnect always lands in Disconnected, even when the device
        // close fails or there was never a handle.
        if let Some(handle) = taken {
            if let Err(err) = handle.disconnect().await {
                warn!(socket_id = id, error = %err, "device disconnect failed");
            }
        }
        debug!(owner, socket_id = id, "socket disconnected");
        Ok(())
    }

    async fn release(&self, handle: Arc<dyn DeviceSocket>) {
        if let Err(err) = handle.disconnect().await {
            debug!(error = %err, "best-effort handle release failed");
        }
    }

    async fn restore_state(&self, owner: &str, id: SocketId, state: SocketState) {
        // A failed operation leaves the socket in its prior state. No-op
        // when the socket was closed in the meantime.
        let _ = self
            .registry
            .update(owner, id, |socket| socket.state = state)
            .await;
    }

    async fn clear_pending(&self, owner: &str, id: SocketId) {
        let _ = self
            .registry
            .update(owner, id, |socket| socket.pending = false)
            .await;
    }
}
