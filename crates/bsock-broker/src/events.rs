//! Socket lifecycle event dispatch.
//!
//! Events are best-effort notifications to the owning client; they are not
//! part of any command's result. Delivery failures are logged and never
//! surfaced to the command caller.

use tokio::sync::broadcast;
use tracing::debug;

use bsock_core::{SocketEvent, SocketId, EVENT_CHANNEL_CAPACITY};

/// Envelope handed to event transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEventEnvelope {
    pub owner: String,
    pub id: SocketId,
    pub event: SocketEvent,
}

/// Fan-out target for socket lifecycle events.
pub trait EventSink: Send + Sync {
    /// Fire-and-forget delivery of one event to `owner`.
    fn publish(&self, owner: &str, id: SocketId, event: SocketEvent);
}

/// [`EventSink`] backed by a tokio broadcast channel.
///
/// Each subscriber gets every event published after it subscribed; lagging
/// subscribers lose the oldest events, which is acceptable for best-effort
/// notifications.
pub struct BroadcastEvents {
    tx: broadcast::Sender<SocketEventEnvelope>,
}

impl BroadcastEvents {
    pub fn new() -> (Self, broadcast::Receiver<SocketEventEnvelope>) {
        let (tx, rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SocketEventEnvelope> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEvents {
    fn publish(&self, owner: &str, id: SocketId, event: SocketEvent) {
        debug!(owner, socket_id = id, event = %event, "publishing socket event");
        let envelope = SocketEventEnvelope {
            owner: owner.to_string(),
            id,
            event,
        };
        if self.tx.send(envelope).is_err() {
            debug!(socket_id = id, "no event subscribers; dropping event");
        }
    }
}
