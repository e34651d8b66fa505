//! Event sink that records published events for assertions.

use std::sync::{Arc, Mutex};

use bsock_broker::events::{EventSink, SocketEventEnvelope};
use bsock_core::{SocketEvent, SocketId};

/// Records every published event in order.
#[derive(Default)]
pub struct CaptureEvents {
    events: Mutex<Vec<SocketEventEnvelope>>,
}

impl CaptureEvents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copy of all events published so far.
    pub fn snapshot(&self) -> Vec<SocketEventEnvelope> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one kind for one socket.
    pub fn of_kind(&self, id: SocketId, event: SocketEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.id == id && e.event == event)
            .count()
    }
}

impl EventSink for CaptureEvents {
    fn publish(&self, owner: &str, id: SocketId, event: SocketEvent) {
        self.events.lock().unwrap().push(SocketEventEnvelope {
            owner: owner.to_string(),
            id,
            event,
        });
    }
}
