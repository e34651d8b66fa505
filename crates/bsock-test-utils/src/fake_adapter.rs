//! Fake device adapter for testing the broker without hardware.
//!
//! Every adapter and socket operation increments a shared counter, so tests
//! can assert that validation failures never reach the device layer. Ops
//! can be scripted to fail once with a given message, and a gate can hold
//! operations in flight to exercise busy rejection and close races.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use bsock_broker::adapter::{AdapterError, DeviceAdapter, DeviceSocket};
use bsock_core::{ListenMode, ServiceId};

/// Shared counts of adapter and socket calls.
#[derive(Debug, Default)]
pub struct CallCounters {
    pub create_service: AtomicUsize,
    pub connect: AtomicUsize,
    pub send: AtomicUsize,
    pub disconnect: AtomicUsize,
}

impl CallCounters {
    /// Total calls that reached the device layer.
    pub fn device_calls(&self) -> usize {
        self.create_service.load(Ordering::SeqCst)
            + self.connect.load(Ordering::SeqCst)
            + self.send.load(Ordering::SeqCst)
            + self.disconnect.load(Ordering::SeqCst)
    }
}

/// In-memory [`DeviceAdapter`].
pub struct FakeAdapter {
    counters: Arc<CallCounters>,
    peers: Mutex<HashSet<String>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    create_failure: Mutex<Option<String>>,
    connect_failure: Mutex<Option<String>>,
    send_failure: Arc<Mutex<Option<String>>>,
    connect_panic: AtomicBool,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counters: Arc::new(CallCounters::default()),
            peers: Mutex::new(HashSet::new()),
            sent: Arc::new(Mutex::new(Vec::new())),
            create_failure: Mutex::new(None),
            connect_failure: Mutex::new(None),
            send_failure: Arc::new(Mutex::new(None)),
            connect_panic: AtomicBool::new(false),
            gate: Mutex::new(None),
        })
    }

    pub fn counters(&self) -> Arc<CallCounters> {
        self.counters.clone()
    }

    /// Make a remote peer visible at `address`.
    pub fn add_peer(&self, address: &str) {
        self.peers.lock().unwrap().insert(address.to_string());
    }

    /// Fail the next `create_service` call with `message`.
    pub fn fail_next_create(&self, message: &str) {
        *self.create_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Fail the next `connect` call with `message`.
    pub fn fail_next_connect(&self, message: &str) {
        *self.connect_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Fail the next socket `send` call with `message`.
    pub fn fail_next_send(&self, message: &str) {
        *self.send_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Panic inside the next `connect` call, killing the task driving the
    /// adapter. Models a crashing adapter implementation.
    pub fn panic_next_connect(&self) {
        self.connect_panic.store(true, Ordering::SeqCst);
    }

    /// Hold every subsequent operation in flight until the returned gate is
    /// notified (one permit per held operation).
    pub fn hold_operations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Payloads that reached the device layer, in send order.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    async fn wait_gate(&self) {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
    }

    fn new_socket(&self) -> Arc<dyn DeviceSocket> {
        Arc::new(FakeSocket {
            counters: self.counters.clone(),
            sent: self.sent.clone(),
            send_failure: self.send_failure.clone(),
            disconnected: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl DeviceAdapter for FakeAdapter {
    async fn create_service(
        &self,
        _mode: ListenMode,
        _service_id: &ServiceId,
    ) -> Result<Arc<dyn DeviceSocket>, AdapterError> {
        self.counters.create_service.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if let Some(message) = self.create_failure.lock().unwrap().take() {
            return Err(AdapterError::new(message));
        }
        Ok(self.new_socket())
    }

    async fn connect(
        &self,
        _address: &str,
        _service_id: &ServiceId,
    ) -> Result<Arc<dyn DeviceSocket>, AdapterError> {
        self.counters.connect.fetch_add(1, Ordering::SeqCst);
        self.wait_gate().await;
        if self.connect_panic.swap(false, Ordering::SeqCst) {
            panic!("scripted adapter crash");
        }
        if let Some(message) = self.connect_failure.lock().unwrap().take() {
            return Err(AdapterError::new(message));
        }
        Ok(self.new_socket())
    }

    async fn has_peer(&self, address: &str) -> bool {
        self.peers.lock().unwrap().contains(address)
    }
}

/// Socket handle produced by [`FakeAdapter`].
#[derive(Debug)]
pub struct FakeSocket {
    counters: Arc<CallCounters>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    send_failure: Arc<Mutex<Option<String>>>,
    disconnected: AtomicBool,
}

impl FakeSocket {
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceSocket for FakeSocket {
    async fn send(&self, data: &[u8]) -> Result<usize, AdapterError> {
        self.counters.send.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.send_failure.lock().unwrap().take() {
            return Err(AdapterError::new(message));
        }
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.counters.disconnect.fetch_add(1, Ordering::SeqCst);
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}
