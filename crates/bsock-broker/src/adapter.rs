//! Device adapter gateway.
//!
//! These traits are the only doorway to the underlying link-layer device.
//! The broker calls them exclusively from its device worker task;
//! implementations must be `Send + Sync` but may assume calls arrive one at
//! a time.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use bsock_core::{Error, ListenMode, ServiceId};

/// Failure reported by an adapter operation.
///
/// The message is surfaced to the original caller verbatim.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<AdapterError> for Error {
    fn from(e: AdapterError) -> Self {
        Error::Device { message: e.message }
    }
}

/// An open device-level socket, owned by exactly one socket resource.
///
/// Dropping a handle does not close it; the broker releases handles through
/// [`DeviceSocket::disconnect`].
#[async_trait]
pub trait DeviceSocket: fmt::Debug + Send + Sync {
    /// Transmit bytes to the peer, returning the count actually sent.
    async fn send(&self, data: &[u8]) -> Result<usize, AdapterError>;

    /// Close the device-level socket. Idempotent.
    async fn disconnect(&self) -> Result<(), AdapterError>;
}

/// The underlying device/radio adapter.
#[async_trait]
pub trait DeviceAdapter: Send + Sync {
    /// Register a listening service for the given mode and service id.
    ///
    /// A missing channel or PSM in the mode means the protocol-defined auto
    /// value.
    async fn create_service(
        &self,
        mode: ListenMode,
        service_id: &ServiceId,
    ) -> Result<Arc<dyn DeviceSocket>, AdapterError>;

    /// Open an outbound connection to the peer at `address`.
    async fn connect(
        &self,
        address: &str,
        service_id: &ServiceId,
    ) -> Result<Arc<dyn DeviceSocket>, AdapterError>;

    /// Whether a remote peer is currently known at `address`.
    async fn has_peer(&self, address: &str) -> bool;
}
