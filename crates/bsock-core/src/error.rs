//! Error types for bsock operations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SocketId;

/// Main error type for broker operations.
///
/// Validation errors are detected synchronously on the control context and
/// never reach the device layer; device errors travel the same reply path
/// as success. Raw adapter failures are wrapped in [`Error::Device`] with
/// the adapter's message passed through verbatim.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from underlying system calls (e.g. opening a log file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No socket with this id is visible to the caller.
    #[error("socket not found: {0}")]
    SocketNotFound(SocketId),

    /// No remote peer is known at the given address.
    #[error("peer not found: {0}")]
    PeerNotFound(String),

    /// The service id failed format validation.
    #[error("invalid service id: {0}")]
    InvalidServiceId(String),

    /// The owner's capability set does not cover the requested service id.
    #[error("permission denied for service {0}")]
    PermissionDenied(String),

    /// A mutating device operation is already pending for this socket.
    #[error("operation already pending for socket {0}")]
    Busy(SocketId),

    /// The socket is not connected.
    #[error("socket {id} is not connected")]
    NotConnected { id: SocketId },

    /// The payload does not fit the socket's configured buffer size.
    #[error("payload of {len} bytes exceeds buffer size {buffer_size}")]
    PayloadTooLarge { len: usize, buffer_size: u32 },

    /// The device adapter reported a failure.
    #[error("device error: {message}")]
    Device { message: String },

    /// The device worker task is gone and cannot take requests.
    #[error("device worker unavailable")]
    WorkerUnavailable,
}

/// Closed set of error categories carried across the command boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Socket id or remote peer absent at time of lookup.
    NotFound,
    /// Service id fails format validation.
    InvalidIdentifier,
    /// Capability check failed for the requested service id.
    PermissionDenied,
    /// A mutating operation is already pending for this socket id.
    Busy,
    /// The socket is in the wrong state for the operation.
    InvalidState,
    /// The device adapter's error path fired.
    Device,
}

impl Error {
    /// Map this error onto the wire-level category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SocketNotFound(_) | Error::PeerNotFound(_) => ErrorKind::NotFound,
            Error::InvalidServiceId(_) => ErrorKind::InvalidIdentifier,
            Error::PermissionDenied(_) => ErrorKind::PermissionDenied,
            Error::Busy(_) => ErrorKind::Busy,
            Error::NotConnected { .. } | Error::PayloadTooLarge { .. } => ErrorKind::InvalidState,
            Error::Io(_) | Error::Device { .. } | Error::WorkerUnavailable => ErrorKind::Device,
        }
    }

    /// Returns true if this error was produced by validation on the control
    /// context, i.e. before any device work began.
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            Error::Io(_) | Error::Device { .. } | Error::WorkerUnavailable
        )
    }
}

/// Convenience result type for broker operations.
pub type Result<T> = std::result::Result<T, Error>;
