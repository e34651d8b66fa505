//! bsock-core: Shared library for bsock types and error handling.
//!
//! This crate provides:
//! - The error taxonomy surfaced across the command boundary
//! - Service identifier parsing and canonicalization
//! - Socket state, info, properties, listen-mode, and event types
//! - Logging setup
//! - Protocol and runtime constants

pub mod constants;
pub mod error;
pub mod logging;
pub mod service_id;
pub mod types;

pub use constants::{CHANNEL_AUTO, DEVICE_QUEUE_DEPTH, EVENT_CHANNEL_CAPACITY, PSM_AUTO};
pub use error::{Error, ErrorKind, Result};
pub use logging::{init_logging, LogFormat};
pub use service_id::ServiceId;
pub use types::{
    ListenMode, SocketEvent, SocketId, SocketInfo, SocketProperties, SocketState,
};
