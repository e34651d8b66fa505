//! bsock-broker: asynchronous device-socket resource broker.
//!
//! Many independent logical clients (owners) open, configure, and use
//! communication sockets over one shared link-layer device adapter. The
//! broker enforces a strict split between two execution contexts:
//!
//! - **Control context**: the caller's task. [`service::SocketService`]
//!   methods validate input and read the registry here; cheap operations
//!   (create, update, get-info, get-all, close) complete synchronously.
//! - **Device context**: a single worker task that owns all calls into the
//!   [`adapter::DeviceAdapter`] and all writes to device-owned socket state.
//!   Mutating operations (listen, connect, send, disconnect) are dispatched
//!   to it over a channel and the caller awaits the reply.
//!
//! # Architecture
//!
//! - [`registry::ResourceRegistry`]: owner-scoped keyed store of
//!   [`registry::SocketResource`], the only structure shared by both
//!   contexts.
//! - [`adapter`]: traits the underlying device implementation must satisfy.
//! - [`events::EventSink`]: fire-and-forget fan-out of socket lifecycle
//!   events (listening, connected, resumed) to the owning client.
//! - [`capabilities::Capabilities`]: permission lookup keyed by owner and
//!   service id, consulted before any device work.
//! - [`service::SocketService`]: the public command surface.

pub mod adapter;
pub mod capabilities;
mod device;
pub mod events;
pub mod registry;
pub mod service;

pub use adapter::{AdapterError, DeviceAdapter, DeviceSocket};
pub use capabilities::{Capabilities, StaticCapabilities};
pub use events::{BroadcastEvents, EventSink, SocketEventEnvelope};
pub use registry::{ResourceRegistry, SocketResource};
pub use service::{ServiceConfig, SocketService};
