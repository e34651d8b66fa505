//! Socket state, info, properties, listen modes, and event kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::service_id::ServiceId;

/// Registry-assigned socket identifier. Unique for the process lifetime and
/// never reused.
pub type SocketId = u64;

/// Connection state of a socket resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    /// Created but not yet listening or connected.
    Unbound,
    /// A listening service is registered with the adapter.
    Listening,
    /// An outbound connect is in flight.
    Connecting,
    /// Connected to a remote peer.
    Connected,
    /// Explicitly disconnected; the device handle has been released.
    Disconnected,
    /// Removed from the registry; no operation may reference it again.
    Closed,
}

impl SocketState {
    pub fn is_connected(&self) -> bool {
        matches!(self, SocketState::Connected)
    }
}

impl fmt::Display for SocketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketState::Unbound => write!(f, "unbound"),
            SocketState::Listening => write!(f, "listening"),
            SocketState::Connecting => write!(f, "connecting"),
            SocketState::Connected => write!(f, "connected"),
            SocketState::Disconnected => write!(f, "disconnected"),
            SocketState::Closed => write!(f, "closed"),
        }
    }
}

/// Mutable socket properties.
///
/// Update semantics are merge-only-present: fields left as `None` are
/// untouched by an update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent: Option<bool>,
    /// Advisory receive buffer size. Checked against payload length at send
    /// time, not when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
}

/// Snapshot of a socket's externally visible fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketInfo {
    pub id: SocketId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub persistent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
    pub paused: bool,
    pub connected: bool,
    /// Present only while connected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_address: Option<String>,
    /// Present once a service id has been assigned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
}

/// Link-layer listen mode, carrying its protocol-specific option.
///
/// `None` for the channel or PSM means the protocol-defined auto value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenMode {
    Rfcomm { channel: Option<u16> },
    L2cap { psm: Option<u16> },
}

impl fmt::Display for ListenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenMode::Rfcomm { .. } => write!(f, "rfcomm"),
            ListenMode::L2cap { .. } => write!(f, "l2cap"),
        }
    }
}

/// Socket lifecycle events delivered to the owning client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketEvent {
    /// A listening service was registered.
    Listening,
    /// A connection to a remote peer was established.
    Connected,
    /// The socket transitioned from paused back to delivering data.
    Resumed,
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketEvent::Listening => write!(f, "listening"),
            SocketEvent::Connected => write!(f, "connected"),
            SocketEvent::Resumed => write!(f, "resumed"),
        }
    }
}
