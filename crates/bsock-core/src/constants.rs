//! Protocol and runtime constants.

/// RFCOMM channel value meaning "let the adapter pick one".
///
/// Used by adapter implementations when a listen request carries no
/// explicit channel.
pub const CHANNEL_AUTO: u16 = 0;

/// L2CAP PSM value meaning "let the adapter pick one".
pub const PSM_AUTO: u16 = 0;

/// Depth of the device worker's request queue.
pub const DEVICE_QUEUE_DEPTH: usize = 64;

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
