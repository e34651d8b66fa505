//! Service identifiers for listening and connecting sockets.
//!
//! A service id is a 128-bit UUID. Short 16-bit and 32-bit forms are
//! accepted as 4 or 8 hex digits and expand onto the base UUID
//! `00000000-0000-1000-8000-00805f9b34fb`. Parsing is pure and synchronous;
//! malformed ids are rejected before any capability check or device call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Suffix of the base UUID onto which short-form service ids expand.
const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

/// A validated, canonicalized service identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(Uuid);

impl ServiceId {
    /// Parse a service id from its 16-bit, 32-bit, or full 128-bit form.
    pub fn parse(value: &str) -> Result<Self, Error> {
        let expanded = match value.len() {
            4 | 8 if value.bytes().all(|b| b.is_ascii_hexdigit()) => {
                format!("{:0>8}{}", value.to_ascii_lowercase(), BASE_UUID_SUFFIX)
            }
            36 => value.to_ascii_lowercase(),
            _ => return Err(Error::InvalidServiceId(value.to_string())),
        };

        Uuid::parse_str(&expanded)
            .map(ServiceId)
            .map_err(|_| Error::InvalidServiceId(value.to_string()))
    }

    /// The canonical 128-bit value.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ServiceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceId::parse(s)
    }
}
