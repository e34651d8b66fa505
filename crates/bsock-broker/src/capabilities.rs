//! Owner capability checks for service ids.
//!
//! The capability lookup is consulted after service-id validation and
//! before any device work, so callers outside their declared permission set
//! never observe device state.

use std::collections::{HashMap, HashSet};

use bsock_core::ServiceId;

/// Permission lookup keyed by owner and service id.
pub trait Capabilities: Send + Sync {
    /// Whether `owner` may listen on or connect to `service_id`.
    fn allows(&self, owner: &str, service_id: &ServiceId) -> bool;
}

/// Static allow-list of service ids per owner.
///
/// Owners without an entry are denied everything. `allow_all` short-circuits
/// every lookup, for hosts that enforce permissions in an outer layer.
#[derive(Debug, Default)]
pub struct StaticCapabilities {
    grants: HashMap<String, HashSet<ServiceId>>,
    allow_all: bool,
}

impl StaticCapabilities {
    /// Deny-by-default capability set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability set that permits every owner and service id.
    pub fn allow_all() -> Self {
        Self {
            grants: HashMap::new(),
            allow_all: true,
        }
    }

    /// Grant `owner` the use of `service_id`.
    pub fn grant(&mut self, owner: &str, service_id: ServiceId) {
        self.grants
            .entry(owner.to_string())
            .or_default()
            .insert(service_id);
    }

    /// Builder-style [`grant`](Self::grant).
    pub fn with_grant(mut self, owner: &str, service_id: ServiceId) -> Self {
        self.grant(owner, service_id);
        self
    }
}

impl Capabilities for StaticCapabilities {
    fn allows(&self, owner: &str, service_id: &ServiceId) -> bool {
        if self.allow_all {
            return true;
        }
        self.grants
            .get(owner)
            .is_some_and(|granted| granted.contains(service_id))
    }
}
