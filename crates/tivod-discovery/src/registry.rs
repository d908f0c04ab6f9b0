//! Thread-safe registry of currently-present devices

use crate::device::Device;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Outcome of a resolution write against the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The placeholder was filled in
    Applied,

    /// The device was already resolved; the write was ignored
    AlreadyResolved,

    /// No device of that name is registered; the write was ignored
    UnknownDevice,
}

/// The set of devices currently present on the network, keyed by
/// instance name
///
/// One mutex covers structural mutation (insert/remove), resolution
/// field writes, and snapshot iteration. Browse and resolve events
/// arrive serialized on the session's pump task, but snapshots may be
/// taken from any thread at any time, so every access goes through the
/// lock.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Mutex<HashMap<String, Device>>,
}

impl DeviceRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a placeholder for a newly-browsed instance
    ///
    /// A duplicate name is tolerated by replacing the existing entry:
    /// a well-behaved provider never reports the same instance twice
    /// without a removal in between, but a race here must not corrupt
    /// the registry.
    pub fn insert(&self, name: &str) {
        let mut devices = self.devices.lock();
        if let Some(previous) = devices.insert(name.to_string(), Device::placeholder(name)) {
            warn!(
                name,
                was_resolved = previous.is_resolved(),
                "Duplicate instance name; replacing existing entry"
            );
        }
    }

    /// Unlinks the device whose name matches exactly
    ///
    /// Removing an unknown name is a no-op: a remove event can
    /// legitimately race an add that was never observed.
    pub fn remove(&self, name: &str) -> Option<Device> {
        let removed = self.devices.lock().remove(name);
        if removed.is_none() {
            debug!(name, "Remove for unknown instance; ignoring");
        }
        removed
    }

    /// Fills in the placeholder for `name` with its resolved fields
    ///
    /// The write happens under the same lock as insert/remove, so it can
    /// never land in a device that is concurrently being unlinked. A
    /// resolution for a name that has already been removed is dropped
    /// and never re-inserts the device.
    pub fn complete_resolution(
        &self,
        name: &str,
        address: String,
        identifier: Option<String>,
    ) -> ResolutionOutcome {
        let mut devices = self.devices.lock();
        match devices.get_mut(name) {
            Some(device) if device.is_resolved() => {
                debug!(name, "Instance already resolved; ignoring duplicate resolution");
                ResolutionOutcome::AlreadyResolved
            }
            Some(device) => {
                device.address = Some(address);
                device.identifier = identifier;
                device.resolved_at = Some(Utc::now());
                ResolutionOutcome::Applied
            }
            None => {
                debug!(name, "Resolution for unregistered instance; ignoring");
                ResolutionOutcome::UnknownDevice
            }
        }
    }

    /// Returns a consistent point-in-time copy of all devices
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.lock().values().cloned().collect()
    }

    /// Looks up a single device by name
    pub fn get(&self, name: &str) -> Option<Device> {
        self.devices.lock().get(name).cloned()
    }

    /// Whether a device of that name is currently registered
    pub fn contains(&self, name: &str) -> bool {
        self.devices.lock().contains_key(name)
    }

    /// Number of currently-registered devices
    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }
}
