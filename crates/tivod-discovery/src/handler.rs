//! Event dispatch: turns discovery events into registry mutations

use crate::event::DiscoveryEvent;
use crate::registry::{DeviceRegistry, ResolutionOutcome};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Verdict returned by [`EventHandler::dispatch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Flow {
    /// Keep processing events
    Continue,

    /// The event was fatal; the session must shut down
    Fatal,
}

impl Flow {
    /// Whether the session must shut down
    pub fn is_fatal(&self) -> bool {
        matches!(self, Flow::Fatal)
    }
}

/// Applies discovery events to the device registry
///
/// All events go through [`dispatch`](Self::dispatch), one at a time, on
/// the session's pump task. Browse events drive structural registry
/// changes; resolution events fill in placeholder fields; failure events
/// produce the fatal verdict that stops the pump.
pub struct EventHandler {
    registry: Arc<DeviceRegistry>,
    identifier_key: String,
}

impl EventHandler {
    /// Creates a handler writing into `registry`, extracting the device
    /// identifier from TXT metadata under `identifier_key`
    pub fn new(registry: Arc<DeviceRegistry>, identifier_key: impl Into<String>) -> Self {
        Self {
            registry,
            identifier_key: identifier_key.into(),
        }
    }

    /// The registry this handler mutates
    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    /// Processes one event
    pub fn dispatch(&self, event: DiscoveryEvent) -> Flow {
        match event {
            DiscoveryEvent::Added { name } => {
                debug!(name, "Instance appeared");
                self.registry.insert(&name);
                Flow::Continue
            }

            DiscoveryEvent::Removed { name } => {
                info!(name, "Device disappeared from network");
                self.registry.remove(&name);
                Flow::Continue
            }

            DiscoveryEvent::ResolveSucceeded {
                name,
                address,
                properties,
            } => {
                self.handle_resolved(&name, address, &properties);
                Flow::Continue
            }

            DiscoveryEvent::ResolveFailed { name, reason } => {
                // Only worth reporting while the device is still present
                // and waiting: a late failure for a removed or
                // already-resolved instance carries no information.
                match self.registry.get(&name) {
                    Some(device) if !device.is_resolved() => {
                        error!(name, reason, "Failed to resolve instance");
                    }
                    _ => {
                        debug!(name, reason, "Stale resolution failure; ignoring");
                    }
                }
                Flow::Continue
            }

            DiscoveryEvent::CacheExhausted => {
                info!("Browser cache exhausted");
                Flow::Continue
            }

            DiscoveryEvent::AllForNow => {
                info!("Browser delivered all known instances for now");
                Flow::Continue
            }

            DiscoveryEvent::BrowseFailure { reason } => {
                error!(reason, "Service browser failed");
                Flow::Fatal
            }

            DiscoveryEvent::ConnectionFailure { reason } => {
                error!(reason, "Provider connection failed");
                Flow::Fatal
            }
        }
    }

    fn handle_resolved(&self, name: &str, address: String, properties: &HashMap<String, String>) {
        // Absence of the identifier key is not an error; the device just
        // stays identifier-less.
        let identifier = properties.get(&self.identifier_key).cloned();

        match self
            .registry
            .complete_resolution(name, address.clone(), identifier.clone())
        {
            ResolutionOutcome::Applied => {
                info!(
                    name,
                    identifier = identifier.as_deref().unwrap_or("-"),
                    address,
                    "Resolved device"
                );
            }
            ResolutionOutcome::AlreadyResolved | ResolutionOutcome::UnknownDevice => {}
        }
    }
}
