//! The device record kept for each discovered instance

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A device discovered on the network
///
/// Created as a placeholder the moment the browser reports a new instance;
/// `address` and `identifier` are filled in at most once when resolution
/// completes. A device that never resolves stays registered with both
/// fields absent until the browser reports its removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    /// Provider-assigned instance name; unique among present devices and
    /// the correlation key for removal and resolution events
    pub name: String,

    /// Textual network address, present only after successful resolution
    pub address: Option<String>,

    /// Vendor identifier extracted from TXT metadata, present only when
    /// resolution succeeded and the metadata carried the configured key
    pub identifier: Option<String>,

    /// When the instance was first seen by the browser
    pub discovered_at: DateTime<Utc>,

    /// When resolution completed, if it has
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Device {
    /// Creates an unresolved placeholder for a newly-browsed instance
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            identifier: None,
            discovered_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether resolution has completed for this device
    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

impl fmt::Display for Device {
    /// Renders the report line: `name, identifier, address`, with `-`
    /// standing in for fields that are still unresolved
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}, {}, {}",
            self.name,
            self.identifier.as_deref().unwrap_or("-"),
            self.address.as_deref().unwrap_or("-"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_unresolved() {
        let device = Device::placeholder("Living Room");
        assert_eq!(device.name, "Living Room");
        assert!(device.address.is_none());
        assert!(device.identifier.is_none());
        assert!(!device.is_resolved());
    }

    #[test]
    fn test_display_unresolved() {
        let device = Device::placeholder("Bedroom");
        assert_eq!(device.to_string(), "Bedroom, -, -");
    }

    #[test]
    fn test_display_resolved() {
        let mut device = Device::placeholder("Living Room");
        device.address = Some("192.168.1.50".to_string());
        device.identifier = Some("A94-0000123".to_string());
        device.resolved_at = Some(Utc::now());
        assert_eq!(device.to_string(), "Living Room, A94-0000123, 192.168.1.50");
    }
}
