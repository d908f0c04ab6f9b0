//! The closed set of events the discovery pipeline reacts to
//!
//! Every asynchronous notification the provider can deliver is normalized
//! into one [`DiscoveryEvent`] variant and dispatched through a single
//! handler, preserving the provider's serial-delivery guarantee.

use std::collections::HashMap;

/// A normalized discovery event
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    /// A new instance appeared on the network
    Added {
        /// Instance name
        name: String,
    },

    /// An instance disappeared from the network
    Removed {
        /// Instance name
        name: String,
    },

    /// Resolution completed for an instance
    ResolveSucceeded {
        /// Instance name
        name: String,
        /// Textual network address
        address: String,
        /// TXT metadata key/value pairs
        properties: HashMap<String, String>,
    },

    /// Resolution could not complete for an instance
    ResolveFailed {
        /// Instance name
        name: String,
        /// Human-readable failure reason
        reason: String,
    },

    /// The browser exhausted its record cache; informational only
    CacheExhausted,

    /// The initial burst of known instances has been delivered;
    /// informational only
    AllForNow,

    /// The browser failed; fatal for the session
    BrowseFailure {
        /// Human-readable failure reason
        reason: String,
    },

    /// The provider connection failed; fatal for the session
    ConnectionFailure {
        /// Human-readable failure reason
        reason: String,
    },
}
