//! Error types for the discovery session

use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during device discovery
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// mDNS service daemon failed to initialize
    #[error("Failed to initialize mDNS daemon: {0}")]
    DaemonInitFailed(String),

    /// Failed to browse for the configured service type
    #[error("Failed to browse for service type '{service_type}': {reason}")]
    BrowseFailed { service_type: String, reason: String },

    /// Invalid discovery configuration
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(String),

    /// Session was started twice
    #[error("Discovery session is already running")]
    AlreadyStarted,

    /// Session is stopped and cannot be restarted
    #[error("Discovery session has already been stopped")]
    AlreadyStopped,

    /// Internal error
    #[error("Internal discovery error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}
