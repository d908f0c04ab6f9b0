//! Configuration types for device discovery

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the mDNS discovery session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// DNS-SD service type to browse for
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// TXT record key carrying the vendor device identifier
    #[serde(default = "default_identifier_key")]
    pub identifier_key: String,

    /// How long to wait for an instance to resolve before reporting
    /// a resolution failure (seconds)
    #[serde(default = "default_resolve_timeout")]
    pub resolve_timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            identifier_key: default_identifier_key(),
            resolve_timeout_secs: default_resolve_timeout(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the resolve timeout as a Duration
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.service_type.is_empty() {
            return Err("service_type cannot be empty".to_string());
        }

        if !self.service_type.starts_with('_') {
            return Err(format!(
                "service_type '{}' is not a DNS-SD service type",
                self.service_type
            ));
        }

        if self.identifier_key.is_empty() {
            return Err("identifier_key cannot be empty".to_string());
        }

        if self.resolve_timeout_secs == 0 {
            return Err("resolve_timeout_secs cannot be 0".to_string());
        }

        Ok(())
    }

    /// Returns the service type in the fully-qualified form mDNS expects
    /// (trailing `.local.` label present)
    pub fn service_type_fqdn(&self) -> String {
        if self.service_type.ends_with('.') {
            self.service_type.clone()
        } else if self.service_type.ends_with(".local") {
            format!("{}.", self.service_type)
        } else {
            format!("{}.local.", self.service_type)
        }
    }
}

// Default configuration values
fn default_service_type() -> String {
    "_tivo-device._tcp".to_string()
}

fn default_identifier_key() -> String {
    "TSN".to_string()
}

fn default_resolve_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.identifier_key, "TSN");
    }

    #[test]
    fn test_service_type_fqdn_normalization() {
        let mut config = DiscoveryConfig::default();
        assert_eq!(config.service_type_fqdn(), "_tivo-device._tcp.local.");

        config.service_type = "_tivo-device._tcp.local".to_string();
        assert_eq!(config.service_type_fqdn(), "_tivo-device._tcp.local.");

        config.service_type = "_tivo-device._tcp.local.".to_string();
        assert_eq!(config.service_type_fqdn(), "_tivo-device._tcp.local.");
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let config = DiscoveryConfig {
            service_type: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DiscoveryConfig {
            service_type: "tivo-device".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DiscoveryConfig {
            resolve_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
