//! mDNS/DNS-SD discovery of TiVo devices on the local network
//!
//! This crate browses for devices advertising a fixed DNS-SD service type
//! (by default `_tivo-device._tcp.local.`), resolves each instance's network
//! address and the vendor serial number carried in its TXT metadata, and
//! maintains a live, thread-safe registry of currently-present devices.
//!
//! # Architecture
//!
//! A [`DiscoverySession`] owns the mDNS daemon and a background pump task.
//! Provider events are translated into the closed [`DiscoveryEvent`] set and
//! dispatched one at a time through an [`EventHandler`], which mutates the
//! shared [`DeviceRegistry`]. The registry can be snapshotted from any thread
//! at any point, concurrently with the pump's writes.
//!
//! # Example
//!
//! ```no_run
//! use tivod_discovery::{DiscoveryConfig, DiscoverySession};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let session = DiscoverySession::new(DiscoveryConfig::default())?;
//!     session.start().await?;
//!
//!     // ... let results accumulate ...
//!
//!     for device in session.registry().snapshot() {
//!         println!("{device}");
//!     }
//!
//!     session.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod handler;
pub mod registry;
pub mod session;

pub use config::DiscoveryConfig;
pub use device::Device;
pub use error::{DiscoveryError, Result};
pub use event::DiscoveryEvent;
pub use handler::{EventHandler, Flow};
pub use registry::{DeviceRegistry, ResolutionOutcome};
pub use session::{DiscoverySession, SessionState};
