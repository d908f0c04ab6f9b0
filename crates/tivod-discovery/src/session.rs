//! Discovery session lifecycle and the provider event pump

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::event::DiscoveryEvent;
use crate::handler::EventHandler;
use crate::registry::DeviceRegistry;
use async_channel::{Receiver, Sender};
use mdns_sd::{ServiceDaemon, ServiceEvent as MdnsEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Maximum number of injected events to buffer in the channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lifecycle state of a discovery session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed but not yet started
    Created,

    /// Browsing and processing events
    Running,

    /// Shut down; terminal
    Stopped,
}

/// Owns the mDNS daemon, the service browser, and the background pump
/// task that feeds provider events through the [`EventHandler`]
///
/// The session moves `Created → Running → Stopped` and never restarts.
/// A failed [`start`](Self::start) releases whatever it had allocated
/// and leaves the session in `Created`; a fatal browse or connection
/// event moves it to `Stopped` from inside the pump.
pub struct DiscoverySession {
    config: DiscoveryConfig,
    registry: Arc<DeviceRegistry>,
    state: Arc<Mutex<SessionState>>,
    mdns: Mutex<Option<Arc<ServiceDaemon>>>,
    event_tx: Mutex<Option<Sender<DiscoveryEvent>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoverySession {
    /// Creates a session for the configured service type
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        config.validate().map_err(DiscoveryError::InvalidConfig)?;

        Ok(Self {
            config,
            registry: Arc::new(DeviceRegistry::new()),
            state: Arc::new(Mutex::new(SessionState::Created)),
            mdns: Mutex::new(None),
            event_tx: Mutex::new(None),
            pump: Mutex::new(None),
        })
    }

    /// The registry of currently-present devices; safe to snapshot from
    /// any thread while the session runs
    pub fn registry(&self) -> Arc<DeviceRegistry> {
        Arc::clone(&self.registry)
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Whether the session is currently running
    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Starts the mDNS daemon, the browser, and the event pump
    ///
    /// On any failure everything already allocated is released and the
    /// session stays in `Created`.
    pub async fn start(&self) -> Result<()> {
        let mut state = self.state.lock();
        match *state {
            SessionState::Created => {}
            SessionState::Running => return Err(DiscoveryError::AlreadyStarted),
            SessionState::Stopped => return Err(DiscoveryError::AlreadyStopped),
        }

        let service_type = self.config.service_type_fqdn();

        let mdns = Arc::new(ServiceDaemon::new().map_err(|e| {
            DiscoveryError::DaemonInitFailed(format!("Failed to create mDNS daemon: {}", e))
        })?);

        let browse_rx = match mdns.browse(&service_type) {
            Ok(rx) => rx,
            Err(e) => {
                let _ = mdns.shutdown();
                return Err(DiscoveryError::BrowseFailed {
                    service_type,
                    reason: e.to_string(),
                });
            }
        };

        info!(service_type, "Starting discovery session");

        let (event_tx, event_rx) = async_channel::bounded(EVENT_CHANNEL_CAPACITY);
        let handler = EventHandler::new(
            Arc::clone(&self.registry),
            self.config.identifier_key.clone(),
        );

        let shutdown = {
            let mdns = Arc::clone(&mdns);
            move || {
                let _ = mdns.shutdown();
            }
        };

        let pump = tokio::spawn(run_pump(
            browse_rx,
            event_rx,
            event_tx.clone(),
            handler,
            Arc::clone(&self.state),
            shutdown,
            service_type,
            self.config.resolve_timeout(),
        ));

        *self.mdns.lock() = Some(mdns);
        *self.event_tx.lock() = Some(event_tx);
        *self.pump.lock() = Some(pump);
        *state = SessionState::Running;

        Ok(())
    }

    /// Stops the session, releasing the browser, the daemon, and the
    /// pump task in reverse acquisition order
    ///
    /// Safe to call at any time, repeatedly; waits for the pump task to
    /// quiesce before returning, so no event dispatch outlives this call.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state == SessionState::Stopped && self.pump.lock().is_none() {
                return Ok(());
            }
            *state = SessionState::Stopped;
        }

        info!("Stopping discovery session");

        if let Some(mdns) = self.mdns.lock().take() {
            let _ = mdns.stop_browse(&self.config.service_type_fqdn());
            let _ = mdns.shutdown();
        }

        // Closing the channel wakes the pump; pending resolve-timeout
        // probes will fail their send and vanish.
        if let Some(event_tx) = self.event_tx.lock().take() {
            event_tx.close();
        }

        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }

        info!("Discovery session stopped");
        Ok(())
    }
}

impl Drop for DiscoverySession {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("Discovery session dropped while still running");
            if let Some(mdns) = self.mdns.lock().take() {
                let _ = mdns.shutdown();
            }
        }
    }
}

/// Receives provider events and injected events, dispatching each in
/// arrival order until shutdown or a fatal event
#[allow(clippy::too_many_arguments)]
async fn run_pump<F>(
    browse_rx: mdns_sd::Receiver<MdnsEvent>,
    event_rx: Receiver<DiscoveryEvent>,
    event_tx: Sender<DiscoveryEvent>,
    handler: EventHandler,
    state: Arc<Mutex<SessionState>>,
    shutdown: F,
    service_type: String,
    resolve_timeout: std::time::Duration,
) where
    F: Fn() + Send + 'static,
{
    loop {
        tokio::select! {
            provider = browse_rx.recv_async() => {
                match provider {
                    Ok(mdns_event) => {
                        let Some(event) = translate(mdns_event, &service_type) else {
                            continue;
                        };

                        if let DiscoveryEvent::Added { name } = &event {
                            arm_resolve_probe(event_tx.clone(), name.clone(), resolve_timeout);
                        }

                        if handler.dispatch(event).is_fatal() {
                            *state.lock() = SessionState::Stopped;
                            shutdown();
                            break;
                        }
                    }
                    Err(e) => {
                        // During an orderly stop the daemon goes away
                        // first; only an unexpected loss is a failure.
                        if *state.lock() == SessionState::Stopped {
                            break;
                        }
                        let _ = handler.dispatch(DiscoveryEvent::ConnectionFailure {
                            reason: e.to_string(),
                        });
                        *state.lock() = SessionState::Stopped;
                        break;
                    }
                }
            }

            injected = event_rx.recv() => {
                match injected {
                    Ok(event) => {
                        if handler.dispatch(event).is_fatal() {
                            *state.lock() = SessionState::Stopped;
                            shutdown();
                            break;
                        }
                    }
                    // Channel closed by stop(); quiesce.
                    Err(_) => break,
                }
            }
        }
    }

    debug!("Event pump stopped");
}

/// Surfaces a resolution failure if the instance has not resolved within
/// the timeout; the handler drops the event when resolution already
/// happened or the instance is gone
fn arm_resolve_probe(event_tx: Sender<DiscoveryEvent>, name: String, timeout: std::time::Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = event_tx
            .send(DiscoveryEvent::ResolveFailed {
                name,
                reason: format!("no resolution within {}s", timeout.as_secs()),
            })
            .await;
    });
}

/// Normalizes a raw mDNS event into the closed discovery event set
fn translate(event: MdnsEvent, service_type: &str) -> Option<DiscoveryEvent> {
    match event {
        MdnsEvent::ServiceFound(_, fullname) => Some(DiscoveryEvent::Added {
            name: instance_name(&fullname, service_type).to_string(),
        }),

        MdnsEvent::ServiceResolved(info) => {
            let mut properties = HashMap::new();
            for prop in info.get_properties().iter() {
                properties.insert(prop.key().to_string(), prop.val_str().to_string());
            }

            let addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
            let address = addresses
                .iter()
                .find(|addr| addr.is_ipv4())
                .or_else(|| addresses.first())
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| info.get_hostname().trim_end_matches('.').to_string());

            Some(DiscoveryEvent::ResolveSucceeded {
                name: instance_name(info.get_fullname(), service_type).to_string(),
                address,
                properties,
            })
        }

        MdnsEvent::ServiceRemoved(_, fullname) => Some(DiscoveryEvent::Removed {
            name: instance_name(&fullname, service_type).to_string(),
        }),

        MdnsEvent::SearchStarted(ty) => {
            debug!(service_type = ty, "Search started");
            None
        }

        other => {
            debug!(?other, "Unhandled mDNS event");
            None
        }
    }
}

/// Strips the service-type suffix from a fully-qualified instance name,
/// leaving the provider-assigned instance label
fn instance_name<'a>(fullname: &'a str, service_type: &str) -> &'a str {
    let suffix = format!(".{}", service_type);
    fullname
        .strip_suffix(&suffix)
        .or_else(|| fullname.strip_suffix(service_type))
        .unwrap_or(fullname)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_name_trims_service_type() {
        assert_eq!(
            instance_name(
                "Living Room._tivo-device._tcp.local.",
                "_tivo-device._tcp.local."
            ),
            "Living Room"
        );
    }

    #[test]
    fn test_instance_name_passes_through_foreign_names() {
        assert_eq!(
            instance_name("Living Room", "_tivo-device._tcp.local."),
            "Living Room"
        );
    }

    #[test]
    fn test_session_creation() {
        let session = DiscoverySession::new(DiscoveryConfig::default());
        assert!(session.is_ok());
        assert_eq!(session.unwrap().state(), SessionState::Created);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DiscoveryConfig {
            service_type: String::new(),
            ..Default::default()
        };
        assert!(DiscoverySession::new(config).is_err());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_safe() {
        let session = DiscoverySession::new(DiscoveryConfig::default()).unwrap();
        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Stopped);

        // stop() is idempotent
        session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_start_after_stop_is_rejected() {
        let session = DiscoverySession::new(DiscoveryConfig::default()).unwrap();
        session.stop().await.unwrap();
        assert!(matches!(
            session.start().await,
            Err(DiscoveryError::AlreadyStopped)
        ));
    }

    fn spawn_pump(
        browse_rx: mdns_sd::Receiver<MdnsEvent>,
        event_rx: Receiver<DiscoveryEvent>,
        event_tx: Sender<DiscoveryEvent>,
        registry: Arc<DeviceRegistry>,
        state: Arc<Mutex<SessionState>>,
    ) -> JoinHandle<()> {
        tokio::spawn(run_pump(
            browse_rx,
            event_rx,
            event_tx,
            EventHandler::new(registry, "TSN"),
            state,
            || {},
            "_tivo-device._tcp.local.".to_string(),
            std::time::Duration::from_secs(30),
        ))
    }

    #[tokio::test]
    async fn test_browser_failure_stops_pump_and_session() {
        let registry = Arc::new(DeviceRegistry::new());
        let state = Arc::new(Mutex::new(SessionState::Running));
        let (_browse_tx, browse_rx) = flume::unbounded::<MdnsEvent>();
        let (event_tx, event_rx) = async_channel::bounded(16);
        // Keep a receiver alive so the channel stays open after the pump
        // drops its end; the post-exit send below must succeed unprocessed.
        let _keep_rx = event_rx.clone();

        let pump = spawn_pump(
            browse_rx,
            event_rx,
            event_tx.clone(),
            Arc::clone(&registry),
            Arc::clone(&state),
        );

        event_tx
            .send(DiscoveryEvent::Added {
                name: "Living Room".to_string(),
            })
            .await
            .unwrap();
        event_tx
            .send(DiscoveryEvent::BrowseFailure {
                reason: "daemon went away".to_string(),
            })
            .await
            .unwrap();

        pump.await.unwrap();
        assert_eq!(*state.lock(), SessionState::Stopped);

        // Devices seen before the failure survive, and nothing drains the
        // channel once the pump has exited.
        assert!(registry.contains("Living Room"));
        event_tx
            .send(DiscoveryEvent::Added {
                name: "Bedroom".to_string(),
            })
            .await
            .unwrap();
        assert!(!registry.contains("Bedroom"));
    }

    #[tokio::test]
    async fn test_lost_provider_channel_stops_pump_and_session() {
        let registry = Arc::new(DeviceRegistry::new());
        let state = Arc::new(Mutex::new(SessionState::Running));
        let (browse_tx, browse_rx) = flume::unbounded::<MdnsEvent>();
        let (event_tx, event_rx) = async_channel::bounded(16);

        // The provider side vanishing without an orderly stop is a
        // connection failure.
        drop(browse_tx);

        let pump = spawn_pump(
            browse_rx,
            event_rx,
            event_tx.clone(),
            Arc::clone(&registry),
            Arc::clone(&state),
        );

        pump.await.unwrap();
        assert_eq!(*state.lock(), SessionState::Stopped);
        assert!(registry.is_empty());
    }

    // Note: starting a real session needs multicast networking, which is
    // unavailable in most CI environments, so start() against a live
    // daemon is not exercised here.
}
