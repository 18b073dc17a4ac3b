//! Feed session lifecycle.
//!
//! A [`FeedSession`] owns everything one running feed needs: the aircraft
//! registry, the outbound broadcast channel and the handle of the background
//! worker. Start and stop are serialized by a single async mutex; status reads
//! never wait on it.

use serde::Serialize;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aircraft::OutboundEvent;
use crate::client::{FeedClient, FeedConfig};
use crate::registry::AircraftRegistry;
use crate::stats::FeedStats;

/// Errors in a user-supplied feed address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Feed address must be host:port, got '{0}'")]
    MissingPort(String),

    #[error("Invalid port in feed address: '{0}'")]
    InvalidPort(String),

    #[error("Feed address has an empty host")]
    EmptyHost,
}

/// Split a `host:port` string. IPv6 hosts keep their brackets.
pub fn parse_feed_address(address: &str) -> Result<(String, u16), AddressError> {
    let address = address.trim();
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| AddressError::MissingPort(address.to_string()))?;

    if host.is_empty() {
        return Err(AddressError::EmptyHost);
    }
    let port: u16 = port
        .parse()
        .map_err(|_| AddressError::InvalidPort(port.to_string()))?;

    Ok((host.to_string(), port))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Started,
    AlreadyRunning,
    Error,
}

/// Result of a start request.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub status: StartStatus,
    pub message: String,
}

impl StartOutcome {
    fn new(status: StartStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(StartStatus::Error, message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Stopped,
}

/// Result of a stop request. Always `stopped`.
#[derive(Debug, Clone, Serialize)]
pub struct StopOutcome {
    pub status: StopStatus,
}

/// Point-in-time view of the session.
#[derive(Debug, Clone, Serialize)]
pub struct FeedStatus {
    pub active: bool,
    pub address: Option<String>,
    pub aircraft: usize,
}

struct RunningFeed {
    address: String,
    active: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns the registry, the event channel and the feed worker.
pub struct FeedSession {
    config: FeedConfig,
    registry: Arc<AircraftRegistry>,
    events: broadcast::Sender<OutboundEvent>,
    stats: Arc<FeedStats>,
    running: Mutex<Option<RunningFeed>>,
    /// Address of the running feed, readable while a stop is in progress.
    current: RwLock<Option<String>>,
}

impl FeedSession {
    /// Create an idle session.
    ///
    /// `config` supplies timeouts and the default address; `event_buffer` is
    /// the number of events a slow subscriber may fall behind before lagging.
    pub fn new(config: FeedConfig, event_buffer: usize, stats: Arc<FeedStats>) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            config,
            registry: Arc::new(AircraftRegistry::new()),
            events,
            stats,
            running: Mutex::new(None),
            current: RwLock::new(None),
        }
    }

    /// The configured feed address, used when a start request names none.
    pub fn default_address(&self) -> String {
        self.config.address()
    }

    pub fn registry(&self) -> &Arc<AircraftRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<FeedStats> {
        &self.stats
    }

    /// Register a new subscriber on the outbound event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.events.subscribe()
    }

    /// Start ingesting from `address` (`host:port`).
    ///
    /// Returns `already_running` without side effects if a feed is active.
    pub async fn start(&self, address: &str) -> StartOutcome {
        let mut running = self.running.lock().await;

        if let Some(feed) = running.as_ref() {
            return StartOutcome::new(
                StartStatus::AlreadyRunning,
                format!("ADS-B already running ({})", feed.address),
            );
        }

        let (host, port) = match parse_feed_address(address) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Refusing to start feed: {}", e);
                return StartOutcome::error(e.to_string());
            }
        };

        let config = self.config.clone().with_server(host, port);
        let address = config.address();
        let (active, active_rx) = watch::channel(true);
        let client = FeedClient::new(
            config,
            Arc::clone(&self.registry),
            self.events.clone(),
            Arc::clone(&self.stats),
        );
        let handle = tokio::spawn(client.run(active_rx));

        info!("ADS-B tracking started on {}", address);
        self.set_current(Some(address.clone()));
        *running = Some(RunningFeed {
            address: address.clone(),
            active,
            handle,
        });

        StartOutcome::new(
            StartStatus::Started,
            format!("ADS-B tracking started on {}", address),
        )
    }

    /// Stop the feed, wait for the worker to exit and forget all aircraft.
    ///
    /// Safe to call when nothing is running.
    pub async fn stop(&self) -> StopOutcome {
        let mut running = self.running.lock().await;

        if let Some(feed) = running.take() {
            self.set_current(None);
            let _ = feed.active.send(false);
            if let Err(e) = feed.handle.await {
                warn!("Feed worker for {} ended abnormally: {}", feed.address, e);
            }
            info!("ADS-B tracking stopped ({})", feed.address);
        }
        self.registry.clear();

        StopOutcome {
            status: StopStatus::Stopped,
        }
    }

    /// Current session state.
    ///
    /// Does not take the start/stop lock, so a feed that is being stopped
    /// already reports as inactive.
    pub fn status(&self) -> FeedStatus {
        let address = self
            .current
            .read()
            .ok()
            .and_then(|current| current.clone());
        FeedStatus {
            active: address.is_some(),
            address,
            aircraft: self.registry.len(),
        }
    }

    fn set_current(&self, address: Option<String>) {
        if let Ok(mut current) = self.current.write() {
            *current = address;
        }
    }
}
