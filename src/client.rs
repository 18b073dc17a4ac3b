//! TCP client for SBS feeds.
//!
//! Connects to a BaseStation-format port (dump1090's `--net` port 30003),
//! decodes each line, merges it into the aircraft registry and hands changed
//! aircraft to the batch publisher. The connection loop reconnects with a
//! fixed backoff until the session's active flag is cleared.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::aircraft::OutboundEvent;
use crate::parser::{looks_like_message, parse_message};
use crate::publisher::BatchPublisher;
use crate::registry::AircraftRegistry;
use crate::stats::FeedStats;

/// Default host running the decoder.
pub const DEFAULT_FEED_HOST: &str = "localhost";

/// Default SBS output port of dump1090.
pub const DEFAULT_FEED_PORT: u16 = 30003;

/// Longest line accepted from the feed. Longer input is dropped up to the next newline.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Configuration for the feed client.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Hostname of the SBS feed.
    pub host: String,

    /// Port number.
    pub port: u16,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// How long a read may wait for data before the loop re-checks its state.
    pub read_timeout: Duration,

    /// Delay between reconnection attempts.
    pub reconnect_delay: Duration,

    /// Minimum time between snapshot publishes.
    pub publish_interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FEED_HOST.to_string(),
            port: DEFAULT_FEED_PORT,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
            publish_interval: Duration::from_secs(1),
        }
    }
}

impl FeedConfig {
    /// Set the host and port.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// The `host:port` string to connect to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Async SBS feed client.
pub struct FeedClient {
    config: FeedConfig,
    registry: Arc<AircraftRegistry>,
    events: broadcast::Sender<OutboundEvent>,
    stats: Arc<FeedStats>,
}

impl FeedClient {
    /// Create a new client that writes into `registry` and publishes on `events`.
    pub fn new(
        config: FeedConfig,
        registry: Arc<AircraftRegistry>,
        events: broadcast::Sender<OutboundEvent>,
        stats: Arc<FeedStats>,
    ) -> Self {
        Self {
            config,
            registry,
            events,
            stats,
        }
    }

    /// Run the connection loop until `active` becomes false.
    ///
    /// Connection failures and dropped connections are logged and retried
    /// after `reconnect_delay`; they never end the loop.
    pub async fn run(self, mut active: watch::Receiver<bool>) {
        let addr = self.config.address();
        let mut publisher = BatchPublisher::new(
            self.config.publish_interval,
            self.events.clone(),
            Arc::clone(&self.stats),
        );

        info!("SBS stream reader started for {}", addr);

        while *active.borrow() {
            match self.connect_and_stream(&mut publisher, &active).await {
                Ok(()) => {
                    info!("Connection to {} closed", addr);
                }
                Err(e) => {
                    self.stats.record_connection_failure();
                    warn!("SBS connection error: {:#}", e);
                }
            }

            if !*active.borrow() {
                break;
            }

            info!(
                "Reconnecting to {} in {}ms...",
                addr,
                self.config.reconnect_delay.as_millis()
            );
            tokio::select! {
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
                changed = active.changed() => {
                    if changed.is_err() {
                        // Session dropped without an explicit stop
                        break;
                    }
                }
            }
        }

        info!("SBS stream reader stopped");
    }

    /// Connect to the feed and process lines until disconnected or deactivated.
    async fn connect_and_stream(
        &self,
        publisher: &mut BatchPublisher,
        active: &watch::Receiver<bool>,
    ) -> Result<()> {
        let addr = self.config.address();
        info!("Connecting to {}...", addr);

        let stream = timeout(self.config.connect_timeout, TcpStream::connect(&addr))
            .await
            .context("Connection timeout")?
            .context("Failed to connect")?;

        info!("Connected to {}", addr);
        self.stats.record_connected();

        let mut reader = BufReader::new(stream);
        // Survives read timeouts, so a line split across packets is reassembled
        let mut line_buf: Vec<u8> = Vec::with_capacity(256);
        // Set while skipping the rest of an overlong line
        let mut discarding = false;

        // A dropped sender means the session is gone without a stop
        while *active.borrow() && active.has_changed().is_ok() {
            // Never empty: the buffer is cleared once it reaches the limit
            let limit = (MAX_LINE_LEN - line_buf.len()) as u64;
            let mut limited = (&mut reader).take(limit);
            let read = limited.read_until(b'\n', &mut line_buf);
            let read_result = timeout(self.config.read_timeout, read).await;

            match read_result {
                Ok(Ok(0)) => {
                    // EOF - connection closed
                    return Ok(());
                }
                Ok(Ok(_n)) => {
                    if line_buf.last() != Some(&b'\n') {
                        if line_buf.len() >= MAX_LINE_LEN {
                            if !discarding {
                                self.stats.record_non_message();
                                warn!("Dropping line longer than {} bytes", MAX_LINE_LEN);
                            }
                            discarding = true;
                            line_buf.clear();
                            continue;
                        }
                        trace!("Discarding {} bytes of unterminated input", line_buf.len());
                        return Ok(());
                    }
                    if discarding {
                        discarding = false;
                    } else {
                        let line = String::from_utf8_lossy(&line_buf);
                        self.process_line(line.trim(), publisher);
                    }
                    line_buf.clear();
                    publisher.maybe_flush(&self.registry);
                }
                Ok(Err(e)) => {
                    return Err(e).context("Read error");
                }
                Err(_) => {
                    trace!("No data from {} within read timeout", addr);
                    publisher.maybe_flush(&self.registry);
                }
            }
        }

        Ok(())
    }

    /// Decode one line and merge it into the registry.
    fn process_line(&self, line: &str, publisher: &mut BatchPublisher) {
        if line.is_empty() {
            return;
        }

        self.stats.record_line(line.len() as u64);
        trace!("Received: {}", line);

        // Quick filter for non-message lines
        if !looks_like_message(line) {
            self.stats.record_non_message();
            debug!("Non-message line: {}", line);
            return;
        }

        match parse_message(line) {
            Ok(msg) => {
                self.registry.apply_update(&msg.icao, &msg.update);
                publisher.mark(&msg.icao);
                self.stats.record_message();
            }
            Err(e) => {
                self.stats.record_rejected();
                debug!("Rejected '{}': {}", line, e);
            }
        }
    }
}
