//! Statistics tracking for the SBS feed.
//!
//! Counters are updated from the feed worker and read by the HTTP handlers
//! and the periodic stats printer, so everything here is lock-free or behind
//! short-lived `RwLock`s.

use hdrhistogram::Histogram;
use serde::Serialize;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Thread-safe statistics collector for the feed pipeline.
#[derive(Debug)]
pub struct FeedStats {
    /// Non-empty lines read from the socket
    pub lines_received: AtomicU64,

    /// Raw bytes read from the socket
    pub bytes_received: AtomicU64,

    /// `MSG` records applied to the registry
    pub messages_applied: AtomicU64,

    /// Lines that did not look like `MSG` records
    pub non_message_lines: AtomicU64,

    /// `MSG`-prefixed lines that were still rejected
    pub rejected_lines: AtomicU64,

    /// Successful TCP connections to the feed
    pub connections: AtomicU64,

    /// Connection attempts or sessions that ended in an error
    pub connection_failures: AtomicU64,

    /// Publish ticks that sent at least one event
    pub publish_batches: AtomicU64,

    /// Aircraft events sent to subscribers
    pub events_published: AtomicU64,

    /// Aircraft per publish batch
    batch_histogram: RwLock<Histogram<u64>>,

    /// When stats collection started
    start_time: Instant,
}

impl FeedStats {
    /// Create a new statistics collector.
    pub fn new() -> Self {
        Self {
            lines_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_applied: AtomicU64::new(0),
            non_message_lines: AtomicU64::new(0),
            rejected_lines: AtomicU64::new(0),
            connections: AtomicU64::new(0),
            connection_failures: AtomicU64::new(0),
            publish_batches: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            // 1 to 100k aircraft per batch, 2 significant figures
            batch_histogram: RwLock::new(
                Histogram::new_with_bounds(1, 100_000, 2)
                    .expect("Failed to create batch histogram"),
            ),
            start_time: Instant::now(),
        }
    }

    /// Record a line read from the feed.
    pub fn record_line(&self, bytes: u64) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a message merged into the registry.
    pub fn record_message(&self) {
        self.messages_applied.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a line that was not an SBS message.
    pub fn record_non_message(&self) {
        self.non_message_lines.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message line that failed validation.
    pub fn record_rejected(&self) {
        self.rejected_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connected(&self) {
        self.connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_connection_failure(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one publish tick that sent `events` snapshots.
    pub fn record_batch(&self, events: u64) {
        self.publish_batches.fetch_add(1, Ordering::Relaxed);
        self.events_published.fetch_add(events, Ordering::Relaxed);
        if let Ok(mut hist) = self.batch_histogram.write() {
            let _ = hist.record(events.clamp(1, 100_000));
        }
    }

    /// Get the elapsed time since stats collection started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get the current message rate.
    pub fn messages_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.messages_applied.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Generate a summary report.
    pub fn summary(&self) -> StatsSummary {
        let batch_percentiles = self
            .batch_histogram
            .read()
            .ok()
            .filter(|h| !h.is_empty())
            .map(|h| HistogramPercentiles {
                p50: h.value_at_quantile(0.50),
                p90: h.value_at_quantile(0.90),
                p99: h.value_at_quantile(0.99),
                min: h.min(),
                max: h.max(),
                mean: h.mean(),
            });

        StatsSummary {
            elapsed_secs: self.elapsed().as_secs_f64(),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_applied: self.messages_applied.load(Ordering::Relaxed),
            non_message_lines: self.non_message_lines.load(Ordering::Relaxed),
            rejected_lines: self.rejected_lines.load(Ordering::Relaxed),
            connections: self.connections.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            publish_batches: self.publish_batches.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            messages_per_second: self.messages_per_second(),
            batch_percentiles,
        }
    }
}

impl Default for FeedStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile values from a histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramPercentiles {
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
}

/// Summary of collected statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub elapsed_secs: f64,
    pub lines_received: u64,
    pub bytes_received: u64,
    pub messages_applied: u64,
    pub non_message_lines: u64,
    pub rejected_lines: u64,
    pub connections: u64,
    pub connection_failures: u64,
    pub publish_batches: u64,
    pub events_published: u64,
    pub messages_per_second: f64,
    pub batch_percentiles: Option<HistogramPercentiles>,
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f, "                 SBS FEED STATISTICS")?;
        writeln!(f, "═══════════════════════════════════════════════════════")?;
        writeln!(f)?;
        writeln!(f, "Runtime: {:.1}s", self.elapsed_secs)?;
        writeln!(f, "Lines received: {}", self.lines_received)?;
        writeln!(
            f,
            "Messages applied: {} ({:.1}%)",
            self.messages_applied,
            if self.lines_received > 0 {
                self.messages_applied as f64 / self.lines_received as f64 * 100.0
            } else {
                0.0
            }
        )?;
        writeln!(f, "Non-message lines: {}", self.non_message_lines)?;
        writeln!(f, "Rejected lines: {}", self.rejected_lines)?;
        writeln!(f, "Bytes received: {} KB", self.bytes_received / 1024)?;
        writeln!(f, "Rate: {:.1} msg/sec", self.messages_per_second)?;
        writeln!(f)?;
        writeln!(
            f,
            "Connections: {} ({} failed)",
            self.connections, self.connection_failures
        )?;
        writeln!(
            f,
            "Published: {} events in {} batches",
            self.events_published, self.publish_batches
        )?;

        if let Some(ref p) = self.batch_percentiles {
            writeln!(f)?;
            writeln!(f, "Batch Size (aircraft):")?;
            writeln!(f, "  Min: {}, Max: {}, Mean: {:.1}", p.min, p.max, p.mean)?;
            writeln!(f, "  P50: {}, P90: {}, P99: {}", p.p50, p.p90, p.p99)?;
        }

        Ok(())
    }
}
