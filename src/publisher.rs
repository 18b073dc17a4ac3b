//! Coalescing publisher for aircraft snapshots.
//!
//! The feed can deliver hundreds of messages per second. Rather than forward
//! each one, the publisher remembers which aircraft changed and, once per
//! interval, sends a single snapshot for each of them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::debug;

use crate::aircraft::OutboundEvent;
use crate::registry::AircraftRegistry;
use crate::stats::FeedStats;

/// Aircraft that received at least one update since the last publish.
#[derive(Debug, Default)]
pub struct ChangeSet {
    dirty: HashSet<String>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an aircraft as changed. Marking twice is the same as once.
    pub fn mark(&mut self, icao: &str) {
        if !self.dirty.contains(icao) {
            self.dirty.insert(icao.to_string());
        }
    }

    pub fn contains(&self, icao: &str) -> bool {
        self.dirty.contains(icao)
    }

    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    /// Take every marked identifier, leaving the set empty.
    pub fn drain(&mut self) -> Vec<String> {
        let mut drained: Vec<String> = self.dirty.drain().collect();
        drained.sort();
        drained
    }
}

/// Publishes at most one snapshot per changed aircraft per interval.
pub struct BatchPublisher {
    interval: Duration,
    last_publish: Instant,
    changes: ChangeSet,
    events: broadcast::Sender<OutboundEvent>,
    stats: Arc<FeedStats>,
}

impl BatchPublisher {
    /// Create a publisher whose first window starts now.
    pub fn new(
        interval: Duration,
        events: broadcast::Sender<OutboundEvent>,
        stats: Arc<FeedStats>,
    ) -> Self {
        Self {
            interval,
            last_publish: Instant::now(),
            changes: ChangeSet::new(),
            events,
            stats,
        }
    }

    /// Record that `icao` changed during the current window.
    pub fn mark(&mut self, icao: &str) {
        self.changes.mark(icao);
    }

    /// Aircraft waiting for the next publish.
    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    /// Publish pending snapshots if the interval has elapsed.
    ///
    /// Returns the number of events sent, or 0 if the window is still open.
    pub fn maybe_flush(&mut self, registry: &AircraftRegistry) -> usize {
        self.maybe_flush_at(registry, Instant::now())
    }

    fn maybe_flush_at(&mut self, registry: &AircraftRegistry, now: Instant) -> usize {
        if now.duration_since(self.last_publish) < self.interval {
            return 0;
        }

        let mut sent = 0;
        for icao in self.changes.drain() {
            // Aircraft cleared from the registry since being marked are skipped
            let Some(record) = registry.snapshot(&icao) else {
                continue;
            };
            // A send error only means nobody is subscribed right now
            let _ = self.events.send(OutboundEvent::Aircraft(record));
            sent += 1;
        }
        self.last_publish = now;

        if sent > 0 {
            self.stats.record_batch(sent as u64);
            debug!("Published {} aircraft snapshots", sent);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aircraft::AircraftUpdate;

    fn setup(interval: Duration) -> (BatchPublisher, broadcast::Receiver<OutboundEvent>) {
        let (tx, rx) = broadcast::channel(64);
        let publisher = BatchPublisher::new(interval, tx, Arc::new(FeedStats::new()));
        (publisher, rx)
    }

    #[test]
    fn test_change_set_dedup() {
        let mut changes = ChangeSet::new();
        changes.mark("ABC123");
        changes.mark("ABC123");
        changes.mark("DEF456");

        assert_eq!(changes.len(), 2);
        assert!(changes.contains("ABC123"));
        assert_eq!(changes.drain(), vec!["ABC123", "DEF456"]);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_no_flush_before_interval() {
        let registry = AircraftRegistry::new();
        let (mut publisher, mut rx) = setup(Duration::from_secs(3600));

        registry.apply_update("ABC123", &AircraftUpdate::default());
        publisher.mark("ABC123");

        assert_eq!(publisher.maybe_flush(&registry), 0);
        assert_eq!(publisher.pending(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_coalesces_updates_within_window() {
        let registry = AircraftRegistry::new();
        let (mut publisher, mut rx) = setup(Duration::from_secs(1));
        let start = publisher.last_publish;

        registry.apply_update(
            "ABC123",
            &AircraftUpdate {
                altitude: Some(5000),
                ..Default::default()
            },
        );
        publisher.mark("ABC123");
        registry.apply_update(
            "ABC123",
            &AircraftUpdate {
                altitude: Some(5200),
                callsign: Some("UAL123".to_string()),
                ..Default::default()
            },
        );
        publisher.mark("ABC123");

        let sent = publisher.maybe_flush_at(&registry, start + Duration::from_secs(1));
        assert_eq!(sent, 1);

        let event = rx.try_recv().expect("One event should be published");
        let record = event.aircraft().expect("Should be an aircraft event");
        assert_eq!(record.altitude, Some(5200));
        assert_eq!(record.callsign.as_deref(), Some("UAL123"));
        assert!(rx.try_recv().is_err());
        assert_eq!(publisher.pending(), 0);
    }

    #[test]
    fn test_window_resets_after_flush() {
        let registry = AircraftRegistry::new();
        let (mut publisher, mut rx) = setup(Duration::from_secs(1));
        let start = publisher.last_publish;

        registry.apply_update("ABC123", &AircraftUpdate::default());
        publisher.mark("ABC123");
        assert_eq!(
            publisher.maybe_flush_at(&registry, start + Duration::from_secs(1)),
            1
        );

        publisher.mark("ABC123");
        assert_eq!(
            publisher.maybe_flush_at(&registry, start + Duration::from_millis(1500)),
            0
        );
        assert_eq!(
            publisher.maybe_flush_at(&registry, start + Duration::from_secs(2)),
            1
        );

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_skips_aircraft_missing_from_registry() {
        let registry = AircraftRegistry::new();
        let (mut publisher, mut rx) = setup(Duration::ZERO);

        publisher.mark("GONE00");
        assert_eq!(publisher.maybe_flush(&registry), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_flush_without_subscribers() {
        let registry = AircraftRegistry::new();
        let (tx, rx) = broadcast::channel(4);
        drop(rx);
        let stats = Arc::new(FeedStats::new());
        let mut publisher = BatchPublisher::new(Duration::ZERO, tx, Arc::clone(&stats));

        registry.apply_update("ABC123", &AircraftUpdate::default());
        publisher.mark("ABC123");

        assert_eq!(publisher.maybe_flush(&registry), 1);
        assert_eq!(stats.summary().events_published, 1);
    }
}
