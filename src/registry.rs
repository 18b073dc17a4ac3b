//! In-memory registry of tracked aircraft.
//!
//! The feed worker is the only writer. HTTP handlers read point-in-time
//! snapshots concurrently, so the map sits behind a `RwLock`.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::aircraft::{AircraftRecord, AircraftUpdate};

/// Thread-safe map from ICAO address to the latest known aircraft state.
#[derive(Debug, Default)]
pub struct AircraftRegistry {
    aircraft: RwLock<HashMap<String, AircraftRecord>>,
}

impl AircraftRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a partial update into the record for `icao`, creating it if needed.
    ///
    /// Fields missing from `update` never clear existing values.
    pub fn apply_update(&self, icao: &str, update: &AircraftUpdate) {
        if let Ok(mut map) = self.aircraft.write() {
            map.entry(icao.to_string())
                .or_insert_with(|| AircraftRecord::new(icao))
                .merge(update);
        }
    }

    /// Current state of one aircraft.
    pub fn snapshot(&self, icao: &str) -> Option<AircraftRecord> {
        self.aircraft
            .read()
            .ok()
            .and_then(|map| map.get(icao).cloned())
    }

    /// Current state of every aircraft, ordered by ICAO address.
    pub fn snapshot_all(&self) -> Vec<AircraftRecord> {
        let mut all: Vec<AircraftRecord> = self
            .aircraft
            .read()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        all.sort_by(|a, b| a.icao.cmp(&b.icao));
        all
    }

    /// Number of aircraft currently tracked.
    pub fn len(&self) -> usize {
        self.aircraft.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Whether no aircraft are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every aircraft.
    pub fn clear(&self) {
        if let Ok(mut map) = self.aircraft.write() {
            map.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn altitude(alt: i32) -> AircraftUpdate {
        AircraftUpdate {
            altitude: Some(alt),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_creates_record() {
        let registry = AircraftRegistry::new();
        assert!(registry.is_empty());

        registry.apply_update("ABC123", &altitude(5000));

        let record = registry.snapshot("ABC123").expect("Record should exist");
        assert_eq!(record.icao, "ABC123");
        assert_eq!(record.altitude, Some(5000));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_update_still_creates_record() {
        let registry = AircraftRegistry::new();
        registry.apply_update("ABC123", &AircraftUpdate::default());
        assert_eq!(registry.snapshot("ABC123"), Some(AircraftRecord::new("ABC123")));
    }

    #[test]
    fn test_monotonic_merge() {
        let registry = AircraftRegistry::new();
        registry.apply_update(
            "ABC123",
            &AircraftUpdate {
                altitude: Some(5000),
                position: Some((40.1, -73.9)),
                ..Default::default()
            },
        );
        registry.apply_update(
            "ABC123",
            &AircraftUpdate {
                callsign: Some("UAL123".to_string()),
                ..Default::default()
            },
        );

        let record = registry.snapshot("ABC123").unwrap();
        assert_eq!(record.callsign.as_deref(), Some("UAL123"));
        assert_eq!(record.altitude, Some(5000));
        assert_eq!(record.latitude, Some(40.1));
        assert_eq!(record.longitude, Some(-73.9));
    }

    #[test]
    fn test_snapshot_all_sorted() {
        let registry = AircraftRegistry::new();
        registry.apply_update("C00003", &altitude(3));
        registry.apply_update("A00001", &altitude(1));
        registry.apply_update("B00002", &altitude(2));

        let icaos: Vec<_> = registry
            .snapshot_all()
            .into_iter()
            .map(|r| r.icao)
            .collect();
        assert_eq!(icaos, vec!["A00001", "B00002", "C00003"]);
    }

    #[test]
    fn test_clear() {
        let registry = AircraftRegistry::new();
        registry.apply_update("ABC123", &altitude(5000));
        registry.clear();

        assert!(registry.is_empty());
        assert!(registry.snapshot("ABC123").is_none());
    }
}
