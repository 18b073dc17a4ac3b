//! Data structures representing tracked aircraft.
//!
//! An [`AircraftRecord`] is the merged view of everything the feed has told us
//! about one airframe. Individual SBS messages only ever carry a few fields, so
//! the decoder produces an [`AircraftUpdate`] which is overlaid onto the record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A partial set of aircraft fields carried by a single SBS message.
///
/// Every field is optional; `None` means "this message said nothing about it",
/// never "the value is now unknown".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AircraftUpdate {
    pub callsign: Option<String>,
    pub altitude: Option<i32>,
    /// Latitude and longitude, only ever set together.
    pub position: Option<(f64, f64)>,
    pub speed: Option<i32>,
    pub heading: Option<i32>,
    pub squawk: Option<String>,
}

impl AircraftUpdate {
    /// Returns true if the update carries no fields at all.
    pub fn is_empty(&self) -> bool {
        self.callsign.is_none()
            && self.altitude.is_none()
            && self.position.is_none()
            && self.speed.is_none()
            && self.heading.is_none()
            && self.squawk.is_none()
    }
}

/// The latest known state of one aircraft.
///
/// Serializes to the field names used on the outbound event stream:
/// ```text
/// {"icao":"ABC123","callsign":"UAL123","alt":5000,"lat":40.1,"lon":-73.9}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AircraftRecord {
    /// ICAO 24-bit address as uppercase hex.
    pub icao: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,

    /// Barometric altitude in feet.
    #[serde(rename = "alt", default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<i32>,

    #[serde(rename = "lat", default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(rename = "lon", default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Ground speed in knots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,

    /// Track over ground in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<i32>,

    /// Transponder code, kept exactly as received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub squawk: Option<String>,
}

impl AircraftRecord {
    /// Create an empty record for the given identifier.
    pub fn new(icao: impl Into<String>) -> Self {
        Self {
            icao: icao.into(),
            callsign: None,
            altitude: None,
            latitude: None,
            longitude: None,
            speed: None,
            heading: None,
            squawk: None,
        }
    }

    /// Overlay the fields present in `update` onto this record.
    ///
    /// Fields absent from the update are left untouched.
    pub fn merge(&mut self, update: &AircraftUpdate) {
        if let Some(callsign) = &update.callsign {
            self.callsign = Some(callsign.clone());
        }
        if let Some(altitude) = update.altitude {
            self.altitude = Some(altitude);
        }
        if let Some((lat, lon)) = update.position {
            self.latitude = Some(lat);
            self.longitude = Some(lon);
        }
        if let Some(speed) = update.speed {
            self.speed = Some(speed);
        }
        if let Some(heading) = update.heading {
            self.heading = Some(heading);
        }
        if let Some(squawk) = &update.squawk {
            self.squawk = Some(squawk.clone());
        }
    }

    /// Returns true if both latitude and longitude are known.
    pub fn has_position(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}

impl fmt::Display for AircraftRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.icao)?;
        if let Some(callsign) = &self.callsign {
            write!(f, " {}", callsign)?;
        }
        if let Some(alt) = self.altitude {
            write!(f, " {}ft", alt)?;
        }
        if let (Some(lat), Some(lon)) = (self.latitude, self.longitude) {
            write!(f, " ({:.4}, {:.4})", lat, lon)?;
        }
        if let Some(speed) = self.speed {
            write!(f, " {}kt", speed)?;
        }
        if let Some(heading) = self.heading {
            write!(f, " {}°", heading)?;
        }
        if let Some(squawk) = &self.squawk {
            write!(f, " sq{}", squawk)?;
        }
        Ok(())
    }
}

/// An event delivered to stream subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundEvent {
    /// Snapshot of one aircraft that changed during the last publish window.
    Aircraft(AircraftRecord),
    /// Sent when a subscriber has been idle for the keepalive interval.
    Keepalive,
}

impl OutboundEvent {
    /// Returns the aircraft snapshot, if this is an aircraft event.
    pub fn aircraft(&self) -> Option<&AircraftRecord> {
        match self {
            OutboundEvent::Aircraft(record) => Some(record),
            OutboundEvent::Keepalive => None,
        }
    }
}
