//! Decoder for SBS (BaseStation) messages.
//!
//! dump1090 and friends publish decoded traffic on TCP port 30003 as one
//! comma-separated record per line. Only `MSG` records are of interest; every
//! other line is noise that gets dropped without complaint.
//!
//! # Record Format
//!
//! ```text
//! MSG,<type>,<tx>,<session>,<icao>,<flight_id>,<date_gen>,<time_gen>,<date_log>,<time_log>,
//!     <callsign>,<altitude>,<ground_speed>,<track>,<lat>,<lon>,<vrate>,<squawk>,
//!     <alert>,<emergency>,<spi>,<on_ground>
//! ```
//!
//! Example:
//! ```text
//! MSG,3,1,1,ABC123,1,2024,1,1,,,5000,,,40.1,-73.9,,,,,,0
//! ```

use nom::{IResult, Parser, combinator::all_consuming, number::complete::double};
use thiserror::Error;

use crate::aircraft::AircraftUpdate;

/// Minimum number of comma-separated fields for a record to be considered.
pub const MIN_FIELDS: usize = 11;

const IDX_TYPE: usize = 1;
const IDX_ICAO: usize = 4;
const IDX_CALLSIGN: usize = 10;
const IDX_ALTITUDE: usize = 11;
const IDX_SPEED: usize = 12;
const IDX_TRACK: usize = 13;
const IDX_LATITUDE: usize = 14;
const IDX_LONGITUDE: usize = 15;
const IDX_SQUAWK: usize = 17;

/// Reasons a line is rejected. None of these are fatal; the line is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Not an SBS MSG record")]
    NotMessage,

    #[error("Too few fields: expected at least {MIN_FIELDS}, got {found}")]
    TooFewFields { found: usize },

    #[error("Missing aircraft identifier")]
    MissingAircraftId,
}

/// Result type for decoding operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// SBS transmission types carried in the second field of a `MSG` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// MSG,1: ES identification and category
    Identification,
    /// MSG,2: ES surface position
    SurfacePosition,
    /// MSG,3: ES airborne position
    AirbornePosition,
    /// MSG,4: ES airborne velocity
    AirborneVelocity,
    /// MSG,5: Surveillance altitude
    SurveillanceAlt,
    /// MSG,6: Surveillance ID (squawk)
    SurveillanceId,
    /// MSG,7: Air-to-air
    AirToAir,
    /// MSG,8: All-call reply
    AllCallReply,
}

impl MessageType {
    /// Map the raw type field to a message type. Matching is exact.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Identification),
            "2" => Some(Self::SurfacePosition),
            "3" => Some(Self::AirbornePosition),
            "4" => Some(Self::AirborneVelocity),
            "5" => Some(Self::SurveillanceAlt),
            "6" => Some(Self::SurveillanceId),
            "7" => Some(Self::AirToAir),
            "8" => Some(Self::AllCallReply),
            _ => None,
        }
    }
}

/// A decoded `MSG` record: which aircraft it refers to and what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct SbsUpdate {
    /// Uppercased ICAO address.
    pub icao: String,
    /// `None` for type codes outside 1..=8.
    pub message_type: Option<MessageType>,
    /// Fields carried by this record; may be empty.
    pub update: AircraftUpdate,
}

/// Non-empty field at `idx`, if the record is long enough.
fn field<'a>(fields: &[&'a str], idx: usize) -> Option<&'a str> {
    fields.get(idx).copied().filter(|f| !f.is_empty())
}

fn number(input: &str) -> IResult<&str, f64> {
    double(input)
}

/// Parse a decimal number, tolerating surrounding whitespace.
///
/// Accepts integer, decimal and exponent forms. Non-finite values are rejected.
fn parse_number(input: &str) -> Option<f64> {
    let result = all_consuming(number).parse(input.trim());
    match result {
        Ok((_, value)) if value.is_finite() => Some(value),
        _ => None,
    }
}

/// Parse a numeric field as float and truncate toward zero, so `"3500.0"` is 3500.
///
/// Values outside the `i32` range are treated as unparseable.
fn parse_truncated(input: &str) -> Option<i32> {
    parse_number(input)
        .map(f64::trunc)
        .filter(|v| (i32::MIN as f64..=i32::MAX as f64).contains(v))
        .map(|v| v as i32)
}

fn parse_callsign(input: &str) -> Option<String> {
    let trimmed = input.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Decode one SBS line into a partial aircraft update.
///
/// Individual fields that fail to parse are skipped; they never cause the
/// whole record to be rejected.
///
/// # Example
///
/// ```
/// use adsb_feed::parser::parse_message;
///
/// let line = "MSG,3,1,1,abc123,1,2024,1,1,,,5000,,,40.1,-73.9,,,,,,0";
/// let msg = parse_message(line).unwrap();
/// assert_eq!(msg.icao, "ABC123");
/// assert_eq!(msg.update.altitude, Some(5000));
/// assert_eq!(msg.update.position, Some((40.1, -73.9)));
/// ```
pub fn parse_message(line: &str) -> ParseResult<SbsUpdate> {
    let line = line.trim();
    let fields: Vec<&str> = line.split(',').collect();

    if fields[0] != "MSG" {
        return Err(ParseError::NotMessage);
    }
    if fields.len() < MIN_FIELDS {
        return Err(ParseError::TooFewFields {
            found: fields.len(),
        });
    }

    let icao = fields[IDX_ICAO].to_ascii_uppercase();
    if icao.is_empty() {
        return Err(ParseError::MissingAircraftId);
    }

    let message_type = MessageType::from_code(fields[IDX_TYPE]);
    let n = fields.len();
    let mut update = AircraftUpdate::default();

    match message_type {
        Some(MessageType::Identification) if n > IDX_CALLSIGN => {
            update.callsign = field(&fields, IDX_CALLSIGN).and_then(parse_callsign);
        }
        Some(MessageType::AirbornePosition) if n > IDX_LONGITUDE => {
            update.altitude = field(&fields, IDX_ALTITUDE).and_then(parse_truncated);
            // Position is only taken as a complete pair
            if let (Some(lat), Some(lon)) = (
                field(&fields, IDX_LATITUDE).and_then(parse_number),
                field(&fields, IDX_LONGITUDE).and_then(parse_number),
            ) {
                update.position = Some((lat, lon));
            }
        }
        Some(MessageType::AirborneVelocity) if n > IDX_TRACK => {
            update.speed = field(&fields, IDX_SPEED).and_then(parse_truncated);
            update.heading = field(&fields, IDX_TRACK).and_then(parse_truncated);
        }
        Some(MessageType::SurveillanceAlt) if n > IDX_ALTITUDE => {
            update.callsign = field(&fields, IDX_CALLSIGN).and_then(parse_callsign);
            update.altitude = field(&fields, IDX_ALTITUDE).and_then(parse_truncated);
        }
        Some(MessageType::SurveillanceId) if n > IDX_SQUAWK => {
            update.squawk = field(&fields, IDX_SQUAWK).map(str::to_string);
        }
        _ => {}
    }

    Ok(SbsUpdate {
        icao,
        message_type,
        update,
    })
}

/// Check if a line looks like an SBS `MSG` record (quick pre-filter).
#[inline]
pub fn looks_like_message(line: &str) -> bool {
    line.trim_start().starts_with("MSG,")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_airborne_position() {
        let line = "MSG,3,1,1,ABC123,1,2024,1,1,,,5000,,,40.1,-73.9,,,,,,0";
        let msg = parse_message(line).expect("Should parse successfully");

        assert_eq!(msg.icao, "ABC123");
        assert_eq!(msg.message_type, Some(MessageType::AirbornePosition));
        assert_eq!(msg.update.altitude, Some(5000));
        assert_eq!(msg.update.position, Some((40.1, -73.9)));
        assert_eq!(msg.update.callsign, None);
    }

    #[test]
    fn test_position_read_from_fixed_columns() {
        // Latitude lands in column 15 here, so column 14 is blank and no pair is taken
        let line = "MSG,3,1,1,ABC123,1,2024,1,1,,,5000,,,,40.1,-73.9,,,,,,0";
        let msg = parse_message(line).expect("Should parse successfully");

        assert_eq!(msg.update.altitude, Some(5000));
        assert_eq!(msg.update.position, None);
    }

    #[test]
    fn test_parse_identification_trims_callsign() {
        let line = "MSG,1,1,1,ABC123,1,2024,1,1,,UAL123  ,,,,,,,,,,,0";
        let msg = parse_message(line).expect("Should parse successfully");

        assert_eq!(msg.message_type, Some(MessageType::Identification));
        assert_eq!(msg.update.callsign.as_deref(), Some("UAL123"));
    }

    #[test]
    fn test_blank_callsign_ignored() {
        let line = "MSG,1,1,1,ABC123,1,2024,1,1,,     ,,,,,,,,,,,0";
        let msg = parse_message(line).expect("Should parse successfully");
        assert!(msg.update.is_empty());
    }

    #[test]
    fn test_parse_velocity_truncates_floats() {
        let line = "MSG,4,1,1,4CA2D1,1,2024,1,1,,,,451.9,271.6,,,-64,,,,,0";
        let msg = parse_message(line).expect("Should parse successfully");

        assert_eq!(msg.update.speed, Some(451));
        assert_eq!(msg.update.heading, Some(271));
    }

    #[test]
    fn test_parse_surveillance_alt() {
        let line = "MSG,5,1,1,4CA2D1,1,2024,1,1,,RYR1AB,3500.0,,,,,,,0,,0,0";
        let msg = parse_message(line).expect("Should parse successfully");

        assert_eq!(msg.update.callsign.as_deref(), Some("RYR1AB"));
        assert_eq!(msg.update.altitude, Some(3500));
    }

    #[test]
    fn test_parse_squawk_kept_raw() {
        let line = "MSG,6,1,1,4CA2D1,1,2024,1,1,,,,,,,,,0457,0,0,0,0";
        let msg = parse_message(line).expect("Should parse successfully");

        assert_eq!(msg.update.squawk.as_deref(), Some("0457"));
    }

    #[test]
    fn test_icao_uppercased() {
        let line = "MSG,5,1,1,4ca2d1,1,2024,1,1,,,2000";
        let msg = parse_message(line).expect("Should parse successfully");
        assert_eq!(msg.icao, "4CA2D1");
    }

    #[test]
    fn test_bad_numeric_field_skipped() {
        let line = "MSG,3,1,1,ABC123,1,2024,1,1,,,high,,,40.1,-73.9,,,,,,0";
        let msg = parse_message(line).expect("Line should still decode");

        assert_eq!(msg.update.altitude, None);
        assert_eq!(msg.update.position, Some((40.1, -73.9)));
    }

    #[test]
    fn test_position_requires_both_halves() {
        let missing_lon = "MSG,3,1,1,ABC123,1,2024,1,1,,,5000,,,40.1,,,,,,,0";
        let msg = parse_message(missing_lon).unwrap();
        assert_eq!(msg.update.position, None);
        assert_eq!(msg.update.altitude, Some(5000));

        let bad_lon = "MSG,3,1,1,ABC123,1,2024,1,1,,,5000,,,40.1,west,,,,,,0";
        let msg = parse_message(bad_lon).unwrap();
        assert_eq!(msg.update.position, None);
    }

    #[test]
    fn test_non_finite_rejected() {
        let line = "MSG,4,1,1,ABC123,1,2024,1,1,,,,nan,inf";
        let msg = parse_message(line).unwrap();
        assert_eq!(msg.update.speed, None);
        assert_eq!(msg.update.heading, None);
    }

    #[test]
    fn test_out_of_range_numbers_skipped() {
        let line = "MSG,4,1,1,ABC123,1,2024,1,1,,,,1e12,-3000000000,,,0,,,,,0";
        let msg = parse_message(line).unwrap();
        assert_eq!(msg.update.speed, None);
        assert_eq!(msg.update.heading, None);

        let line = "MSG,5,1,1,ABC123,1,2024,1,1,,,2147483647.9";
        let msg = parse_message(line).unwrap();
        assert_eq!(msg.update.altitude, Some(i32::MAX));
    }

    #[test]
    fn test_short_type_is_still_accepted() {
        // Type 3 needs more than 15 fields; this has 12, so nothing is extracted
        let line = "MSG,3,1,1,ABC123,1,2024,1,1,,,5000";
        let msg = parse_message(line).unwrap();
        assert!(msg.update.is_empty());
    }

    #[test]
    fn test_other_types_touch_aircraft() {
        let line = "MSG,8,1,1,ABC123,1,2024,1,1,,,,,,,,,,,,,0";
        let msg = parse_message(line).unwrap();
        assert_eq!(msg.message_type, Some(MessageType::AllCallReply));
        assert!(msg.update.is_empty());
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse_message(""), Err(ParseError::NotMessage));
        assert_eq!(
            parse_message("STA,,5,179,400AE7,10103,2008/11/28"),
            Err(ParseError::NotMessage)
        );
        assert_eq!(
            parse_message("MSG,3,1,1,ABC123"),
            Err(ParseError::TooFewFields { found: 5 })
        );
        assert_eq!(
            parse_message("MSG,3,1,1,,1,2024,1,1,,,5000,,,40.1,-73.9,,,,,,0"),
            Err(ParseError::MissingAircraftId)
        );
    }

    #[test]
    fn test_looks_like_message() {
        assert!(looks_like_message(
            "MSG,3,1,1,ABC123,1,2024,1,1,,,5000,,,40.1,-73.9,,,,,,0"
        ));
        assert!(looks_like_message("  MSG,1,"));
        assert!(!looks_like_message("AIR,,333,1,4CA2D1"));
        assert!(!looks_like_message(""));
        assert!(!looks_like_message("MSG"));
    }

    proptest! {
        #[test]
        fn never_panics_on_arbitrary_input(line in ".*") {
            let _ = parse_message(&line);
        }

        #[test]
        fn never_panics_on_msg_prefixed_input(rest in "[0-9A-Za-z,. \\-]{0,120}") {
            let _ = parse_message(&format!("MSG,{}", rest));
        }

        #[test]
        fn decoding_is_deterministic(
            msg_type in 1u8..=6,
            icao in "[0-9a-fA-F]{6}",
            alt in -1000i32..60000,
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
        ) {
            let line = format!(
                "MSG,{},1,1,{},1,2024,1,1,,CS{},{},{},{},{},{},0,7000,0,0,0,0",
                msg_type, icao, alt, alt, alt, alt % 360, lat, lon
            );
            let first = parse_message(&line);
            let second = parse_message(&line);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.unwrap().icao, icao.to_ascii_uppercase());
        }

        #[test]
        fn position_round_trips(
            alt in -1000i32..60000,
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
        ) {
            let line = format!("MSG,3,1,1,ABC123,1,2024,1,1,,,{},,,{},{},,,,,,0", alt, lat, lon);
            let msg = parse_message(&line).unwrap();
            prop_assert_eq!(msg.update.altitude, Some(alt));
            prop_assert_eq!(msg.update.position, Some((lat, lon)));
        }
    }
}
