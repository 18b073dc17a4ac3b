//! ADS-B Feed - ingest an SBS (BaseStation, port 30003) feed and stream
//! coalesced aircraft snapshots to any number of subscribers.
//!
//! This crate provides:
//! - A tolerant decoder for SBS `MSG` lines
//! - A concurrent aircraft registry with merge-never-clear semantics
//! - A rate-limited batch publisher that coalesces changes per aircraft
//! - An async TCP feed client with reconnection
//! - An HTTP interface with session control and a Server-Sent Events stream
//!
//! # Example
//!
//! ```rust
//! use adsb_feed::{AircraftRegistry, parse_message};
//!
//! let line = "MSG,3,1,1,4CA2D6,1,2024/01/01,12:00:00.000,2024/01/01,12:00:00.000,,5000,,,40.1,-73.9,,,0,0,0,0";
//! let decoded = parse_message(line).expect("Failed to decode message");
//!
//! let registry = AircraftRegistry::new();
//! registry.apply_update(&decoded.icao, &decoded.update);
//!
//! let record = registry.snapshot("4CA2D6").unwrap();
//! assert_eq!(record.altitude, Some(5000));
//! assert!(record.has_position());
//! ```

pub mod aircraft;
pub mod client;
pub mod config;
pub mod metrics;
pub mod parser;
pub mod publisher;
pub mod registry;
pub mod session;
pub mod stats;
pub mod web;

pub use aircraft::{AircraftRecord, AircraftUpdate, OutboundEvent};
pub use client::{FeedClient, FeedConfig};
pub use config::Config;
pub use parser::{MessageType, ParseError, SbsUpdate, looks_like_message, parse_message};
pub use publisher::{BatchPublisher, ChangeSet};
pub use registry::AircraftRegistry;
pub use session::{FeedSession, FeedStatus, StartOutcome, StopOutcome};
pub use stats::{FeedStats, StatsSummary};
pub use web::AppState;
