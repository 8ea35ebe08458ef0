//! Passive discovery of periodic sink schedules on a single radio
//!
//! A set of sinks, one per radio channel, wake up periodically and announce
//! themselves with a countdown of beacons before a short reception window.
//! This crate listens to one channel at a time, estimates each sink's cycle
//! length (T) and repeat count (N) from the beacons it overhears, and places
//! transmissions into the predicted reception windows without letting the
//! channel switches it needs collide.
//!
//! # Features
//! - `no_std` protocol core with fixed-capacity tables
//! - Radio and timer collaborators behind traits
//! - Alarm multiplexing on an `embedded-hal` countdown
//! - Deterministic discrete-event simulation host (`std` feature)
//! - Optional `defmt` formatting
//!
//! # Example
//! ```no_run
//! use sinkscan::{
//!     config::ProtocolConfig,
//!     sim::{SimSink, Simulation},
//!     time::{Ticks, Timestamp},
//! };
//!
//! let config = ProtocolConfig::simulation();
//! let sinks = [
//!     SimSink::new(11, Ticks::from_micros(713_417), 4, Timestamp::from_millis(250)),
//!     SimSink::new(12, Ticks::from_micros(901_223), 7, Timestamp::from_millis(1_900)),
//! ];
//!
//! let mut simulation = Simulation::new(config, &sinks).unwrap();
//! let report = simulation.run_until(Timestamp::from_secs(60)).unwrap();
//! println!("{} hits", report.hits());
//! ```

#![warn(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

/// Protocol configuration and presets
pub mod config;

/// Error types
pub mod error;

/// Radio usage accounting
pub mod power;

/// Discovery and send scheduling components
pub mod protocol;

/// Radio collaborator and frame layout
pub mod radio;

/// Event-driven scanner
pub mod scanner;

/// Per-channel sink records
pub mod sink;

/// Protocol time
pub mod time;

/// Timer collaborator and alarm multiplexing
pub mod timer;

/// Discrete-event simulation host
#[cfg(feature = "std")]
pub mod sim;

pub use config::ProtocolConfig;
pub use error::ScanError;
pub use scanner::SinkScanner;
