//! Discrete-event simulation host
//!
//! Runs a [`SinkScanner`](crate::scanner::SinkScanner) against sinks with
//! exact schedules. Beacons reach the scanner only while the simulated radio
//! is receiving on the sink's channel, and every transmission is checked
//! against the target sink's reception window.

pub mod event;
pub mod host;
pub mod medium;
pub mod sink;

pub use host::{ChannelEstimate, SimError, SimReport, Simulation};
pub use medium::{Medium, SimRadio, SimTimer, TransmissionRecord};
pub use sink::SimSink;
