//! Protocol configuration
//!
//! This module contains the tunable parameters of the discovery protocol:
//! - The fixed channel set and the sink addressing on each channel
//! - Idle, separation and guard margins
//! - Send horizon and targeting policy
//! - Presets matching the simulated and the embedded deployments

/// Protocol parameters and presets
pub mod protocol;

pub use protocol::{ChannelSpec, ProtocolConfig, SendTarget, MAX_CHANNELS};

/// Beacon value announcing the repeat count
pub const REPEAT_COUNT_SENTINEL: u8 = 10;

/// Beacon value carried by the last beacon of a sync phase
pub const LAST_BEACON_VALUE: u8 = 1;

/// Repeat units between a value-one beacon and the first beacon of the next cycle
pub const ANCHOR_INTERVALS: u64 = 12;

/// Repeat units a sink sleeps after its reception window
pub const SLEEP_INTERVALS: u64 = 10;
