//! Timer collaborator interface
//!
//! Every future action of the protocol is a [`TimerEvent`] armed on a
//! [`Timer`]. When it fires, the host hands the event back to
//! [`SinkScanner::on_timer`](crate::scanner::SinkScanner::on_timer), which
//! dispatches on the [`Purpose`] tag.

pub mod hal;

pub use hal::{AlarmError, AlarmQueue};

use crate::time::Timestamp;

/// Why a timer was armed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Purpose {
    /// Switch to a channel to listen for its beacons
    Reception {
        /// The switch was placed just before a predicted cycle start
        expect_cycle_start: bool,
    },
    /// Switch to a channel and transmit into its reception window
    Send,
    /// Return to the previous channel after a send
    SwitchBack,
}

/// Payload carried by an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerEvent {
    /// Action to take
    pub purpose: Purpose,
    /// Channel the action applies to
    pub channel: u8,
    /// Instant the event was registered for
    pub at: Timestamp,
}

impl TimerEvent {
    /// Create a new timer event
    pub const fn new(purpose: Purpose, channel: u8, at: Timestamp) -> Self {
        Self {
            purpose,
            channel,
            at,
        }
    }
}

/// Alarm source able to hold several pending alarms
pub trait Timer {
    /// Identifies an armed alarm
    type Handle: Copy + PartialEq;

    /// Error type for timer operations
    type Error;

    /// Fire `event` at or after `at`
    fn arm(&mut self, at: Timestamp, event: TimerEvent) -> Result<Self::Handle, Self::Error>;

    /// Cancel an armed alarm; cancelling one that already fired is a no-op
    fn cancel(&mut self, handle: Self::Handle) -> Result<(), Self::Error>;
}
