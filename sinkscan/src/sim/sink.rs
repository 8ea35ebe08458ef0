//! Simulated sinks

use crate::config::SLEEP_INTERVALS;
use crate::radio::BeaconFrame;
use crate::time::{Ticks, Timestamp};

/// Broadcast PAN and address used by simulated beacons
pub const BROADCAST: u16 = 0xFFFF;

/// A sink with a fixed schedule
///
/// Each cycle starts with N beacons counting down from N to 1, one every T,
/// followed by a reception window of length T and a sleep of 10 T.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSink {
    /// Channel the sink beacons on
    pub channel: u8,
    /// Repeat unit (T)
    pub cycle_length: Ticks,
    /// Beacons per sync phase (N)
    pub repeat_count: u8,
    /// First beacon of the first cycle
    pub first_cycle_at: Timestamp,
}

impl SimSink {
    /// Create a sink
    pub const fn new(
        channel: u8,
        cycle_length: Ticks,
        repeat_count: u8,
        first_cycle_at: Timestamp,
    ) -> Self {
        Self {
            channel,
            cycle_length,
            repeat_count,
            first_cycle_at,
        }
    }

    /// Length of a full cycle
    pub fn period(&self) -> Ticks {
        self.cycle_length * (u64::from(self.repeat_count) + 1 + SLEEP_INTERVALS)
    }

    /// Every beacon `(time, value)` emitted in `[from, until]`
    pub fn beacons(&self, from: Timestamp, until: Timestamp) -> Vec<(Timestamp, u8)> {
        let mut beacons = Vec::new();
        let period = self.period();
        if period.is_zero() {
            return beacons;
        }

        let mut cycle_start = self.first_cycle_at;
        while cycle_start <= until {
            for index in 0..self.repeat_count {
                let at = cycle_start + self.cycle_length * u64::from(index);
                if at >= from && at <= until {
                    beacons.push((at, self.repeat_count - index));
                }
            }
            cycle_start += period;
        }
        beacons
    }

    /// True if `at` falls into one of the sink's reception windows
    pub fn is_receiving(&self, at: Timestamp) -> bool {
        if at < self.first_cycle_at || self.period().is_zero() {
            return false;
        }
        let offset = (at - self.first_cycle_at).ticks() % self.period().ticks();
        let opens = self.cycle_length.ticks() * u64::from(self.repeat_count);
        offset >= opens && offset < opens + self.cycle_length.ticks()
    }

    /// Encoded beacon frame
    pub fn frame(&self, seq: u8, value: u8) -> [u8; crate::radio::FRAME_LEN] {
        BeaconFrame {
            seq,
            dst_pan: BROADCAST,
            dst_addr: BROADCAST,
            src_pan: u16::from(self.channel),
            src_addr: u16::from(self.channel),
            value,
        }
        .to_bytes()
    }
}
