//! Per-channel sink records

use heapless::Vec;

use crate::config::{ProtocolConfig, MAX_CHANNELS};
use crate::time::{Ticks, Timestamp};

/// A beacon as remembered by the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Observation {
    /// Arrival time
    pub at: Timestamp,
    /// Beacon value
    pub value: u8,
}

/// What is known about the sink on one channel
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SinkChannel {
    /// Radio channel identifier
    pub channel_id: u8,
    cycle_length: Option<Ticks>,
    repeat_count: Option<u8>,
    /// Most recent beacon kept for the successive-token rule
    pub last_observed: Option<Observation>,
    /// Arrival of the last value-one beacon kept for the anchor rule
    pub anchor_value_one_at: Option<Timestamp>,
    /// The next beacon is known to be the first of a cycle
    pub expect_cycle_start: bool,
    /// Both parameters are known and all sends are scheduled
    pub resolved: bool,
}

impl SinkChannel {
    /// Create an empty record
    pub const fn new(channel_id: u8) -> Self {
        Self {
            channel_id,
            cycle_length: None,
            repeat_count: None,
            last_observed: None,
            anchor_value_one_at: None,
            expect_cycle_start: false,
            resolved: false,
        }
    }

    /// Estimated cycle length (T)
    pub fn cycle_length(&self) -> Option<Ticks> {
        self.cycle_length
    }

    /// Known repeat count (N)
    pub fn repeat_count(&self) -> Option<u8> {
        self.repeat_count
    }

    /// Both parameters are known
    pub fn is_estimated(&self) -> bool {
        self.cycle_length.is_some() && self.repeat_count.is_some()
    }

    /// Record the cycle length unless one is already known
    ///
    /// Returns true if the value was stored.
    pub fn set_cycle_length(&mut self, cycle_length: Ticks) -> bool {
        if self.cycle_length.is_some() || cycle_length.is_zero() {
            return false;
        }
        self.cycle_length = Some(cycle_length);
        true
    }

    /// Record the repeat count unless one is already known
    ///
    /// Returns true if the value was stored.
    pub fn set_repeat_count(&mut self, repeat_count: u8) -> bool {
        if self.repeat_count.is_some() || repeat_count == 0 {
            return false;
        }
        self.repeat_count = Some(repeat_count);
        true
    }

    /// Drop the beacon memory
    pub fn forget_token(&mut self) {
        self.last_observed = None;
    }

    /// Drop every observation that only holds while the channel is watched
    pub fn forget_observations(&mut self) {
        self.last_observed = None;
        self.anchor_value_one_at = None;
        self.expect_cycle_start = false;
    }
}

/// Owned table of sink records, ascending by channel id
#[derive(Debug, Clone)]
pub struct ChannelTable {
    channels: Vec<SinkChannel, MAX_CHANNELS>,
}

impl ChannelTable {
    /// One empty record per configured channel
    pub fn new(config: &ProtocolConfig) -> Self {
        let mut channels = Vec::new();
        for spec in &config.channels {
            // both tables are bounded by MAX_CHANNELS
            let _ = channels.push(SinkChannel::new(spec.id));
        }
        Self { channels }
    }

    /// Record for a channel id
    pub fn get(&self, channel: u8) -> Option<&SinkChannel> {
        self.channels.iter().find(|sink| sink.channel_id == channel)
    }

    /// Mutable record for a channel id
    pub fn get_mut(&mut self, channel: u8) -> Option<&mut SinkChannel> {
        self.channels
            .iter_mut()
            .find(|sink| sink.channel_id == channel)
    }

    /// All records
    pub fn iter(&self) -> impl Iterator<Item = &SinkChannel> {
        self.channels.iter()
    }

    /// Number of tracked channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when no channel is tracked
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Every channel is resolved
    pub fn all_resolved(&self) -> bool {
        self.channels.iter().all(|sink| sink.resolved)
    }

    /// Forget everything learned in the session
    pub fn reset(&mut self) {
        for sink in self.channels.iter_mut() {
            *sink = SinkChannel::new(sink.channel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_are_write_once() {
        let mut sink = SinkChannel::new(11);
        assert!(sink.set_cycle_length(Ticks::from_ticks(15)));
        assert!(!sink.set_cycle_length(Ticks::from_ticks(20)));
        assert_eq!(sink.cycle_length(), Some(Ticks::from_ticks(15)));

        assert!(!sink.set_repeat_count(0));
        assert!(sink.set_repeat_count(4));
        assert!(!sink.set_repeat_count(10));
        assert_eq!(sink.repeat_count(), Some(4));
        assert!(sink.is_estimated());
    }

    #[test]
    fn test_table_lookup_and_reset() {
        let config = ProtocolConfig::simulation();
        let mut table = ChannelTable::new(&config);
        assert_eq!(table.len(), 5);
        assert!(table.get(10).is_none());

        let sink = table.get_mut(13).unwrap();
        sink.set_cycle_length(Ticks::from_ticks(7));
        sink.resolved = true;
        assert!(!table.all_resolved());

        table.reset();
        assert_eq!(table.get(13), Some(&SinkChannel::new(13)));
    }
}
