//! Minimum separation between pending discovery switches
//!
//! At most one pending switch per channel is tracked. A new switch may only
//! be placed if it keeps `min_separation` from every other pending one; on a
//! conflict one retry is made past the conflicting entry, after which the
//! occurrence is skipped.

use heapless::Vec;
use log::debug;

use crate::config::{ProtocolConfig, MAX_CHANNELS};
use crate::time::{Ticks, Timestamp};

/// Where a requested switch ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Placement {
    /// Placed at the requested instant
    OnTime(Timestamp),
    /// Placed at the retry instant
    Shifted(Timestamp),
}

impl Placement {
    /// Registered instant
    pub fn at(&self) -> Timestamp {
        match *self {
            Placement::OnTime(at) | Placement::Shifted(at) => at,
        }
    }

    /// Placed at the requested instant
    pub fn is_on_time(&self) -> bool {
        matches!(self, Placement::OnTime(_))
    }
}

/// Pending switch table with separation checks
#[derive(Debug, Clone)]
pub struct CollisionScheduler {
    pending: Vec<(u8, Timestamp), MAX_CHANNELS>,
    min_separation: Ticks,
    retry_margin: Ticks,
}

impl CollisionScheduler {
    /// Create an empty table
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            pending: Vec::new(),
            min_separation: config.min_separation,
            retry_margin: config.retry_margin,
        }
    }

    /// Check `at` against every pending switch
    ///
    /// Returns the signed offset from `at` to the nearest entry closer than
    /// the minimum separation, positive when that entry lies later.
    pub fn can_schedule(&self, at: Timestamp) -> Option<i64> {
        self.conflict(at, None)
    }

    /// Record the pending switch of a channel, replacing any previous one
    pub fn register(&mut self, channel: u8, at: Timestamp) -> bool {
        if let Some(entry) = self.pending.iter_mut().find(|(ch, _)| *ch == channel) {
            entry.1 = at;
            return true;
        }
        self.pending.push((channel, at)).is_ok()
    }

    /// Remove the pending switch of a channel
    pub fn clear(&mut self, channel: u8) {
        if let Some(index) = self.pending.iter().position(|(ch, _)| *ch == channel) {
            self.pending.swap_remove(index);
        }
    }

    /// Pending switch of a channel
    pub fn pending(&self, channel: u8) -> Option<Timestamp> {
        self.pending
            .iter()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, at)| *at)
    }

    /// True if the channel has a pending switch
    pub fn is_pending(&self, channel: u8) -> bool {
        self.pending(channel).is_some()
    }

    /// Drop every pending switch
    pub fn clear_all(&mut self) {
        self.pending.clear();
    }

    /// Place a switch for `channel` at `at`, retrying once if `retry` is set
    ///
    /// The channel's own previous entry is replaced and so does not count as
    /// a conflict. Returns `None` if the occurrence has to be skipped.
    pub fn try_schedule(&mut self, channel: u8, at: Timestamp, retry: bool) -> Option<Placement> {
        let offset = match self.conflict(at, Some(channel)) {
            None => {
                return self
                    .register(channel, at)
                    .then_some(Placement::OnTime(at));
            }
            Some(offset) => offset,
        };

        if !retry {
            debug!(
                "switch to channel {} at {} conflicts by {}, skipped",
                channel,
                at.ticks(),
                offset
            );
            return None;
        }

        let shifted = at + Ticks::from_ticks(offset.unsigned_abs()) + self.retry_margin;
        if let Some(second) = self.conflict(shifted, Some(channel)) {
            debug!(
                "switch to channel {} at {} still conflicts by {}, skipped",
                channel,
                shifted.ticks(),
                second
            );
            return None;
        }

        self.register(channel, shifted)
            .then_some(Placement::Shifted(shifted))
    }

    fn conflict(&self, at: Timestamp, except: Option<u8>) -> Option<i64> {
        let limit = self.min_separation.ticks();
        self.pending
            .iter()
            .filter(|(ch, _)| Some(*ch) != except)
            .map(|(_, pending)| at.offset_to(*pending))
            .filter(|offset| offset.unsigned_abs() < limit)
            .min_by_key(|offset| offset.unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler(separation: u64, margin: u64) -> CollisionScheduler {
        let mut config = ProtocolConfig::simulation();
        config.min_separation = Ticks::from_ticks(separation);
        config.retry_margin = Ticks::from_ticks(margin);
        CollisionScheduler::new(&config)
    }

    fn ts(ticks: u64) -> Timestamp {
        Timestamp::from_ticks(ticks)
    }

    #[test]
    fn test_can_schedule_reports_signed_offset() {
        let mut collision = scheduler(100, 10);
        assert_eq!(collision.can_schedule(ts(1_000)), None);

        collision.register(11, ts(1_000));
        assert_eq!(collision.can_schedule(ts(950)), Some(50));
        assert_eq!(collision.can_schedule(ts(1_030)), Some(-30));
        assert_eq!(collision.can_schedule(ts(1_100)), None);
        assert_eq!(collision.can_schedule(ts(900)), None);
    }

    #[test]
    fn test_register_overwrites_per_channel() {
        let mut collision = scheduler(100, 10);
        collision.register(11, ts(1_000));
        collision.register(11, ts(5_000));
        assert_eq!(collision.pending(11), Some(ts(5_000)));
        assert_eq!(collision.can_schedule(ts(1_000)), None);

        collision.clear(11);
        assert!(!collision.is_pending(11));
    }

    #[test]
    fn test_retry_once_then_skip() {
        let mut collision = scheduler(100, 100);
        collision.register(11, ts(1_000));

        // 40 before the entry: retry at 960 + 40 + 100
        let placed = collision.try_schedule(12, ts(960), true).unwrap();
        assert_eq!(placed, Placement::Shifted(ts(1_100)));
        assert!(!placed.is_on_time());

        // retry at 1_110 is still within range of channel 12's switch
        assert_eq!(collision.try_schedule(13, ts(1_005), true), None);
        assert!(!collision.is_pending(13));

        assert_eq!(collision.try_schedule(13, ts(990), false), None);
    }

    #[test]
    fn test_separation_holds_after_registration() {
        let mut collision = scheduler(100, 100);
        let requests = [500u64, 520, 610, 700, 1_000, 1_050];
        for (i, at) in requests.iter().enumerate() {
            collision.try_schedule(i as u8, ts(*at), true);
        }

        let placed: Vec<u64, 8> = (0..requests.len() as u8)
            .filter_map(|ch| collision.pending(ch))
            .map(|at| at.ticks())
            .collect();
        for (i, a) in placed.iter().enumerate() {
            for b in placed.iter().skip(i + 1) {
                assert!(a.abs_diff(*b) >= 100, "{} and {} too close", a, b);
            }
        }
    }

    #[test]
    fn test_own_entry_is_not_a_conflict() {
        let mut collision = scheduler(100, 10);
        collision.register(11, ts(1_000));
        assert_eq!(
            collision.try_schedule(11, ts(1_020), false),
            Some(Placement::OnTime(ts(1_020)))
        );
    }
}
