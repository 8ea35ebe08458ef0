//! Radio usage accounting
//!
//! Tracks how long the receiver was enabled, how often the radio was tuned,
//! stopped and used for transmission, and when it was powered down for good.

use crate::time::{Ticks, Timestamp};

/// Radio usage over a session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RadioUsage {
    /// Session start
    pub session_start: Timestamp,
    /// Accumulated receive time of closed listening periods
    pub listen_time: Ticks,
    /// Start of the listening period in progress
    pub listening_since: Option<Timestamp>,
    /// Frames handed to the radio
    pub transmissions: u32,
    /// Tune requests
    pub tunes: u32,
    /// Stop requests
    pub stops: u32,
    /// Instant the receiver was stopped with every channel resolved
    pub powered_down_at: Option<Timestamp>,
}

impl RadioUsage {
    /// Start accounting at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            session_start: now,
            ..Self::default()
        }
    }

    /// Receiver enabled
    pub fn rx_started(&mut self, now: Timestamp) {
        if self.listening_since.is_none() {
            self.listening_since = Some(now);
        }
    }

    /// Receiver disabled on request
    pub fn rx_stopped(&mut self, now: Timestamp) {
        self.rx_closed(now);
        self.stops += 1;
    }

    /// Reception window ran out
    pub fn rx_closed(&mut self, now: Timestamp) {
        if let Some(since) = self.listening_since.take() {
            self.listen_time += now - since;
        }
    }

    /// Radio tuned
    pub fn tuned(&mut self) {
        self.tunes += 1;
    }

    /// Frame transmitted
    pub fn transmitted(&mut self) {
        self.transmissions += 1;
    }

    /// Receiver stopped for the rest of the session
    pub fn powered_down(&mut self, now: Timestamp) {
        self.powered_down_at.get_or_insert(now);
    }

    /// Total receive time up to `now`
    pub fn listen_time(&self, now: Timestamp) -> Ticks {
        match self.listening_since {
            Some(since) => self.listen_time + (now - since),
            None => self.listen_time,
        }
    }

    /// Share of the session spent receiving, in percent
    pub fn duty_cycle(&self, now: Timestamp) -> f32 {
        let total = now - self.session_start;
        if total.is_zero() {
            return 0.0;
        }
        (self.listen_time(now).ticks() as f32 / total.ticks() as f32) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_time_accumulates() {
        let mut usage = RadioUsage::new(Timestamp::from_secs(0));
        usage.rx_started(Timestamp::from_secs(1));
        usage.rx_stopped(Timestamp::from_secs(3));
        usage.rx_started(Timestamp::from_secs(5));

        assert_eq!(usage.listen_time(Timestamp::from_secs(6)), Ticks::from_secs(3));
        assert_eq!(usage.stops, 1);
        assert!((usage.duty_cycle(Timestamp::from_secs(6)) - 50.0).abs() < 0.01);
    }

    #[test]
    fn test_power_down_is_recorded_once() {
        let mut usage = RadioUsage::new(Timestamp::ZERO);
        usage.powered_down(Timestamp::from_secs(4));
        usage.powered_down(Timestamp::from_secs(9));
        assert_eq!(usage.powered_down_at, Some(Timestamp::from_secs(4)));
        assert_eq!(usage.duty_cycle(Timestamp::ZERO), 0.0);
    }
}
