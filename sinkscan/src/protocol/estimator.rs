//! Cycle length and repeat count estimation
//!
//! A sink cycle is a sync phase of N beacons counting down from N to 1, one
//! every T, followed by a reception window of length T and a sleep of 10 T.
//! Three observations pin T down:
//!
//! - two beacons of the same sync phase: `T = Δt / Δvalue`
//! - a value-one beacon and the first beacon of the next cycle: `T = Δt / 12`
//! - once T is known, any beacon predicts the next window
//!
//! The first beacon heard after a long silence opens a cycle and so carries N.

use core::mem;

use log::{debug, trace};

use crate::config::{ProtocolConfig, ANCHOR_INTERVALS, LAST_BEACON_VALUE, REPEAT_COUNT_SENTINEL};
use crate::sink::{Observation, SinkChannel};
use crate::time::{Ticks, Timestamp};

/// Result of feeding one beacon to the estimator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Estimate {
    /// Channel already resolved
    Ignored,
    /// Both parameters are known
    Resolved {
        /// Cycle length (T)
        cycle_length: Ticks,
        /// Repeat count (N)
        repeat_count: u8,
    },
    /// T is known but N is not
    CycleLengthKnown {
        /// Cycle length (T)
        cycle_length: Ticks,
    },
    /// A value-one beacon was kept as an anchor
    AnchorRecorded,
    /// The beacon was kept for a later estimate
    Remembered,
}

/// Per-channel estimation state machine
#[derive(Debug, Clone, Copy)]
pub struct ParameterEstimator {
    idle_threshold: Ticks,
}

impl ParameterEstimator {
    /// Create an estimator
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            idle_threshold: config.idle_threshold,
        }
    }

    /// Feed a beacon with `value` heard at `at` after `idle_gap` of silence
    pub fn observe(
        &self,
        sink: &mut SinkChannel,
        at: Timestamp,
        value: u8,
        idle_gap: Ticks,
    ) -> Estimate {
        if sink.resolved {
            return Estimate::Ignored;
        }

        if value == REPEAT_COUNT_SENTINEL {
            sink.set_repeat_count(value);
        }

        let expected = mem::take(&mut sink.expect_cycle_start);
        let fresh = idle_gap > self.idle_threshold || expected;
        trace!(
            "channel {}: value {} after {} idle, fresh {}",
            sink.channel_id,
            value,
            idle_gap.ticks(),
            fresh
        );

        let observation = Observation { at, value };
        if fresh {
            self.observe_cycle_start(sink, observation)
        } else {
            self.observe_within_cycle(sink, observation)
        }
    }

    fn observe_cycle_start(&self, sink: &mut SinkChannel, observation: Observation) -> Estimate {
        // a sync phase counts down from N
        sink.set_repeat_count(observation.value);

        if sink.cycle_length().is_none() {
            let estimate = match sink.anchor_value_one_at.take() {
                Some(anchor) => Some((observation.at - anchor) / ANCHOR_INTERVALS),
                None => sink
                    .last_observed
                    .and_then(|previous| successive(previous, observation)),
            };
            if let Some(cycle_length) = estimate {
                if sink.set_cycle_length(cycle_length) {
                    debug!(
                        "channel {}: T = {} from cycle start",
                        sink.channel_id,
                        cycle_length.ticks()
                    );
                }
            }
        }

        if sink.cycle_length().is_some() {
            sink.forget_token();
            return known(sink);
        }
        remember(sink, observation)
    }

    fn observe_within_cycle(&self, sink: &mut SinkChannel, observation: Observation) -> Estimate {
        if sink.cycle_length().is_some() {
            return known(sink);
        }

        let estimate = sink
            .last_observed
            .and_then(|previous| successive(previous, observation));
        match estimate {
            Some(cycle_length) => {
                sink.set_cycle_length(cycle_length);
                debug!(
                    "channel {}: T = {} from successive beacons",
                    sink.channel_id,
                    cycle_length.ticks()
                );
                sink.forget_token();
                sink.anchor_value_one_at = None;
                known(sink)
            }
            None => remember(sink, observation),
        }
    }
}

/// Elapsed time over value delta, if the two beacons count down
fn successive(previous: Observation, current: Observation) -> Option<Ticks> {
    if previous.value <= current.value || current.at <= previous.at {
        return None;
    }
    let cycle_length = (current.at - previous.at) / u64::from(previous.value - current.value);
    (!cycle_length.is_zero()).then_some(cycle_length)
}

fn known(sink: &SinkChannel) -> Estimate {
    match (sink.cycle_length(), sink.repeat_count()) {
        (Some(cycle_length), Some(repeat_count)) => Estimate::Resolved {
            cycle_length,
            repeat_count,
        },
        (Some(cycle_length), None) => Estimate::CycleLengthKnown { cycle_length },
        _ => Estimate::Remembered,
    }
}

fn remember(sink: &mut SinkChannel, observation: Observation) -> Estimate {
    if observation.value == LAST_BEACON_VALUE && sink.last_observed.is_none() {
        sink.anchor_value_one_at = Some(observation.at);
        return Estimate::AnchorRecorded;
    }
    sink.last_observed = Some(observation);
    Estimate::Remembered
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUICK: Ticks = Ticks::from_ticks(1);

    fn estimator() -> ParameterEstimator {
        let mut config = ProtocolConfig::simulation();
        config.idle_threshold = Ticks::from_ticks(100);
        ParameterEstimator::new(&config)
    }

    fn ts(ticks: u64) -> Timestamp {
        Timestamp::from_ticks(ticks)
    }

    #[test]
    fn test_successive_tokens() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);

        assert_eq!(
            estimator.observe(&mut sink, ts(1_000), 7, QUICK),
            Estimate::Remembered
        );
        assert_eq!(
            estimator.observe(&mut sink, ts(1_030), 5, QUICK),
            Estimate::CycleLengthKnown {
                cycle_length: Ticks::from_ticks(15)
            }
        );
        assert_eq!(sink.last_observed, None);
    }

    #[test]
    fn test_anchor_divided_by_twelve() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);

        assert_eq!(
            estimator.observe(&mut sink, ts(500), 1, QUICK),
            Estimate::AnchorRecorded
        );
        assert_eq!(sink.anchor_value_one_at, Some(ts(500)));

        assert_eq!(
            estimator.observe(&mut sink, ts(620), 4, Ticks::from_ticks(120)),
            Estimate::Resolved {
                cycle_length: Ticks::from_ticks(10),
                repeat_count: 4
            }
        );
        assert_eq!(sink.anchor_value_one_at, None);
    }

    #[test]
    fn test_cycle_start_sets_repeat_count() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);

        assert_eq!(
            estimator.observe(&mut sink, ts(1_000), 6, Ticks::from_ticks(500)),
            Estimate::Remembered
        );
        assert_eq!(sink.repeat_count(), Some(6));
        assert_eq!(
            estimator.observe(&mut sink, ts(1_040), 5, QUICK),
            Estimate::Resolved {
                cycle_length: Ticks::from_ticks(40),
                repeat_count: 6
            }
        );
    }

    #[test]
    fn test_expected_cycle_start_is_consumed() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);
        sink.expect_cycle_start = true;

        estimator.observe(&mut sink, ts(10), 3, QUICK);
        assert_eq!(sink.repeat_count(), Some(3));
        assert!(!sink.expect_cycle_start);
    }

    #[test]
    fn test_sentinel_sets_repeat_count() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);

        estimator.observe(&mut sink, ts(10), 10, QUICK);
        assert_eq!(sink.repeat_count(), Some(10));
    }

    #[test]
    fn test_estimates_are_write_once() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);
        estimator.observe(&mut sink, ts(0), 9, QUICK);
        estimator.observe(&mut sink, ts(20), 8, QUICK);
        assert_eq!(sink.cycle_length(), Some(Ticks::from_ticks(20)));

        // a later, different pair does not overwrite T
        sink.last_observed = Some(Observation { at: ts(100), value: 7 });
        let estimate = estimator.observe(&mut sink, ts(150), 6, QUICK);
        assert_eq!(
            estimate,
            Estimate::CycleLengthKnown {
                cycle_length: Ticks::from_ticks(20)
            }
        );
        assert_eq!(sink.cycle_length(), Some(Ticks::from_ticks(20)));
    }

    #[test]
    fn test_rising_value_is_remembered() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);
        estimator.observe(&mut sink, ts(0), 3, QUICK);
        assert_eq!(
            estimator.observe(&mut sink, ts(50), 5, QUICK),
            Estimate::Remembered
        );
        assert_eq!(sink.cycle_length(), None);
        assert_eq!(sink.last_observed, Some(Observation { at: ts(50), value: 5 }));
    }

    #[test]
    fn test_resolved_channel_is_ignored() {
        let estimator = estimator();
        let mut sink = SinkChannel::new(11);
        sink.resolved = true;
        assert_eq!(
            estimator.observe(&mut sink, ts(0), 10, Ticks::from_ticks(500)),
            Estimate::Ignored
        );
        assert_eq!(sink.repeat_count(), None);
    }
}
