//! Simulation driver

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use log::{debug, info};

use super::event::SimEvent;
use super::medium::{Medium, SimRadio, SimTimer, TransmissionRecord};
use super::sink::SimSink;
use crate::config::ProtocolConfig;
use crate::error::ScanError;
use crate::power::RadioUsage;
use crate::scanner::SinkScanner;
use crate::time::{Ticks, Timestamp};

/// Error type of a simulated session
pub type SimError = ScanError<Infallible, Infallible>;

/// What the scanner learned about one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelEstimate {
    /// Channel id
    pub channel: u8,
    /// Estimated cycle length
    pub cycle_length: Option<Ticks>,
    /// Estimated repeat count
    pub repeat_count: Option<u8>,
    /// All sends of the channel are scheduled
    pub resolved: bool,
}

/// Outcome of a simulation run
#[derive(Debug, Clone)]
pub struct SimReport {
    /// Instant the run stopped
    pub end: Timestamp,
    /// Every transmission, with hit or miss against the target sink
    pub transmissions: Vec<TransmissionRecord>,
    /// Per-channel estimates
    pub estimates: Vec<ChannelEstimate>,
    /// Radio usage of the scanner
    pub usage: RadioUsage,
    /// Sends still pending at the end
    pub pending_sends: usize,
}

impl SimReport {
    /// Transmissions that landed in a reception window
    pub fn hits(&self) -> usize {
        self.transmissions.iter().filter(|tx| tx.hit).count()
    }

    /// Transmissions that missed
    pub fn misses(&self) -> usize {
        self.transmissions.len() - self.hits()
    }

    /// Hits on one channel
    pub fn hits_for(&self, channel: u8) -> usize {
        self.transmissions
            .iter()
            .filter(|tx| tx.hit && tx.channel == channel)
            .count()
    }

    /// Estimate for one channel
    pub fn estimate(&self, channel: u8) -> Option<&ChannelEstimate> {
        self.estimates.iter().find(|est| est.channel == channel)
    }

    /// Every channel was resolved
    pub fn all_resolved(&self) -> bool {
        self.estimates.iter().all(|est| est.resolved)
    }
}

/// A scanner session against simulated sinks
pub struct Simulation {
    medium: Rc<RefCell<Medium>>,
    scanner: SinkScanner<SimRadio, SimTimer>,
    sinks: Vec<SimSink>,
    started: bool,
    beacons_until: Option<Timestamp>,
    seq: u8,
}

impl Simulation {
    /// Create a session over `sinks`, starting at time zero
    pub fn new(config: ProtocolConfig, sinks: &[SimSink]) -> Result<Self, SimError> {
        let medium = Rc::new(RefCell::new(Medium::default()));
        let scanner = SinkScanner::new(
            config,
            SimRadio::new(Rc::clone(&medium)),
            SimTimer::new(Rc::clone(&medium)),
        )?;

        Ok(Self {
            medium,
            scanner,
            sinks: sinks.to_vec(),
            started: false,
            beacons_until: None,
            seq: 0,
        })
    }

    /// The scanner under test
    pub fn scanner(&self) -> &SinkScanner<SimRadio, SimTimer> {
        &self.scanner
    }

    /// Current simulated time
    pub fn now(&self) -> Timestamp {
        self.medium.borrow().now
    }

    /// Run every event up to and including `end`
    pub fn run_until(&mut self, end: Timestamp) -> Result<SimReport, SimError> {
        if !self.started {
            self.started = true;
            let now = self.now();
            self.scanner.start(now)?;
        }
        self.emit_beacons(end);

        loop {
            // the borrow must end before the scanner touches the medium
            let next = self.medium.borrow_mut().pop_until(end);
            let Some(next) = next else { break };

            match next.event {
                SimEvent::Beacon {
                    channel,
                    value,
                    seq,
                } => {
                    if !self.can_hear(channel, next.time) {
                        continue;
                    }
                    let frame = self
                        .sinks
                        .iter()
                        .find(|sink| sink.channel == channel)
                        .map(|sink| sink.frame(seq, value));
                    if let Some(frame) = frame {
                        self.scanner.on_receive(Some(&frame), next.time)?;
                    }
                }
                SimEvent::Alarm { handle, event } => {
                    if self.medium.borrow_mut().take_cancelled(handle) {
                        continue;
                    }
                    self.scanner.on_timer(event, next.time)?;
                }
                SimEvent::RxClosed => {
                    let closed = {
                        let mut medium = self.medium.borrow_mut();
                        let closed = medium.receiving && medium.rx_deadline == Some(next.time);
                        if closed {
                            medium.receiving = false;
                            medium.rx_deadline = None;
                        }
                        closed
                    };
                    if closed {
                        self.scanner.on_receive(None, next.time)?;
                    }
                }
            }
        }

        self.medium.borrow_mut().now = end;
        let report = self.report(end);
        info!(
            "simulation to {}: {} sends, {} hits, {} misses",
            end.ticks(),
            report.transmissions.len(),
            report.hits(),
            report.misses()
        );
        Ok(report)
    }

    fn can_hear(&self, channel: u8, at: Timestamp) -> bool {
        let medium = self.medium.borrow();
        medium.receiving
            && medium.tuned == Some(channel)
            && medium.rx_deadline.map_or(true, |deadline| at <= deadline)
    }

    fn emit_beacons(&mut self, end: Timestamp) {
        let from = match self.beacons_until {
            Some(until) => until + Ticks::from_ticks(1),
            None => Timestamp::ZERO,
        };
        if from > end {
            return;
        }

        let mut beacons: Vec<(Timestamp, u8, u8)> = self
            .sinks
            .iter()
            .flat_map(|sink| {
                sink.beacons(from, end)
                    .into_iter()
                    .map(move |(at, value)| (at, sink.channel, value))
            })
            .collect();
        beacons.sort();

        let mut medium = self.medium.borrow_mut();
        for (at, channel, value) in beacons {
            medium.schedule(
                at,
                SimEvent::Beacon {
                    channel,
                    value,
                    seq: self.seq,
                },
            );
            self.seq = self.seq.wrapping_add(1);
        }
        debug!("{} events queued up to {}", medium.queued(), end.ticks());
        self.beacons_until = Some(end);
    }

    fn report(&self, end: Timestamp) -> SimReport {
        let transmissions = self
            .medium
            .borrow()
            .transmissions
            .iter()
            .map(|tx| TransmissionRecord {
                hit: self
                    .sinks
                    .iter()
                    .any(|sink| sink.channel == tx.channel && sink.is_receiving(tx.at)),
                ..*tx
            })
            .collect();

        let estimates = self
            .scanner
            .channels()
            .map(|sink| ChannelEstimate {
                channel: sink.channel_id,
                cycle_length: sink.cycle_length(),
                repeat_count: sink.repeat_count(),
                resolved: sink.resolved,
            })
            .collect();

        SimReport {
            end,
            transmissions,
            estimates,
            usage: self.scanner.usage().clone(),
            pending_sends: self.scanner.pending_sends(),
        }
    }
}
