//! Event-driven scanner
//!
//! [`SinkScanner`] owns every table of the protocol and the two collaborators.
//! The host calls [`start`](SinkScanner::start) once, then feeds it received
//! frames through [`on_receive`](SinkScanner::on_receive) and fired alarms
//! through [`on_timer`](SinkScanner::on_timer). Each call completes
//! synchronously; future work is left as armed alarms.

use heapless::Vec;
use log::{debug, info, trace, warn};

use crate::config::{ProtocolConfig, MAX_CHANNELS, SLEEP_INTERVALS};
use crate::error::{ScanError, SendError};
use crate::power::RadioUsage;
use crate::protocol::{
    CollisionScheduler, Estimate, ParameterEstimator, Placement, RotationController,
    RotationState, TransmissionScheduler,
};
use crate::radio::{BeaconFrame, Radio, SendFrames};
use crate::sink::{ChannelTable, SinkChannel};
use crate::time::{Ticks, Timestamp};
use crate::timer::{Purpose, Timer, TimerEvent};

/// Passive sink discovery and send scheduling on one radio
pub struct SinkScanner<R: Radio, T: Timer> {
    config: ProtocolConfig,
    table: ChannelTable,
    collision: CollisionScheduler,
    estimator: ParameterEstimator,
    rotation: RotationController<R>,
    sends: TransmissionScheduler<T::Handle>,
    timer: T,
    frames: SendFrames,
    /// Alarm handles of pending discovery switches
    switches: Vec<(u8, T::Handle), MAX_CHANNELS>,
    /// Last frame received per channel since the last reception switch
    last_frames: Vec<(u8, BeaconFrame), MAX_CHANNELS>,
    session_start: Timestamp,
}

impl<R: Radio, T: Timer> SinkScanner<R, T> {
    /// Create a scanner; the radio is untouched until [`start`](Self::start)
    pub fn new(
        config: ProtocolConfig,
        radio: R,
        timer: T,
    ) -> Result<Self, ScanError<R::Error, T::Error>> {
        config.validate()?;

        Ok(Self {
            table: ChannelTable::new(&config),
            collision: CollisionScheduler::new(&config),
            estimator: ParameterEstimator::new(&config),
            rotation: RotationController::new(radio, &config),
            sends: TransmissionScheduler::new(&config),
            frames: SendFrames::new(&config),
            timer,
            switches: Vec::new(),
            last_frames: Vec::new(),
            session_start: Timestamp::ZERO,
            config,
        })
    }

    /// Start the session at `now`, listening on the lowest channel
    pub fn start(&mut self, now: Timestamp) -> Result<(), ScanError<R::Error, T::Error>> {
        self.session_start = now;
        self.rotation.start(now).map_err(ScanError::Radio)?;
        self.forget_frame(self.rotation.active());
        info!(
            "scanning {} channels from {}",
            self.table.len(),
            now.ticks()
        );
        Ok(())
    }

    /// Cancel everything and start a new session at `now`
    pub fn reset(&mut self, now: Timestamp) -> Result<(), ScanError<R::Error, T::Error>> {
        self.sends
            .cancel_all(&mut self.timer)
            .map_err(ScanError::Timer)?;
        for (_, handle) in self.switches.iter() {
            self.timer.cancel(*handle).map_err(ScanError::Timer)?;
        }
        self.switches.clear();
        self.collision.clear_all();
        self.table.reset();
        self.last_frames.clear();
        self.start(now)
    }

    /// Handle a frame received on the active channel
    ///
    /// `None` means the reception window closed; listening resumes on the
    /// active channel.
    pub fn on_receive(
        &mut self,
        data: Option<&[u8]>,
        now: Timestamp,
    ) -> Result<(), ScanError<R::Error, T::Error>> {
        let data = match data {
            Some(data) => data,
            None => {
                if self
                    .rotation
                    .reception_closed(now)
                    .map_err(ScanError::Radio)?
                {
                    trace!("reception window closed, listening again");
                }
                return Ok(());
            }
        };
        let frame = match BeaconFrame::parse(data) {
            Ok(frame) => frame,
            Err(error) => {
                warn!("dropping frame: {:?}", error);
                return Ok(());
            }
        };

        let channel = self.rotation.active();
        if !self.remember_frame(channel, frame) {
            trace!("duplicate beacon on channel {}", channel);
            return Ok(());
        }

        let idle_gap = self.rotation.idle_gap(now);
        self.rotation.mark_heard(now);

        let sink = self
            .table
            .get_mut(channel)
            .ok_or(ScanError::UnknownChannel(channel))?;
        let estimate = self.estimator.observe(sink, now, frame.value, idle_gap);

        match estimate {
            Estimate::Remembered => Ok(()),
            Estimate::Ignored => self.advance(now),
            Estimate::Resolved {
                cycle_length,
                repeat_count,
            } => {
                self.clear_switch(channel)?;
                if let Some(sink) = self.table.get_mut(channel) {
                    sink.resolved = true;
                }
                let registered = self
                    .sends
                    .schedule_completely(
                        now,
                        frame.value,
                        cycle_length,
                        repeat_count,
                        channel,
                        self.session_start,
                        &self.collision,
                        &mut self.timer,
                    )
                    .map_err(ScanError::Timer)?;
                info!(
                    "channel {} resolved: T = {}, N = {}, {} sends scheduled",
                    channel,
                    cycle_length.ticks(),
                    repeat_count,
                    registered
                );
                self.advance(now)
            }
            Estimate::CycleLengthKnown { cycle_length } => {
                let target = self.sends.window_target(now, frame.value, cycle_length);
                match self
                    .sends
                    .schedule(target, channel, &self.collision, &mut self.timer)
                {
                    Ok(_) | Err(SendError::TableFull) => {}
                    Err(SendError::Timer(error)) => return Err(ScanError::Timer(error)),
                }

                // just before the first beacon of the next cycle
                let wake = now + next_cycle_in(frame.value, cycle_length) - self.config.wake_lead;
                if self.place_switch(channel, wake, true, true)?.is_none() {
                    debug!("no wake switch for channel {}", channel);
                }
                self.advance(now)
            }
            Estimate::AnchorRecorded => {
                let revisit = now + self.config.min_cycle_gap - self.config.anchor_lead;
                if self.place_switch(channel, revisit, false, true)?.is_none() {
                    // a later revisit could not tell which cycle it sees
                    if let Some(sink) = self.table.get_mut(channel) {
                        sink.anchor_value_one_at = None;
                    }
                }
                self.advance(now)
            }
        }
    }

    /// Handle a fired alarm
    pub fn on_timer(
        &mut self,
        event: TimerEvent,
        now: Timestamp,
    ) -> Result<(), ScanError<R::Error, T::Error>> {
        let channel = event.channel;
        match event.purpose {
            Purpose::Reception { expect_cycle_start } => {
                if self.collision.pending(channel) != Some(event.at) {
                    trace!("stale switch to channel {} ignored", channel);
                    return Ok(());
                }
                self.collision.clear(channel);
                self.forget_switch_handle(channel);

                let sink = self
                    .table
                    .get(channel)
                    .ok_or(ScanError::UnknownChannel(channel))?;
                if sink.resolved {
                    return Ok(());
                }

                let previous = self.rotation.active();
                if previous != channel {
                    if let RotationState::Listening(_) = self.rotation.state() {
                        if let Some(left) = self.table.get_mut(previous) {
                            left.forget_observations();
                        }
                    }
                }
                if let Some(sink) = self.table.get_mut(channel) {
                    sink.expect_cycle_start |= expect_cycle_start;
                }

                debug!("scheduled switch to channel {}", channel);
                self.rotation
                    .switch_for_reception(channel, now)
                    .map_err(ScanError::Radio)?;
                self.forget_frame(channel);
                Ok(())
            }
            Purpose::Send => {
                if !self.sends.take_due(channel, event.at) {
                    trace!("cancelled send to channel {} ignored", channel);
                    return Ok(());
                }
                let slot = self
                    .config
                    .index_of(channel)
                    .and_then(|index| self.frames.slot(index))
                    .ok_or(ScanError::UnknownChannel(channel))?;
                self.rotation.switch_for_send(
                    channel,
                    self.frames.buffer(),
                    slot,
                    now,
                    &mut self.timer,
                )?;
                Ok(())
            }
            Purpose::SwitchBack => {
                self.rotation.switch_back(now).map_err(ScanError::Radio)?;
                Ok(())
            }
        }
    }

    /// Channel the radio is tuned to
    pub fn active_channel(&self) -> u8 {
        self.rotation.active()
    }

    /// Rotation state
    pub fn state(&self) -> RotationState {
        self.rotation.state()
    }

    /// Record for a channel
    pub fn channel(&self, channel: u8) -> Option<&SinkChannel> {
        self.table.get(channel)
    }

    /// All channel records
    pub fn channels(&self) -> impl Iterator<Item = &SinkChannel> {
        self.table.iter()
    }

    /// Every channel is resolved
    pub fn is_finished(&self) -> bool {
        self.table.all_resolved()
    }

    /// Number of sends still pending
    pub fn pending_sends(&self) -> usize {
        self.sends.len()
    }

    /// Pending discovery switch of a channel
    pub fn pending_switch(&self, channel: u8) -> Option<Timestamp> {
        self.collision.pending(channel)
    }

    /// Radio usage so far
    pub fn usage(&self) -> &RadioUsage {
        self.rotation.usage()
    }

    /// Session configuration
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// The radio collaborator
    pub fn radio(&self) -> &R {
        self.rotation.radio()
    }

    /// The radio collaborator, mutably
    pub fn radio_mut(&mut self) -> &mut R {
        self.rotation.radio_mut()
    }

    /// The timer collaborator
    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// The timer collaborator, mutably
    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Leave the active channel for the next one that still needs listening
    fn advance(&mut self, now: Timestamp) -> Result<(), ScanError<R::Error, T::Error>> {
        let leaving = self.rotation.active();
        if let Some(sink) = self.table.get_mut(leaving) {
            sink.forget_token();
        }
        self.rotation
            .advance(now, &self.table, &self.collision)
            .map_err(ScanError::Radio)?;
        if let RotationState::Listening(channel) = self.rotation.state() {
            self.forget_frame(channel);
        }
        Ok(())
    }

    /// Place a discovery switch to `channel` at `at`
    ///
    /// The switch marks an expected cycle start only if `expect_cycle_start`
    /// is set and it was placed at the requested instant.
    fn place_switch(
        &mut self,
        channel: u8,
        at: Timestamp,
        retry: bool,
        expect_cycle_start: bool,
    ) -> Result<Option<Placement>, ScanError<R::Error, T::Error>> {
        self.clear_switch(channel)?;

        let placement = match self.collision.try_schedule(channel, at, retry) {
            Some(placement) => placement,
            None => return Ok(None),
        };
        let at = placement.at();
        let purpose = Purpose::Reception {
            expect_cycle_start: expect_cycle_start && placement.is_on_time(),
        };

        let handle = match self.timer.arm(at, TimerEvent::new(purpose, channel, at)) {
            Ok(handle) => handle,
            Err(error) => {
                self.collision.clear(channel);
                return Err(ScanError::Timer(error));
            }
        };
        // one entry per channel, cleared above
        let _ = self.switches.push((channel, handle));
        debug!(
            "switch to channel {} at {} ({})",
            channel,
            at.ticks(),
            if placement.is_on_time() { "on time" } else { "shifted" }
        );
        Ok(Some(placement))
    }

    /// Cancel the pending discovery switch of a channel
    fn clear_switch(&mut self, channel: u8) -> Result<(), ScanError<R::Error, T::Error>> {
        self.collision.clear(channel);
        if let Some(handle) = self.forget_switch_handle(channel) {
            self.timer.cancel(handle).map_err(ScanError::Timer)?;
        }
        Ok(())
    }

    fn forget_switch_handle(&mut self, channel: u8) -> Option<T::Handle> {
        let index = self.switches.iter().position(|(ch, _)| *ch == channel)?;
        Some(self.switches.swap_remove(index).1)
    }

    /// Store `frame` as the last one on `channel`; false if it repeats it
    fn remember_frame(&mut self, channel: u8, frame: BeaconFrame) -> bool {
        if let Some(entry) = self.last_frames.iter_mut().find(|(ch, _)| *ch == channel) {
            if entry.1 == frame {
                return false;
            }
            entry.1 = frame;
            return true;
        }
        let _ = self.last_frames.push((channel, frame));
        true
    }

    fn forget_frame(&mut self, channel: u8) {
        if let Some(index) = self.last_frames.iter().position(|(ch, _)| *ch == channel) {
            self.last_frames.swap_remove(index);
        }
    }
}

/// Time until the next cycle of a sink, seen from a beacon with `value`
pub fn next_cycle_in(value: u8, cycle_length: Ticks) -> Ticks {
    cycle_length * (u64::from(value) + 1 + SLEEP_INTERVALS)
}
