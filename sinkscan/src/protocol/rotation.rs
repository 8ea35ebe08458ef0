//! Channel rotation
//!
//! The rotation controller is the only code that touches the radio. It keeps
//! the single active channel, moves between undiscovered channels, performs
//! the switches for sends and the chained switch back, and powers the
//! receiver down once every channel is resolved.

use heapless::Vec;
use log::{debug, info, trace};

use super::collision::CollisionScheduler;
use crate::config::{ProtocolConfig, MAX_CHANNELS};
use crate::error::ScanError;
use crate::power::RadioUsage;
use crate::radio::Radio;
use crate::sink::ChannelTable;
use crate::time::{Ticks, Timestamp};
use crate::timer::{Purpose, Timer, TimerEvent};

/// Where a send returns to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Resume {
    /// Listen on a channel again
    Listen(u8),
    /// Stay parked
    Parked,
    /// Stay powered down
    Stopped,
}

/// Rotation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RotationState {
    /// Receiving on a channel
    Listening(u8),
    /// Tuning to a channel to transmit
    SwitchingForSend {
        /// Send target
        channel: u8,
        /// State to restore afterwards
        return_to: Resume,
    },
    /// Transmitted, waiting for the chained switch back
    SwitchingBack {
        /// Channel that was sent to
        channel: u8,
        /// State to restore
        return_to: Resume,
    },
    /// Receiver off until a pending switch fires
    Parked,
    /// Receiver off for the rest of the session
    RadioStopped,
}

/// Owner of the radio and of the active channel
pub struct RotationController<R: Radio> {
    radio: R,
    channels: Vec<u8, MAX_CHANNELS>,
    state: RotationState,
    tuned: u8,
    receiving: bool,
    listen_since: Timestamp,
    last_heard: Option<Timestamp>,
    listen_window: Option<Ticks>,
    send_guard: Ticks,
    usage: RadioUsage,
}

impl<R: Radio> RotationController<R> {
    /// Create a controller; nothing touches the radio before [`start`](Self::start)
    pub fn new(radio: R, config: &ProtocolConfig) -> Self {
        let channels: Vec<u8, MAX_CHANNELS> = config.channels.iter().map(|spec| spec.id).collect();
        let first = channels.first().copied().unwrap_or_default();
        Self {
            radio,
            channels,
            state: RotationState::Listening(first),
            tuned: first,
            receiving: false,
            listen_since: Timestamp::ZERO,
            last_heard: None,
            listen_window: config.listen_window,
            send_guard: config.send_guard,
            usage: RadioUsage::new(Timestamp::ZERO),
        }
    }

    /// Start listening on the lowest channel
    pub fn start(&mut self, now: Timestamp) -> Result<(), R::Error> {
        self.usage = RadioUsage::new(now);
        let first = self.channels.first().copied().unwrap_or(self.tuned);
        self.switch_for_reception(first, now)
    }

    /// Channel the radio is tuned to
    pub fn active(&self) -> u8 {
        self.tuned
    }

    /// Current state
    pub fn state(&self) -> RotationState {
        self.state
    }

    /// Receiver is enabled
    pub fn is_receiving(&self) -> bool {
        self.receiving
    }

    /// Radio usage so far
    pub fn usage(&self) -> &RadioUsage {
        &self.usage
    }

    /// The radio collaborator
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The radio collaborator, mutably
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Silence on the active channel: time since the later of the last
    /// reception switch and the last beacon heard
    pub fn idle_gap(&self, now: Timestamp) -> Ticks {
        let reference = match self.last_heard {
            Some(heard) if heard > self.listen_since => heard,
            _ => self.listen_since,
        };
        now - reference
    }

    /// A beacon was heard on the active channel
    pub fn mark_heard(&mut self, now: Timestamp) {
        self.last_heard = Some(now);
    }

    /// Tune to `channel` and listen
    pub fn switch_for_reception(&mut self, channel: u8, now: Timestamp) -> Result<(), R::Error> {
        self.listen(channel, now)?;
        self.listen_since = now;
        self.last_heard = None;
        trace!("listening on channel {} at {}", channel, now.ticks());
        Ok(())
    }

    /// Tune to `channel`, transmit the frame at `slot` of `frames` and arm
    /// the chained switch back
    pub fn switch_for_send<T: Timer>(
        &mut self,
        channel: u8,
        frames: &[u8],
        slot: (usize, usize),
        now: Timestamp,
        timer: &mut T,
    ) -> Result<T::Handle, ScanError<R::Error, T::Error>> {
        let return_to = match self.state {
            RotationState::Listening(ch) => Resume::Listen(ch),
            RotationState::SwitchingForSend { return_to, .. }
            | RotationState::SwitchingBack { return_to, .. } => return_to,
            RotationState::Parked => Resume::Parked,
            RotationState::RadioStopped => Resume::Stopped,
        };
        self.state = RotationState::SwitchingForSend { channel, return_to };

        if self.tuned != channel {
            self.tune(channel, now).map_err(ScanError::Radio)?;
        }
        self.radio
            .transmit(frames, slot.0, slot.1)
            .map_err(ScanError::Radio)?;
        self.usage.transmitted();
        debug!("sent to channel {} at {}", channel, now.ticks());

        self.state = RotationState::SwitchingBack { channel, return_to };
        let at = now + self.send_guard;
        timer
            .arm(at, TimerEvent::new(Purpose::SwitchBack, channel, at))
            .map_err(ScanError::Timer)
    }

    /// Restore the state from before the last send
    ///
    /// Does nothing if another switch took over in the meantime. Returns
    /// true if the controller switched back.
    pub fn switch_back(&mut self, now: Timestamp) -> Result<bool, R::Error> {
        let return_to = match self.state {
            RotationState::SwitchingForSend { return_to, .. }
            | RotationState::SwitchingBack { return_to, .. } => return_to,
            _ => return Ok(false),
        };

        match return_to {
            // the idle reference survives a send
            Resume::Listen(channel) => self.listen(channel, now)?,
            Resume::Parked => self.state = RotationState::Parked,
            Resume::Stopped => self.state = RotationState::RadioStopped,
        }
        Ok(true)
    }

    /// Move to the next channel that is neither resolved nor waiting for a
    /// pending switch, in ascending id order with wraparound
    ///
    /// Powers the receiver down if every channel is resolved, parks it if
    /// no channel is eligible.
    pub fn advance(
        &mut self,
        now: Timestamp,
        table: &ChannelTable,
        collision: &CollisionScheduler,
    ) -> Result<(), R::Error> {
        if table.all_resolved() {
            return self.power_down(now);
        }

        let len = self.channels.len();
        let current = self
            .channels
            .iter()
            .position(|&ch| ch == self.tuned)
            .unwrap_or(len.saturating_sub(1));

        for step in 1..=len {
            let candidate = self.channels[(current + step) % len];
            let eligible = table.get(candidate).map_or(false, |sink| !sink.resolved)
                && !collision.is_pending(candidate);
            if eligible {
                debug!("rotating to channel {}", candidate);
                return self.switch_for_reception(candidate, now);
            }
        }

        debug!("every open channel has a pending switch, parking");
        self.stop_receiver(now)?;
        self.state = RotationState::Parked;
        Ok(())
    }

    /// Stop the receiver for the rest of the session
    pub fn power_down(&mut self, now: Timestamp) -> Result<(), R::Error> {
        if self.state == RotationState::RadioStopped {
            return Ok(());
        }
        self.stop_receiver(now)?;
        self.state = RotationState::RadioStopped;
        self.usage.powered_down(now);
        info!("all channels resolved, radio powered down at {}", now.ticks());
        Ok(())
    }

    /// The radio closed the reception window on its own
    ///
    /// Listening resumes on the active channel with a fresh deadline and the
    /// idle reference kept. Returns true if reception was restarted.
    pub fn reception_closed(&mut self, now: Timestamp) -> Result<bool, R::Error> {
        if !self.receiving {
            return Ok(false);
        }
        self.receiving = false;
        self.usage.rx_closed(now);

        match self.state {
            RotationState::Listening(channel) if channel == self.tuned => {
                self.start_receiver(now)?;
                Ok(true)
            }
            // a pending switch back restarts reception
            _ => Ok(false),
        }
    }

    fn listen(&mut self, channel: u8, now: Timestamp) -> Result<(), R::Error> {
        self.tune(channel, now)?;
        self.start_receiver(now)?;
        self.state = RotationState::Listening(channel);
        Ok(())
    }

    fn start_receiver(&mut self, now: Timestamp) -> Result<(), R::Error> {
        let deadline = self.listen_window.map(|window| now + window);
        self.radio.start_receive(deadline)?;
        self.receiving = true;
        self.usage.rx_started(now);
        Ok(())
    }

    fn tune(&mut self, channel: u8, now: Timestamp) -> Result<(), R::Error> {
        self.stop_receiver(now)?;
        self.radio.tune(channel)?;
        self.tuned = channel;
        self.usage.tuned();
        Ok(())
    }

    fn stop_receiver(&mut self, now: Timestamp) -> Result<(), R::Error> {
        if self.receiving {
            self.radio.stop_receive()?;
            self.receiving = false;
            self.usage.rx_stopped(now);
        }
        Ok(())
    }
}
