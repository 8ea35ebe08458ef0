//! Send scheduling
//!
//! Sends are aimed at predicted reception windows. Each pending send holds a
//! unique instant; a request for an occupied instant is moved later by the
//! perturbation step until it is free.

use heapless::Vec;
use log::{debug, warn};

use super::collision::CollisionScheduler;
use crate::config::{ProtocolConfig, SendTarget, SLEEP_INTERVALS};
use crate::error::SendError;
use crate::time::{Ticks, Timestamp};
use crate::timer::{Purpose, Timer, TimerEvent};

/// Maximum number of sends pending at once
pub const MAX_PENDING_SENDS: usize = 64;

#[derive(Debug, Clone, Copy)]
struct PendingSend<H> {
    at: Timestamp,
    channel: u8,
    handle: H,
}

/// Pending sends and the window arithmetic behind them
#[derive(Debug, Clone)]
pub struct TransmissionScheduler<H> {
    sends: Vec<PendingSend<H>, MAX_PENDING_SENDS>,
    perturb_step: Ticks,
    horizon: Option<Ticks>,
    max_cycles: u8,
    send_target: SendTarget,
}

impl<H: Copy> TransmissionScheduler<H> {
    /// Create an empty scheduler
    pub fn new(config: &ProtocolConfig) -> Self {
        Self {
            sends: Vec::new(),
            perturb_step: config.perturb_step,
            horizon: config.horizon,
            max_cycles: config.max_cycles,
            send_target: config.send_target,
        }
    }

    /// Number of pending sends
    pub fn len(&self) -> usize {
        self.sends.len()
    }

    /// True when no send is pending
    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }

    /// Pending send instants for a channel, ascending
    pub fn pending_for(&self, channel: u8) -> impl Iterator<Item = Timestamp> + '_ {
        self.sends
            .iter()
            .filter(move |send| send.channel == channel)
            .map(|send| send.at)
    }

    /// Aim point of the window that opens `value` cycle lengths after `now`
    pub fn window_target(&self, now: Timestamp, value: u8, cycle_length: Ticks) -> Timestamp {
        let start = now + cycle_length * u64::from(value);
        match self.send_target {
            SendTarget::WindowStart => start,
            SendTarget::WindowMidpoint => start + cycle_length / 2,
        }
    }

    /// Register a send for `channel` at the first free instant from `at`
    ///
    /// Instants of pending discovery switches count as occupied too.
    pub fn schedule<T>(
        &mut self,
        at: Timestamp,
        channel: u8,
        collision: &CollisionScheduler,
        timer: &mut T,
    ) -> Result<Timestamp, SendError<T::Error>>
    where
        T: Timer<Handle = H>,
    {
        if self.sends.is_full() {
            warn!("send table full, dropping send to channel {}", channel);
            return Err(SendError::TableFull);
        }

        let mut at = at;
        while self.is_occupied(at, collision) {
            at += self.perturb_step;
        }

        let handle = timer
            .arm(at, TimerEvent::new(Purpose::Send, channel, at))
            .map_err(SendError::Timer)?;
        self.sends
            .push(PendingSend {
                at,
                channel,
                handle,
            })
            .map_err(|_| SendError::TableFull)?;
        debug!("send to channel {} scheduled at {}", channel, at.ticks());
        Ok(at)
    }

    /// Register a send into every window of `channel` within the lookahead
    ///
    /// The first window opens `last_value` cycle lengths after `now`, later
    /// ones follow every `T + 10 T + N T`. Windows before `now` or past
    /// `session_start + horizon` are skipped and at most `max_cycles` are
    /// registered. Windows that find the send table full are skipped.
    /// Returns the number of registered sends.
    #[allow(clippy::too_many_arguments)]
    pub fn schedule_completely<T>(
        &mut self,
        now: Timestamp,
        last_value: u8,
        cycle_length: Ticks,
        repeat_count: u8,
        channel: u8,
        session_start: Timestamp,
        collision: &CollisionScheduler,
        timer: &mut T,
    ) -> Result<usize, T::Error>
    where
        T: Timer<Handle = H>,
    {
        let first = self.window_target(now, last_value, cycle_length);
        let span = cycle_span(cycle_length, repeat_count);
        let limit = self.horizon.map(|horizon| session_start + horizon);

        let mut registered = 0;
        for cycle in 0..u64::from(self.max_cycles) {
            let at = first + span * cycle;
            if at < now {
                continue;
            }
            if limit.map_or(false, |limit| at > limit) {
                break;
            }
            match self.schedule(at, channel, collision, timer) {
                Ok(_) => registered += 1,
                // later windows cannot fit either
                Err(SendError::TableFull) => break,
                Err(SendError::Timer(error)) => return Err(error),
            }
        }
        Ok(registered)
    }

    /// Remove the send that fired for `channel` at `at`
    ///
    /// Returns false if no such send is pending, which means it was
    /// cancelled and the event must be ignored.
    pub fn take_due(&mut self, channel: u8, at: Timestamp) -> bool {
        match self
            .sends
            .iter()
            .position(|send| send.channel == channel && send.at == at)
        {
            Some(index) => {
                self.sends.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Cancel and forget every pending send
    pub fn cancel_all<T>(&mut self, timer: &mut T) -> Result<(), T::Error>
    where
        T: Timer<Handle = H>,
    {
        for send in self.sends.iter() {
            timer.cancel(send.handle)?;
        }
        self.sends.clear();
        Ok(())
    }

    fn is_occupied(&self, at: Timestamp, collision: &CollisionScheduler) -> bool {
        self.sends.iter().any(|send| send.at == at) || collision.can_schedule(at) == Some(0)
    }
}

/// Distance between two reception windows of the same sink
pub fn cycle_span(cycle_length: Ticks, repeat_count: u8) -> Ticks {
    cycle_length * (1 + SLEEP_INTERVALS + u64::from(repeat_count))
}
