//! Simulated radio and timer
//!
//! Both collaborators share one [`Medium`] holding simulated time, the radio
//! state and the event queue, so that alarms armed by the scanner and
//! beacons emitted by sinks are ordered together.

use std::cell::RefCell;
use std::collections::{BinaryHeap, HashSet};
use std::convert::Infallible;
use std::rc::Rc;

use super::event::{ScheduledEvent, SimEvent};
use crate::radio::Radio;
use crate::time::Timestamp;
use crate::timer::{Timer, TimerEvent};

/// A frame handed to the simulated radio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionRecord {
    /// Transmit instant
    pub at: Timestamp,
    /// Channel the radio was tuned to
    pub channel: u8,
    /// The sink on that channel had its reception window open
    pub hit: bool,
}

/// Shared simulation state
#[derive(Debug, Default)]
pub struct Medium {
    /// Current simulated time
    pub now: Timestamp,
    /// Channel the radio is tuned to
    pub tuned: Option<u8>,
    /// Receiver enabled
    pub receiving: bool,
    /// Deadline of the current reception
    pub rx_deadline: Option<Timestamp>,
    /// Frames transmitted so far
    pub transmissions: Vec<TransmissionRecord>,
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    next_handle: u64,
    cancelled: HashSet<u64>,
}

impl Medium {
    /// Queue an event
    pub fn schedule(&mut self, time: Timestamp, event: SimEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(ScheduledEvent::new(time, seq, event));
    }

    /// Pop the earliest event due at or before `until`
    pub fn pop_until(&mut self, until: Timestamp) -> Option<ScheduledEvent> {
        if self.queue.peek()?.time > until {
            return None;
        }
        let next = self.queue.pop()?;
        self.now = next.time;
        Some(next)
    }

    /// True if the alarm was cancelled; forgets the cancellation
    pub fn take_cancelled(&mut self, handle: u64) -> bool {
        self.cancelled.remove(&handle)
    }

    /// Number of queued events
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

/// Radio collaborator backed by the medium
#[derive(Debug, Clone)]
pub struct SimRadio {
    medium: Rc<RefCell<Medium>>,
}

impl SimRadio {
    /// Attach to a medium
    pub fn new(medium: Rc<RefCell<Medium>>) -> Self {
        Self { medium }
    }
}

impl Radio for SimRadio {
    type Error = Infallible;

    fn tune(&mut self, channel: u8) -> Result<(), Self::Error> {
        self.medium.borrow_mut().tuned = Some(channel);
        Ok(())
    }

    fn start_receive(&mut self, deadline: Option<Timestamp>) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        medium.receiving = true;
        medium.rx_deadline = deadline;
        if let Some(deadline) = deadline {
            medium.schedule(deadline, SimEvent::RxClosed);
        }
        Ok(())
    }

    fn stop_receive(&mut self) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        medium.receiving = false;
        medium.rx_deadline = None;
        Ok(())
    }

    fn transmit(&mut self, _frames: &[u8], _offset: usize, _len: usize) -> Result<(), Self::Error> {
        let mut medium = self.medium.borrow_mut();
        if let Some(channel) = medium.tuned {
            let at = medium.now;
            medium.transmissions.push(TransmissionRecord {
                at,
                channel,
                hit: false,
            });
        }
        Ok(())
    }
}

/// Timer collaborator backed by the medium
#[derive(Debug, Clone)]
pub struct SimTimer {
    medium: Rc<RefCell<Medium>>,
}

impl SimTimer {
    /// Attach to a medium
    pub fn new(medium: Rc<RefCell<Medium>>) -> Self {
        Self { medium }
    }
}

impl Timer for SimTimer {
    type Handle = u64;
    type Error = Infallible;

    fn arm(&mut self, at: Timestamp, event: TimerEvent) -> Result<Self::Handle, Self::Error> {
        let mut medium = self.medium.borrow_mut();
        let handle = medium.next_handle;
        medium.next_handle += 1;
        // alarms in the past fire right away
        let at = at.max(medium.now);
        medium.schedule(at, SimEvent::Alarm { handle, event });
        Ok(handle)
    }

    fn cancel(&mut self, handle: Self::Handle) -> Result<(), Self::Error> {
        self.medium.borrow_mut().cancelled.insert(handle);
        Ok(())
    }
}
