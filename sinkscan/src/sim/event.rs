//! Event queue entries for the simulation host

use std::cmp::Ordering;

use crate::time::Timestamp;
use crate::timer::TimerEvent;

/// Something that happens at an instant of simulated time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A sink emits a beacon on its channel
    Beacon {
        /// Emitting channel
        channel: u8,
        /// Beacon value
        value: u8,
        /// Frame sequence number
        seq: u8,
    },
    /// An armed alarm fires
    Alarm {
        /// Handle returned when arming
        handle: u64,
        /// Payload to hand back to the scanner
        event: TimerEvent,
    },
    /// The receive deadline passed
    RxClosed,
}

/// A queued event with its time and a sequence number for same-time ordering
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// When the event happens
    pub time: Timestamp,
    /// Queue insertion order
    pub seq: u64,
    /// The event
    pub event: SimEvent,
}

impl ScheduledEvent {
    /// Create a queue entry
    pub fn new(time: Timestamp, seq: u64, event: SimEvent) -> Self {
        Self { time, seq, event }
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed, BinaryHeap is a max-heap
        match other.time.cmp(&self.time) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn test_queue_pops_earliest_then_first_inserted() {
        let mut queue = BinaryHeap::new();
        queue.push(ScheduledEvent::new(Timestamp::from_secs(5), 0, SimEvent::RxClosed));
        queue.push(ScheduledEvent::new(
            Timestamp::from_secs(2),
            1,
            SimEvent::Beacon {
                channel: 11,
                value: 3,
                seq: 0,
            },
        ));
        queue.push(ScheduledEvent::new(Timestamp::from_secs(2), 2, SimEvent::RxClosed));

        let first = queue.pop().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(queue.pop().unwrap().seq, 2);
        assert_eq!(queue.pop().unwrap().time, Timestamp::from_secs(5));
    }
}
