//! Alarm multiplexing on a single hardware countdown
//!
//! Motes usually expose one countdown timer per peripheral. [`AlarmQueue`]
//! keeps every pending alarm sorted by deadline and keeps the countdown armed
//! for the earliest one. The main loop polls it with the current time.

use embedded_hal::timer::{Cancel, CountDown};
use heapless::Vec;

use super::{Timer, TimerEvent};
use crate::time::{Ticks, Timestamp};

/// Alarm queue error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlarmError {
    /// No room for another alarm
    Full,
}

#[derive(Debug, Clone, Copy)]
struct Alarm {
    handle: u32,
    at: Timestamp,
    event: TimerEvent,
}

/// Many alarms on one `CountDown`
pub struct AlarmQueue<CD, const N: usize>
where
    CD: CountDown + Cancel,
{
    countdown: CD,
    /// Converts a span in protocol ticks to the countdown's time unit
    to_time: fn(Ticks) -> CD::Time,
    /// Pending alarms, ascending by deadline then by registration
    alarms: Vec<Alarm, N>,
    next_handle: u32,
    now: Timestamp,
    armed_for: Option<Timestamp>,
}

impl<CD, const N: usize> AlarmQueue<CD, N>
where
    CD: CountDown + Cancel,
{
    /// Create an alarm queue driving `countdown`
    pub fn new(countdown: CD, to_time: fn(Ticks) -> CD::Time) -> Self {
        Self {
            countdown,
            to_time,
            alarms: Vec::new(),
            next_handle: 0,
            now: Timestamp::ZERO,
            armed_for: None,
        }
    }

    /// Number of pending alarms
    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    /// True when no alarm is pending
    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    /// Deadline of the earliest pending alarm
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.alarms.first().map(|alarm| alarm.at)
    }

    /// Take the earliest alarm that is due at `now`
    ///
    /// Returns `WouldBlock` while nothing is due.
    pub fn poll(&mut self, now: Timestamp) -> nb::Result<(TimerEvent, Timestamp), AlarmError> {
        self.now = now;

        let due = self.alarms.first().map_or(false, |alarm| alarm.at <= now);
        if !due {
            match self.countdown.wait() {
                Ok(()) => {
                    // countdown ran out before our clock did, count the rest again
                    self.armed_for = None;
                    self.rearm();
                }
                Err(nb::Error::WouldBlock) => {}
                Err(nb::Error::Other(_)) => {}
            }
            return Err(nb::Error::WouldBlock);
        }

        let alarm = self.alarms.swap_remove(0);
        self.sort();
        self.armed_for = None;
        self.rearm();

        Ok((alarm.event, now))
    }

    /// Release the countdown
    pub fn free(self) -> CD {
        self.countdown
    }

    fn sort(&mut self) {
        self.alarms
            .sort_unstable_by_key(|alarm| (alarm.at, alarm.handle));
    }

    fn rearm(&mut self) {
        match self.alarms.first() {
            Some(first) if self.armed_for != Some(first.at) => {
                let span = first.at.saturating_since(self.now);
                self.countdown.start((self.to_time)(span));
                self.armed_for = Some(first.at);
            }
            Some(_) => {}
            None => {
                if self.armed_for.take().is_some() {
                    // not running is fine here
                    let _ = self.countdown.cancel();
                }
            }
        }
    }
}

impl<CD, const N: usize> Timer for AlarmQueue<CD, N>
where
    CD: CountDown + Cancel,
{
    type Handle = u32;
    type Error = AlarmError;

    fn arm(&mut self, at: Timestamp, event: TimerEvent) -> Result<Self::Handle, Self::Error> {
        let handle = self.next_handle;
        self.alarms
            .push(Alarm { handle, at, event })
            .map_err(|_| AlarmError::Full)?;
        self.next_handle = self.next_handle.wrapping_add(1);
        self.sort();
        self.rearm();
        Ok(handle)
    }

    fn cancel(&mut self, handle: Self::Handle) -> Result<(), Self::Error> {
        if let Some(index) = self.alarms.iter().position(|alarm| alarm.handle == handle) {
            self.alarms.swap_remove(index);
            self.sort();
            self.rearm();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Purpose;

    /// Countdown that expires when the test says so
    #[derive(Default)]
    struct TestCountDown {
        started: Option<u64>,
        expired: bool,
        cancels: u32,
    }

    impl CountDown for TestCountDown {
        type Time = u64;

        fn start<T>(&mut self, count: T)
        where
            T: Into<u64>,
        {
            self.started = Some(count.into());
            self.expired = false;
        }

        fn wait(&mut self) -> nb::Result<(), void::Void> {
            if self.expired {
                self.expired = false;
                Ok(())
            } else {
                Err(nb::Error::WouldBlock)
            }
        }
    }

    impl Cancel for TestCountDown {
        type Error = ();

        fn cancel(&mut self) -> Result<(), ()> {
            self.cancels += 1;
            self.started = None;
            Ok(())
        }
    }

    fn ticks(span: Ticks) -> u64 {
        span.ticks()
    }

    fn event(channel: u8, at: u64) -> TimerEvent {
        TimerEvent::new(Purpose::Send, channel, Timestamp::from_ticks(at))
    }

    #[test]
    fn test_countdown_follows_earliest_alarm() {
        let mut queue: AlarmQueue<TestCountDown, 4> =
            AlarmQueue::new(TestCountDown::default(), ticks);

        queue.arm(Timestamp::from_ticks(500), event(1, 500)).unwrap();
        assert_eq!(queue.countdown.started, Some(500));

        queue.arm(Timestamp::from_ticks(200), event(2, 200)).unwrap();
        assert_eq!(queue.countdown.started, Some(200));
        assert_eq!(queue.next_deadline(), Some(Timestamp::from_ticks(200)));
    }

    #[test]
    fn test_poll_yields_due_alarms_in_order() {
        let mut queue: AlarmQueue<TestCountDown, 4> =
            AlarmQueue::new(TestCountDown::default(), ticks);
        queue.arm(Timestamp::from_ticks(300), event(1, 300)).unwrap();
        queue.arm(Timestamp::from_ticks(100), event(2, 100)).unwrap();
        queue.arm(Timestamp::from_ticks(100), event(3, 100)).unwrap();

        assert_eq!(
            queue.poll(Timestamp::from_ticks(50)),
            Err(nb::Error::WouldBlock)
        );

        let now = Timestamp::from_ticks(100);
        let (first, _) = queue.poll(now).unwrap();
        let (second, _) = queue.poll(now).unwrap();
        assert_eq!(first.channel, 2);
        assert_eq!(second.channel, 3);
        assert_eq!(queue.poll(now), Err(nb::Error::WouldBlock));
        // re-armed for the remaining 200 ticks
        assert_eq!(queue.countdown.started, Some(200));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut queue: AlarmQueue<TestCountDown, 4> =
            AlarmQueue::new(TestCountDown::default(), ticks);
        let handle = queue.arm(Timestamp::from_ticks(10), event(1, 10)).unwrap();

        assert!(queue.cancel(handle).is_ok());
        assert!(queue.cancel(handle).is_ok());
        assert!(queue.is_empty());
        assert_eq!(queue.countdown.cancels, 1);
    }

    #[test]
    fn test_full_queue() {
        let mut queue: AlarmQueue<TestCountDown, 1> =
            AlarmQueue::new(TestCountDown::default(), ticks);
        queue.arm(Timestamp::from_ticks(10), event(1, 10)).unwrap();
        assert_eq!(
            queue.arm(Timestamp::from_ticks(20), event(1, 20)),
            Err(AlarmError::Full)
        );
    }
}
