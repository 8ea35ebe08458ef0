//! Protocol time
//!
//! All time values are passed in explicitly by the host, so the protocol core
//! never reads a clock. One tick is one microsecond in the shipped presets,
//! but nothing in the core depends on the unit.

use core::ops::{Add, AddAssign, Div, Mul, Sub};

/// Point in protocol time, in ticks since the host's epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch
    pub const ZERO: Timestamp = Timestamp(0);

    /// Create a timestamp from raw ticks
    pub const fn from_ticks(ticks: u64) -> Self {
        Timestamp(ticks)
    }

    /// Create a timestamp from microseconds
    pub const fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    /// Create a timestamp from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1_000))
    }

    /// Create a timestamp from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000_000))
    }

    /// Raw ticks
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Span elapsed since `earlier`, zero if `earlier` lies in the future
    pub const fn saturating_since(self, earlier: Timestamp) -> Ticks {
        Ticks(self.0.saturating_sub(earlier.0))
    }

    /// Saturating addition of a span
    pub const fn saturating_add(self, span: Ticks) -> Timestamp {
        Timestamp(self.0.saturating_add(span.0))
    }

    /// Saturating subtraction of a span
    pub const fn saturating_sub(self, span: Ticks) -> Timestamp {
        Timestamp(self.0.saturating_sub(span.0))
    }

    /// Signed distance `other - self`
    ///
    /// Positive when `other` lies after `self`.
    pub fn offset_to(self, other: Timestamp) -> i64 {
        if other.0 >= self.0 {
            i64::try_from(other.0 - self.0).unwrap_or(i64::MAX)
        } else {
            i64::try_from(self.0 - other.0).map_or(i64::MIN, |d| -d)
        }
    }
}

impl Add<Ticks> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Ticks) -> Timestamp {
        self.saturating_add(rhs)
    }
}

impl AddAssign<Ticks> for Timestamp {
    fn add_assign(&mut self, rhs: Ticks) {
        *self = self.saturating_add(rhs);
    }
}

impl Sub<Ticks> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Ticks) -> Timestamp {
        self.saturating_sub(rhs)
    }
}

impl Sub for Timestamp {
    type Output = Ticks;

    fn sub(self, rhs: Timestamp) -> Ticks {
        self.saturating_since(rhs)
    }
}

/// Span of protocol time, in ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ticks(u64);

impl Ticks {
    /// Empty span
    pub const ZERO: Ticks = Ticks(0);

    /// Create a span from raw ticks
    pub const fn from_ticks(ticks: u64) -> Self {
        Ticks(ticks)
    }

    /// Create a span from microseconds
    pub const fn from_micros(us: u64) -> Self {
        Ticks(us)
    }

    /// Create a span from milliseconds
    pub const fn from_millis(ms: u64) -> Self {
        Ticks(ms.saturating_mul(1_000))
    }

    /// Create a span from seconds
    pub const fn from_secs(secs: u64) -> Self {
        Ticks(secs.saturating_mul(1_000_000))
    }

    /// Raw ticks
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// True for the empty span
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating multiplication by a count
    pub const fn saturating_mul(self, n: u64) -> Ticks {
        Ticks(self.0.saturating_mul(n))
    }
}

impl Add for Ticks {
    type Output = Ticks;

    fn add(self, rhs: Ticks) -> Ticks {
        Ticks(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Ticks) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Ticks {
    type Output = Ticks;

    fn sub(self, rhs: Ticks) -> Ticks {
        Ticks(self.0.saturating_sub(rhs.0))
    }
}

impl Mul<u64> for Ticks {
    type Output = Ticks;

    fn mul(self, rhs: u64) -> Ticks {
        self.saturating_mul(rhs)
    }
}

impl Div<u64> for Ticks {
    type Output = Ticks;

    fn div(self, rhs: u64) -> Ticks {
        Ticks(self.0.checked_div(rhs).unwrap_or(0))
    }
}
