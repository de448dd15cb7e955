//! Absolute deadlines
//!
//! A [`Deadline`] is a point on the monotonic clock, in nanoseconds, captured
//! once and then consulted before every kernel call of an exchange. Two
//! values are reserved as sentinels and never denote a real instant.

use mach_platform::Clock;
use mach_sys::mach_msg_timeout_t;

pub const NANOSECONDS_PER_MILLISECOND: u64 = 1_000_000;

/// Relative timeout meaning "do not block at all"
pub const TIMEOUT_NONBLOCKING: mach_msg_timeout_t = 0;

/// Relative timeout meaning "block until the operation completes"
pub const TIMEOUT_WAIT_INDEFINITELY: mach_msg_timeout_t = mach_msg_timeout_t::MAX;

/// Absolute deadline in monotonic-clock nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Deadline(u64);

impl Deadline {
    /// Every call is attempted once with a zero timeout.
    pub const NONBLOCKING: Self = Self(0);

    /// Calls block with no time bound.
    pub const WAIT_INDEFINITELY: Self = Self(u64::MAX);

    #[inline]
    pub const fn from_raw(ns: u64) -> Self {
        Self(ns)
    }

    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Converts a relative timeout into a deadline measured from now.
    ///
    /// The sentinels map onto their deadline counterparts without reading
    /// the clock. A deadline that would pass the end of the clock's range
    /// saturates to [`Deadline::WAIT_INDEFINITELY`].
    pub fn from_timeout<C: Clock + ?Sized>(clock: &C, timeout_ms: mach_msg_timeout_t) -> Self {
        match timeout_ms {
            TIMEOUT_NONBLOCKING => Self::NONBLOCKING,
            TIMEOUT_WAIT_INDEFINITELY => Self::WAIT_INDEFINITELY,
            _ => Self(
                clock
                    .now_ns()
                    .saturating_add(u64::from(timeout_ms) * NANOSECONDS_PER_MILLISECOND),
            ),
        }
    }

    #[inline]
    pub const fn is_nonblocking(self) -> bool {
        self.0 == Self::NONBLOCKING.0
    }

    #[inline]
    pub const fn is_wait_indefinitely(self) -> bool {
        self.0 == Self::WAIT_INDEFINITELY.0
    }

    /// True once a concrete deadline is at or behind the clock.
    ///
    /// Sentinels never expire.
    pub fn has_expired<C: Clock + ?Sized>(self, clock: &C) -> bool {
        if self.is_nonblocking() || self.is_wait_indefinitely() {
            return false;
        }
        clock.now_ns() >= self.0
    }
}
