//! Per-call timeout resolution
//!
//! Turns a [`Deadline`] into the `(timeout, options)` pair for the next
//! `mach_msg()` call, reading the clock at the last possible moment.

use mach_platform::{Clock, MachMsgOption};
use mach_sys::{mach_msg_timeout_t, MACH_MSG_TIMEOUT_NONE};

use crate::deadline::{Deadline, NANOSECONDS_PER_MILLISECOND};

const HALF_MILLISECOND_NS: u64 = NANOSECONDS_PER_MILLISECOND / 2;

/// What the next kernel call should wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Remaining {
    pub timeout_ms: mach_msg_timeout_t,
    /// Either empty or both timeout bits; the phase masks what it needs.
    pub options: MachMsgOption,
    /// False when the deadline has already passed.
    pub running: bool,
}

/// Resolves `deadline` against `clock`.
///
/// A concrete deadline less than half a millisecond away rounds to zero and
/// is reported as not running, while [`Deadline::NONBLOCKING`] always runs
/// once with a zero timeout.
pub(crate) fn resolve<C: Clock + ?Sized>(deadline: Deadline, clock: &C) -> Remaining {
    if deadline.is_wait_indefinitely() {
        return Remaining {
            timeout_ms: MACH_MSG_TIMEOUT_NONE,
            options: MachMsgOption::empty(),
            running: true,
        };
    }

    let options = MachMsgOption::TIMEOUTS;

    if deadline.is_nonblocking() {
        return Remaining {
            timeout_ms: 0,
            options,
            running: true,
        };
    }

    let now = clock.now_ns();
    let remaining_ms = match deadline.as_raw().checked_sub(now) {
        Some(0) | None => 0,
        Some(remaining_ns) => round_to_millis(remaining_ns),
    };

    Remaining {
        timeout_ms: mach_msg_timeout_t::try_from(remaining_ms).unwrap_or(mach_msg_timeout_t::MAX),
        options,
        running: remaining_ms != 0,
    }
}

/// Nearest millisecond, ties up. Truncates when the rounding bias would
/// overflow.
pub(crate) fn round_to_millis(ns: u64) -> u64 {
    match ns.checked_add(HALF_MILLISECOND_NS) {
        Some(biased) => biased / NANOSECONDS_PER_MILLISECOND,
        None => ns / NANOSECONDS_PER_MILLISECOND,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mach_platform::mock::ManualClock;

    const MS: u64 = NANOSECONDS_PER_MILLISECOND;

    #[test]
    fn test_rounding() {
        assert_eq!(round_to_millis(0), 0);
        assert_eq!(round_to_millis(499_999), 0);
        assert_eq!(round_to_millis(500_000), 1);
        assert_eq!(round_to_millis(1_499_999), 1);
        assert_eq!(round_to_millis(1_500_000), 2);
        assert_eq!(round_to_millis(7 * MS), 7);
    }

    #[test]
    fn test_rounding_near_u64_max_truncates() {
        let max_ms = u64::MAX / MS;
        assert_eq!(round_to_millis(u64::MAX), max_ms);
        assert_eq!(round_to_millis(u64::MAX - HALF_MILLISECOND_NS + 1), max_ms);
        // Last value where the bias still fits.
        let edge = u64::MAX - HALF_MILLISECOND_NS;
        assert_eq!(round_to_millis(edge), u64::MAX / MS);
    }

    #[test]
    fn test_wait_indefinitely() {
        let clock = ManualClock::new(42);
        let remaining = resolve(Deadline::WAIT_INDEFINITELY, &clock);
        assert_eq!(
            remaining,
            Remaining {
                timeout_ms: MACH_MSG_TIMEOUT_NONE,
                options: MachMsgOption::empty(),
                running: true,
            }
        );
        assert_eq!(clock.reads(), 0);
    }

    #[test]
    fn test_nonblocking_runs_once_with_zero_timeout() {
        let clock = ManualClock::new(u64::MAX - 1);
        let remaining = resolve(Deadline::NONBLOCKING, &clock);
        assert_eq!(remaining.timeout_ms, 0);
        assert_eq!(remaining.options, MachMsgOption::TIMEOUTS);
        assert!(remaining.running);
        assert_eq!(clock.reads(), 0);
    }

    #[test]
    fn test_past_and_present_deadlines_do_not_run() {
        let clock = ManualClock::new(10 * MS);
        for deadline in [1, 5 * MS, 10 * MS] {
            let remaining = resolve(Deadline::from_raw(deadline), &clock);
            assert_eq!(remaining.timeout_ms, 0);
            assert_eq!(remaining.options, MachMsgOption::TIMEOUTS);
            assert!(!remaining.running);
        }
    }

    #[test]
    fn test_future_deadline() {
        let clock = ManualClock::new(10 * MS);
        let remaining = resolve(Deadline::from_raw(15 * MS + 600_000), &clock);
        assert_eq!(remaining.timeout_ms, 6);
        assert_eq!(remaining.options, MachMsgOption::TIMEOUTS);
        assert!(remaining.running);
    }

    #[test]
    fn test_sub_half_millisecond_gap_does_not_run() {
        let clock = ManualClock::new(10 * MS);

        let remaining = resolve(Deadline::from_raw(10 * MS + 499_999), &clock);
        assert_eq!(remaining.timeout_ms, 0);
        assert!(!remaining.running);

        let remaining = resolve(Deadline::from_raw(10 * MS + 500_000), &clock);
        assert_eq!(remaining.timeout_ms, 1);
        assert!(remaining.running);
    }

    #[test]
    fn test_distant_deadline_saturates() {
        let clock = ManualClock::new(1);
        let remaining = resolve(Deadline::from_raw(u64::MAX - 1), &clock);
        assert_eq!(remaining.timeout_ms, mach_msg_timeout_t::MAX);
        assert!(remaining.running);
    }
}
