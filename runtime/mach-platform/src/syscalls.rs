//! Real backends
//!
//! - [`MonotonicClock`]: the host's monotonic clock, available on every Unix
//! - [`SystemTrap`]: the `mach_msg()` trap from libSystem (runtime mode, Apple only)

use crate::adapter::Clock;

#[cfg(all(feature = "runtime", target_vendor = "apple"))]
use crate::adapter::{MachMsgOption, MachMsgReturn, MachMsgTrap};
#[cfg(all(feature = "runtime", target_vendor = "apple"))]
use mach_sys::{
    mach_msg_header_t, mach_msg_size_t, mach_msg_timeout_t, mach_port_name_t,
};

const NANOSECONDS_PER_SECOND: u64 = 1_000_000_000;

/// `CLOCK_MONOTONIC` in nanoseconds.
///
/// On macOS this is the same timebase as `mach_absolute_time()`, so it does
/// not advance while the system sleeps, matching what the kernel measures
/// `mach_msg()` timeouts against.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn now_ns(&self) -> u64 {
        // SAFETY: timespec is plain old data, `ts` is a valid out-pointer and
        // CLOCK_MONOTONIC is always supported.
        let mut ts: libc::timespec = unsafe { core::mem::zeroed() };
        let rv = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        debug_assert_eq!(rv, 0, "clock_gettime(CLOCK_MONOTONIC) failed");

        (ts.tv_sec as u64)
            .wrapping_mul(NANOSECONDS_PER_SECOND)
            .wrapping_add(ts.tv_nsec as u64)
    }
}

/// The kernel's `mach_msg()` trap.
#[cfg(all(feature = "runtime", target_vendor = "apple"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTrap;

#[cfg(all(feature = "runtime", target_vendor = "apple"))]
impl MachMsgTrap for SystemTrap {
    unsafe fn mach_msg(
        &self,
        message: *mut mach_msg_header_t,
        options: MachMsgOption,
        send_size: mach_msg_size_t,
        receive_size: mach_msg_size_t,
        receive_port: mach_port_name_t,
        timeout_ms: mach_msg_timeout_t,
        notify_port: mach_port_name_t,
    ) -> MachMsgReturn {
        MachMsgReturn(mach_sys::mach_msg(
            message,
            options.bits(),
            send_size,
            receive_size,
            receive_port,
            timeout_ms,
            notify_port,
        ))
    }
}
