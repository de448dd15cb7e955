//! Deadline IPC - absolute deadlines for Mach message exchanges
//!
//! # Purpose
//! `mach_msg()` only takes a relative timeout, which callers must not reuse
//! across the several kernel calls a single exchange can take (send, then
//! receive, then retries after interruptions). This crate keeps an absolute
//! [`Deadline`] and recomputes the relative timeout right before each call.
//!
//! # Integration Points
//! - Depends on: `mach-platform` (trap and clock seams), `mach-sys` (ABI)
//! - Provides to: MIG servers and clients, exception handlers
//! - IPC endpoints: whatever ports the caller passes in
//! - Resources: none; message buffers are borrowed from the caller
//!
//! # Architecture
//! - [`Deadline`]: converter from relative timeouts and sentinels
//! - `resolver`: per-call `(timeout, options)` from a deadline
//! - [`Messenger`]: split send/receive phases with interrupt retries
//! - [`mig`]: MIG reply and trailer helpers
//!
//! # Testing Strategy
//! - Unit tests: rounding, sentinels, phase options, retry loops (mock kernel)
//! - Integration tests: end-to-end exchanges against a scripted kernel
//! - Benchmarks: deadline conversion and a full exchange on a no-op trap

#![no_std]

#[cfg(test)]
extern crate std;

pub mod deadline;
mod messenger;
pub mod mig;
mod resolver;

pub use deadline::{
    Deadline, NANOSECONDS_PER_MILLISECOND, TIMEOUT_NONBLOCKING, TIMEOUT_WAIT_INDEFINITELY,
};
pub use messenger::{Exchange, Messenger};
pub use mig::{
    mach_message_trailer_from_header, prepare_mig_reply_from_request, set_mig_reply_error,
    trailer_offset, MIG_REPLY_SIZE,
};

pub use mach_platform::{Clock, MachMsgError, MachMsgOption, MachMsgReturn, MachMsgTrap, MonotonicClock};

#[cfg(feature = "mock")]
pub use mach_platform::mock;

#[cfg(all(feature = "runtime", target_vendor = "apple"))]
pub use mach_platform::SystemTrap;

/// Deadline `timeout_ms` from now on the host's monotonic clock
pub fn deadline_from_timeout(timeout_ms: mach_sys::mach_msg_timeout_t) -> Deadline {
    Deadline::from_timeout(&MonotonicClock, timeout_ms)
}

/// Messenger over the real trap and the host's monotonic clock
#[cfg(all(feature = "runtime", target_vendor = "apple"))]
pub const fn system_messenger() -> Messenger<SystemTrap, MonotonicClock> {
    Messenger::new(SystemTrap, MonotonicClock)
}

/// [`Messenger::send_receive`] on the real trap.
///
/// # Safety
/// Same contract as [`Messenger::send_receive`].
#[cfg(all(feature = "runtime", target_vendor = "apple"))]
pub unsafe fn mach_message_with_deadline(
    message: *mut mach_sys::mach_msg_header_t,
    exchange: &Exchange,
) -> MachMsgReturn {
    system_messenger().send_receive(message, exchange)
}
