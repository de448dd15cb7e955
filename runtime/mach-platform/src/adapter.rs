//! Mach Platform Adapter Layer
//!
//! Typed wrappers over the raw option bits and status codes, and the two
//! seams every backend implements: the `mach_msg()` trap and the monotonic
//! clock it is timed against.

use core::fmt;

use bitflags::bitflags;
use mach_sys::{
    mach_msg_header_t, mach_msg_option_t, mach_msg_return_t, mach_msg_size_t,
    mach_msg_timeout_t, mach_port_name_t,
};
use thiserror::Error;

bitflags! {
    /// `mach_msg()` option bits.
    ///
    /// Bit positions are the kernel's. Bits without a name here (trailer
    /// requests, newer kernel options) are carried through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MachMsgOption: mach_msg_option_t {
        const SEND_MSG = mach_sys::MACH_SEND_MSG;
        const RCV_MSG = mach_sys::MACH_RCV_MSG;
        const RCV_LARGE = mach_sys::MACH_RCV_LARGE;
        const RCV_LARGE_IDENTITY = mach_sys::MACH_RCV_LARGE_IDENTITY;

        const SEND_TIMEOUT = mach_sys::MACH_SEND_TIMEOUT;
        const SEND_OVERRIDE = mach_sys::MACH_SEND_OVERRIDE;
        const SEND_INTERRUPT = mach_sys::MACH_SEND_INTERRUPT;
        const SEND_NOTIFY = mach_sys::MACH_SEND_NOTIFY;
        const SEND_ALWAYS = mach_sys::MACH_SEND_ALWAYS;
        const SEND_TRAILER = mach_sys::MACH_SEND_TRAILER;
        const SEND_NOIMPORTANCE = mach_sys::MACH_SEND_NOIMPORTANCE;

        const RCV_TIMEOUT = mach_sys::MACH_RCV_TIMEOUT;
        const RCV_NOTIFY = mach_sys::MACH_RCV_NOTIFY;
        const RCV_INTERRUPT = mach_sys::MACH_RCV_INTERRUPT;
        const RCV_VOUCHER = mach_sys::MACH_RCV_VOUCHER;
        const RCV_OVERWRITE = mach_sys::MACH_RCV_OVERWRITE;

        const _ = !0;
    }
}

impl MachMsgOption {
    /// Both timeout bits, as applied to any bounded wait.
    pub const TIMEOUTS: Self = Self::SEND_TIMEOUT.union(Self::RCV_TIMEOUT);

    /// Wraps raw option bits without dropping any of them.
    #[inline]
    pub const fn from_raw(bits: mach_msg_option_t) -> Self {
        Self::from_bits_retain(bits)
    }

    /// Requests a trailer format and element set on receive.
    pub const fn rcv_trailer(trailer_type: u32, elements: u32) -> Self {
        Self::from_bits_retain(
            mach_sys::MACH_RCV_TRAILER_TYPE(trailer_type)
                | mach_sys::MACH_RCV_TRAILER_ELEMENTS(elements),
        )
    }
}

/// A `mach_msg()` status code.
///
/// This is the kernel's vocabulary verbatim; nothing in this workspace maps
/// one code onto another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MachMsgReturn(pub mach_msg_return_t);

impl MachMsgReturn {
    pub const SUCCESS: Self = Self(mach_sys::MACH_MSG_SUCCESS);

    pub const SEND_INVALID_DEST: Self = Self(mach_sys::MACH_SEND_INVALID_DEST);
    pub const SEND_TIMED_OUT: Self = Self(mach_sys::MACH_SEND_TIMED_OUT);
    pub const SEND_INTERRUPTED: Self = Self(mach_sys::MACH_SEND_INTERRUPTED);
    pub const SEND_TOO_LARGE: Self = Self(mach_sys::MACH_SEND_TOO_LARGE);

    pub const RCV_INVALID_NAME: Self = Self(mach_sys::MACH_RCV_INVALID_NAME);
    pub const RCV_TIMED_OUT: Self = Self(mach_sys::MACH_RCV_TIMED_OUT);
    pub const RCV_TOO_LARGE: Self = Self(mach_sys::MACH_RCV_TOO_LARGE);
    pub const RCV_INTERRUPTED: Self = Self(mach_sys::MACH_RCV_INTERRUPTED);
    pub const RCV_PORT_DIED: Self = Self(mach_sys::MACH_RCV_PORT_DIED);

    /// Raw status value
    #[inline]
    pub const fn code(self) -> mach_msg_return_t {
        self.0
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.0 == mach_sys::MACH_MSG_SUCCESS
    }

    /// Symbolic name of the code, as spelled in `<mach/message.h>`
    pub fn name(self) -> &'static str {
        use mach_sys::*;

        match self.0 {
            MACH_MSG_SUCCESS => "MACH_MSG_SUCCESS",
            MACH_SEND_IN_PROGRESS => "MACH_SEND_IN_PROGRESS",
            MACH_SEND_INVALID_DATA => "MACH_SEND_INVALID_DATA",
            MACH_SEND_INVALID_DEST => "MACH_SEND_INVALID_DEST",
            MACH_SEND_TIMED_OUT => "MACH_SEND_TIMED_OUT",
            MACH_SEND_INVALID_VOUCHER => "MACH_SEND_INVALID_VOUCHER",
            MACH_SEND_INTERRUPTED => "MACH_SEND_INTERRUPTED",
            MACH_SEND_MSG_TOO_SMALL => "MACH_SEND_MSG_TOO_SMALL",
            MACH_SEND_INVALID_REPLY => "MACH_SEND_INVALID_REPLY",
            MACH_SEND_INVALID_RIGHT => "MACH_SEND_INVALID_RIGHT",
            MACH_SEND_INVALID_NOTIFY => "MACH_SEND_INVALID_NOTIFY",
            MACH_SEND_INVALID_MEMORY => "MACH_SEND_INVALID_MEMORY",
            MACH_SEND_NO_BUFFER => "MACH_SEND_NO_BUFFER",
            MACH_SEND_TOO_LARGE => "MACH_SEND_TOO_LARGE",
            MACH_SEND_INVALID_TYPE => "MACH_SEND_INVALID_TYPE",
            MACH_SEND_INVALID_HEADER => "MACH_SEND_INVALID_HEADER",
            MACH_SEND_INVALID_TRAILER => "MACH_SEND_INVALID_TRAILER",
            MACH_SEND_INVALID_RT_OOL_SIZE => "MACH_SEND_INVALID_RT_OOL_SIZE",
            MACH_RCV_IN_PROGRESS => "MACH_RCV_IN_PROGRESS",
            MACH_RCV_INVALID_NAME => "MACH_RCV_INVALID_NAME",
            MACH_RCV_TIMED_OUT => "MACH_RCV_TIMED_OUT",
            MACH_RCV_TOO_LARGE => "MACH_RCV_TOO_LARGE",
            MACH_RCV_INTERRUPTED => "MACH_RCV_INTERRUPTED",
            MACH_RCV_PORT_CHANGED => "MACH_RCV_PORT_CHANGED",
            MACH_RCV_INVALID_NOTIFY => "MACH_RCV_INVALID_NOTIFY",
            MACH_RCV_INVALID_DATA => "MACH_RCV_INVALID_DATA",
            MACH_RCV_PORT_DIED => "MACH_RCV_PORT_DIED",
            MACH_RCV_IN_SET => "MACH_RCV_IN_SET",
            MACH_RCV_HEADER_ERROR => "MACH_RCV_HEADER_ERROR",
            MACH_RCV_BODY_ERROR => "MACH_RCV_BODY_ERROR",
            MACH_RCV_INVALID_TYPE => "MACH_RCV_INVALID_TYPE",
            MACH_RCV_SCATTER_SMALL => "MACH_RCV_SCATTER_SMALL",
            MACH_RCV_INVALID_TRAILER => "MACH_RCV_INVALID_TRAILER",
            MACH_RCV_IN_PROGRESS_TIMED => "MACH_RCV_IN_PROGRESS_TIMED",
            _ => "unknown mach_msg status",
        }
    }

    /// Converts to a `Result` for `?`-style call sites.
    ///
    /// The error keeps the exact code; see [`MachMsgError::code`].
    pub fn into_result(self) -> Result<(), MachMsgError> {
        match self {
            Self::SUCCESS => Ok(()),
            Self::SEND_TIMED_OUT => Err(MachMsgError::SendTimedOut),
            Self::RCV_TIMED_OUT => Err(MachMsgError::ReceiveTimedOut),
            Self::SEND_INTERRUPTED => Err(MachMsgError::SendInterrupted),
            Self::RCV_INTERRUPTED => Err(MachMsgError::ReceiveInterrupted),
            other => Err(MachMsgError::Kernel(other)),
        }
    }
}

impl fmt::Display for MachMsgReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.name(), self.0)
    }
}

impl From<mach_msg_return_t> for MachMsgReturn {
    fn from(code: mach_msg_return_t) -> Self {
        Self(code)
    }
}

/// Error types for message operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MachMsgError {
    #[error("send timed out")]
    SendTimedOut,

    #[error("receive timed out")]
    ReceiveTimedOut,

    #[error("send interrupted")]
    SendInterrupted,

    #[error("receive interrupted")]
    ReceiveInterrupted,

    #[error("mach_msg failed: {0}")]
    Kernel(MachMsgReturn),
}

impl MachMsgError {
    /// The status code this error was built from
    pub fn code(&self) -> MachMsgReturn {
        match self {
            Self::SendTimedOut => MachMsgReturn::SEND_TIMED_OUT,
            Self::ReceiveTimedOut => MachMsgReturn::RCV_TIMED_OUT,
            Self::SendInterrupted => MachMsgReturn::SEND_INTERRUPTED,
            Self::ReceiveInterrupted => MachMsgReturn::RCV_INTERRUPTED,
            Self::Kernel(code) => *code,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::SendTimedOut | Self::ReceiveTimedOut)
    }
}

/// The `mach_msg()` trap.
///
/// Implemented by [`SystemTrap`](crate::SystemTrap) on Apple targets and by
/// [`MockKernel`](crate::mock::MockKernel) for tests.
pub trait MachMsgTrap {
    /// Issues one `mach_msg()` call.
    ///
    /// # Safety
    /// `message` must point to a buffer aligned for `mach_msg_header_t`,
    /// readable for `send_size` bytes when `SEND_MSG` is set and writable for
    /// `receive_size` bytes when `RCV_MSG` is set.
    #[allow(clippy::too_many_arguments)]
    unsafe fn mach_msg(
        &self,
        message: *mut mach_msg_header_t,
        options: MachMsgOption,
        send_size: mach_msg_size_t,
        receive_size: mach_msg_size_t,
        receive_port: mach_port_name_t,
        timeout_ms: mach_msg_timeout_t,
        notify_port: mach_port_name_t,
    ) -> MachMsgReturn;
}

impl<T: MachMsgTrap + ?Sized> MachMsgTrap for &T {
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
        (**self).mach_msg(
            message,
            options,
            send_size,
            receive_size,
            receive_port,
            timeout_ms,
            notify_port,
        )
    }
}

/// Monotonic nanosecond clock. Must never go backwards.
pub trait Clock {
    fn now_ns(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}
