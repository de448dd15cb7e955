//! Mock kernel and clock
//!
//! # WARNING: This is NOT the real `mach_msg()`!
//!
//! [`MockKernel`] replays a script of status codes, records every call it
//! sees and can advance a shared [`ManualClock`] to simulate time spent
//! blocked in the kernel. Used for unit and integration tests on any host.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use core::mem::size_of;
use core::ptr;

use mach_sys::{
    mach_msg_header_t, mach_msg_size_t, mach_msg_timeout_t, mach_port_name_t,
};

use crate::adapter::{Clock, MachMsgOption, MachMsgReturn, MachMsgTrap};

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
    reads: Cell<usize>,
}

impl ManualClock {
    pub const fn new(start_ns: u64) -> Self {
        Self {
            now: Cell::new(start_ns),
            reads: Cell::new(0),
        }
    }

    pub fn set(&self, now_ns: u64) {
        self.now.set(now_ns);
    }

    pub fn advance(&self, elapsed_ns: u64) {
        self.now.set(self.now.get().saturating_add(elapsed_ns));
    }

    /// Number of times `now_ns()` has been called
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.reads.set(self.reads.get() + 1);
        self.now.get()
    }
}

/// One scripted kernel result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockReply {
    /// Status returned from the call
    pub code: MachMsgReturn,
    /// Time the call pretends to block for
    pub elapsed_ns: u64,
    /// Header written into the buffer on a successful receive
    pub deliver: Option<mach_msg_header_t>,
}

impl MockReply {
    pub const fn new(code: MachMsgReturn) -> Self {
        Self {
            code,
            elapsed_ns: 0,
            deliver: None,
        }
    }

    pub const fn after(mut self, elapsed_ns: u64) -> Self {
        self.elapsed_ns = elapsed_ns;
        self
    }

    pub const fn delivering(mut self, header: mach_msg_header_t) -> Self {
        self.deliver = Some(header);
        self
    }
}

/// Arguments of one observed `mach_msg()` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockCall {
    pub options: MachMsgOption,
    pub send_size: mach_msg_size_t,
    pub receive_size: mach_msg_size_t,
    pub receive_port: mach_port_name_t,
    pub timeout_ms: mach_msg_timeout_t,
    pub notify_port: mach_port_name_t,
    /// Header as it was in the buffer when a send was issued
    pub sent: Option<mach_msg_header_t>,
}

/// Scriptable stand-in for the `mach_msg()` trap.
///
/// Once the script runs dry every call returns `MACH_MSG_SUCCESS` without
/// blocking.
#[derive(Debug, Default)]
pub struct MockKernel<'c> {
    clock: Option<&'c ManualClock>,
    script: RefCell<VecDeque<MockReply>>,
    calls: RefCell<Vec<MockCall>>,
}

impl<'c> MockKernel<'c> {
    pub fn new() -> Self {
        Self {
            clock: None,
            script: RefCell::new(VecDeque::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// A kernel whose scripted `elapsed_ns` advances `clock`
    pub fn with_clock(clock: &'c ManualClock) -> Self {
        Self {
            clock: Some(clock),
            ..Self::new()
        }
    }

    pub fn push(&self, reply: MockReply) -> &Self {
        self.script.borrow_mut().push_back(reply);
        self
    }

    pub fn push_code(&self, code: MachMsgReturn) -> &Self {
        self.push(MockReply::new(code))
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// Scripted replies not yet consumed
    pub fn pending(&self) -> usize {
        self.script.borrow().len()
    }
}

impl MachMsgTrap for MockKernel<'_> {
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
        let sent = if options.contains(MachMsgOption::SEND_MSG) && !message.is_null() {
            Some(ptr::read(message))
        } else {
            None
        };

        self.calls.borrow_mut().push(MockCall {
            options,
            send_size,
            receive_size,
            receive_port,
            timeout_ms,
            notify_port,
            sent,
        });

        let reply = self
            .script
            .borrow_mut()
            .pop_front()
            .unwrap_or(MockReply::new(MachMsgReturn::SUCCESS));

        log::trace!(
            "mock mach_msg options={:#x} timeout={}ms -> {}",
            options.bits(),
            timeout_ms,
            reply.code
        );

        if let Some(clock) = self.clock {
            clock.advance(reply.elapsed_ns);
        }

        if let Some(header) = reply.deliver {
            let fits = receive_size as usize >= size_of::<mach_msg_header_t>();
            if reply.code.is_success()
                && options.contains(MachMsgOption::RCV_MSG)
                && fits
                && !message.is_null()
            {
                ptr::write(message, header);
            }
        }

        reply.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now_ns(), 10);
        clock.advance(5);
        assert_eq!(clock.now_ns(), 15);
        clock.set(u64::MAX - 1);
        clock.advance(10);
        assert_eq!(clock.now_ns(), u64::MAX);
        assert_eq!(clock.reads(), 3);
    }

    #[test]
    fn test_mock_kernel_replays_script() {
        let clock = ManualClock::new(0);
        let kernel = MockKernel::with_clock(&clock);
        kernel
            .push(MockReply::new(MachMsgReturn::SEND_INTERRUPTED).after(1_000))
            .push_code(MachMsgReturn::RCV_TIMED_OUT);

        let mut header = mach_msg_header_t {
            msgh_size: 24,
            ..Default::default()
        };

        let first = unsafe {
            kernel.mach_msg(&mut header, MachMsgOption::SEND_MSG, 24, 0, 0, 7, 0)
        };
        assert_eq!(first, MachMsgReturn::SEND_INTERRUPTED);
        assert_eq!(clock.now_ns(), 1_000);

        let second = unsafe {
            kernel.mach_msg(&mut header, MachMsgOption::RCV_MSG, 0, 24, 3, 0, 0)
        };
        assert_eq!(second, MachMsgReturn::RCV_TIMED_OUT);

        let third = unsafe {
            kernel.mach_msg(&mut header, MachMsgOption::empty(), 0, 0, 0, 0, 0)
        };
        assert_eq!(third, MachMsgReturn::SUCCESS);

        let calls = kernel.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].timeout_ms, 7);
        assert_eq!(calls[0].sent.map(|h| h.msgh_size), Some(24));
        assert_eq!(calls[1].receive_port, 3);
        assert_eq!(calls[1].sent, None);
        assert_eq!(kernel.pending(), 0);
    }

    #[test]
    fn test_mock_kernel_delivers_on_receive() {
        let kernel = MockKernel::new();
        let delivered = mach_msg_header_t {
            msgh_size: 24,
            msgh_id: 42,
            ..Default::default()
        };
        kernel.push(MockReply::new(MachMsgReturn::SUCCESS).delivering(delivered));

        let mut header = mach_msg_header_t::default();
        let rv = unsafe {
            kernel.mach_msg(&mut header, MachMsgOption::RCV_MSG, 0, 24, 5, 0, 0)
        };
        assert!(rv.is_success());
        assert_eq!(header, delivered);
    }
}
