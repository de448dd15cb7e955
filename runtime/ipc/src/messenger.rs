//! Deadline-bounded `mach_msg()`
//!
//! # Design
//! A combined send-and-receive is split into two kernel calls so that each
//! phase sees the time actually left when it starts. Left combined, the
//! kernel applies the timeout to the send and then again to the receive,
//! and the deadline can be overrun by up to twice the budget.
//!
//! Each phase forces its `*_INTERRUPT` option. Without it libsyscall
//! restarts an interrupted call with the relative timeout it was first
//! given, which no longer matches the deadline. The retry loop here
//! re-resolves the deadline instead. A caller that set the interrupt option
//! itself sees the interruption.

use mach_platform::{Clock, MachMsgOption, MachMsgReturn, MachMsgTrap};
use mach_sys::{mach_msg_header_t, mach_msg_size_t, mach_port_name_t, MACH_PORT_NULL};

use crate::deadline::Deadline;
use crate::resolver::resolve;

/// Parameters of one logical message exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exchange {
    /// `SEND_MSG` and/or `RCV_MSG` plus any auxiliary options
    pub options: MachMsgOption,
    /// Receive buffer size; unused when only sending
    pub receive_size: mach_msg_size_t,
    pub receive_port: mach_port_name_t,
    pub deadline: Deadline,
    pub notify_port: mach_port_name_t,
    /// Make one attempt per phase even if the deadline has passed
    pub run_even_if_expired: bool,
}

impl Exchange {
    pub fn new(options: MachMsgOption, deadline: Deadline) -> Self {
        Self {
            options,
            receive_size: 0,
            receive_port: MACH_PORT_NULL,
            deadline,
            notify_port: MACH_PORT_NULL,
            run_even_if_expired: false,
        }
    }

    pub fn receive_from(mut self, receive_port: mach_port_name_t, receive_size: mach_msg_size_t) -> Self {
        self.receive_port = receive_port;
        self.receive_size = receive_size;
        self
    }

    pub fn notify(mut self, notify_port: mach_port_name_t) -> Self {
        self.notify_port = notify_port;
        self
    }

    pub fn run_even_if_expired(mut self, run_even_if_expired: bool) -> Self {
        self.run_even_if_expired = run_even_if_expired;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Send,
    Receive,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Send => "send",
            Phase::Receive => "receive",
        }
    }

    fn message_bit(self) -> MachMsgOption {
        match self {
            Phase::Send => MachMsgOption::SEND_MSG,
            Phase::Receive => MachMsgOption::RCV_MSG,
        }
    }

    fn interrupt_bit(self) -> MachMsgOption {
        match self {
            Phase::Send => MachMsgOption::SEND_INTERRUPT,
            Phase::Receive => MachMsgOption::RCV_INTERRUPT,
        }
    }

    fn interrupted(self) -> MachMsgReturn {
        match self {
            Phase::Send => MachMsgReturn::SEND_INTERRUPTED,
            Phase::Receive => MachMsgReturn::RCV_INTERRUPTED,
        }
    }

    /// Options for this phase alone: the other direction cleared, this
    /// direction's interrupt forced on.
    fn options(self, requested: MachMsgOption) -> MachMsgOption {
        let other = match self {
            Phase::Send => MachMsgOption::RCV_MSG,
            Phase::Receive => MachMsgOption::SEND_MSG,
        };
        requested.difference(other).union(self.interrupt_bit())
    }
}

/// Runs message exchanges against a trap and a clock.
///
/// Holds no mutable state of its own, so one messenger can serve many
/// threads whenever the trap and clock allow it.
#[derive(Debug, Clone, Default)]
pub struct Messenger<T, C> {
    trap: T,
    clock: C,
}

impl<T: MachMsgTrap, C: Clock> Messenger<T, C> {
    pub const fn new(trap: T, clock: C) -> Self {
        Self { trap, clock }
    }

    pub fn trap(&self) -> &T {
        &self.trap
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Deadline `timeout_ms` from now on this messenger's clock
    pub fn deadline_from_timeout(&self, timeout_ms: mach_sys::mach_msg_timeout_t) -> Deadline {
        Deadline::from_timeout(&self.clock, timeout_ms)
    }

    /// Sends and/or receives on `message`, bounded by `exchange.deadline`.
    ///
    /// Returns the status of the last phase run, in the kernel's own codes.
    /// When the deadline has passed before a phase starts (and the exchange
    /// is not forced), the phase is skipped and `MACH_SEND_TIMED_OUT` or
    /// `MACH_RCV_TIMED_OUT` is returned as the kernel would have. A failed
    /// send ends the exchange without receiving. With neither `SEND_MSG` nor
    /// `RCV_MSG` requested nothing is called and `MACH_MSG_SUCCESS` is
    /// returned.
    ///
    /// # Safety
    /// `message` must point to a buffer aligned for `mach_msg_header_t`
    /// holding a valid header. When sending, the buffer must be readable for
    /// the header's `msgh_size` bytes; when receiving it must be writable for
    /// `exchange.receive_size` bytes. The buffer must not be accessed
    /// elsewhere for the duration of the call.
    pub unsafe fn send_receive(
        &self,
        message: *mut mach_msg_header_t,
        exchange: &Exchange,
    ) -> MachMsgReturn {
        // mach_msg() itself returns MACH_MSG_SUCCESS when asked to do nothing.
        let mut mr = MachMsgReturn::SUCCESS;

        if exchange.options.contains(MachMsgOption::SEND_MSG) {
            mr = self.run_phase(message, Phase::Send, exchange);
            if !mr.is_success() {
                return mr;
            }
        }

        if exchange.options.contains(MachMsgOption::RCV_MSG) {
            mr = self.run_phase(message, Phase::Receive, exchange);
        }

        mr
    }

    unsafe fn run_phase(
        &self,
        message: *mut mach_msg_header_t,
        phase: Phase,
        exchange: &Exchange,
    ) -> MachMsgReturn {
        let options = phase.options(exchange.options);
        let (receive_size, receive_port) = match phase {
            Phase::Send => (0, MACH_PORT_NULL),
            Phase::Receive => (exchange.receive_size, exchange.receive_port),
        };
        let caller_sees_interrupts = exchange.options.contains(phase.interrupt_bit());

        loop {
            let mr = self.attempt(message, options, receive_size, receive_port, exchange);
            if mr != phase.interrupted() || caller_sees_interrupts {
                return mr;
            }
            log::debug!("{} phase interrupted, retrying against deadline", phase.name());
        }
    }

    /// One kernel call, or the timeout it would have produced.
    unsafe fn attempt(
        &self,
        message: *mut mach_msg_header_t,
        options: MachMsgOption,
        receive_size: mach_msg_size_t,
        receive_port: mach_port_name_t,
        exchange: &Exchange,
    ) -> MachMsgReturn {
        let remaining = resolve(exchange.deadline, &self.clock);

        if !remaining.running && !exchange.run_even_if_expired {
            let synthesized = if options.contains(MachMsgOption::SEND_MSG) {
                MachMsgReturn::SEND_TIMED_OUT
            } else if options.contains(MachMsgOption::RCV_MSG) {
                MachMsgReturn::RCV_TIMED_OUT
            } else {
                MachMsgReturn::SUCCESS
            };
            log::debug!(
                "deadline {:#x} expired before mach_msg, returning {}",
                exchange.deadline.as_raw(),
                synthesized
            );
            return synthesized;
        }

        let options = options
            .difference(MachMsgOption::TIMEOUTS)
            .union(remaining.options);

        // The send size always comes from the message itself.
        let send_size = if options.contains(MachMsgOption::SEND_MSG) {
            (*message).msgh_size
        } else {
            0
        };

        log::trace!(
            "mach_msg options={:#x} send_size={} receive_size={} timeout={}ms",
            options.bits(),
            send_size,
            receive_size,
            remaining.timeout_ms
        );

        self.trap.mach_msg(
            message,
            options,
            send_size,
            receive_size,
            receive_port,
            remaining.timeout_ms,
            exchange.notify_port,
        )
    }
}
