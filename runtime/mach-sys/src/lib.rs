//! Raw Mach message ABI
//!
//! C-layout definitions of the pieces of `<mach/message.h>`,
//! `<mach/ndr.h>` and `<mach/mig_errors.h>` that the messaging layer
//! touches. Names follow the C headers so call sites read like the
//! kernel documentation.
//!
//! ## Layout
//!
//! Every struct here is `#[repr(C)]` and is checked against the kernel's
//! sizes at compile time. Values must match the peer bit-for-bit.
//!
//! ## Trap
//!
//! `mach_msg()` itself is only declared on Apple targets, where it is
//! provided by libSystem. Everywhere else the types and constants are still
//! available so higher layers can be built and tested against a mock kernel.

#![no_std]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(non_upper_case_globals)]

use static_assertions::{assert_eq_align, assert_eq_size, const_assert_eq};

// Basic Mach types
pub type natural_t = u32;
pub type integer_t = i32;
pub type kern_return_t = i32;
pub type mach_port_name_t = natural_t;
pub type mach_port_t = mach_port_name_t;
pub type mach_msg_bits_t = u32;
pub type mach_msg_size_t = natural_t;
pub type mach_msg_id_t = integer_t;
pub type mach_msg_option_t = integer_t;
pub type mach_msg_timeout_t = natural_t;
pub type mach_msg_return_t = kern_return_t;
pub type mach_msg_trailer_type_t = u32;
pub type mach_msg_trailer_size_t = u32;
pub type mach_port_type_t = natural_t;

pub const KERN_SUCCESS: kern_return_t = 0;

pub const MACH_PORT_NULL: mach_port_name_t = 0;
pub const MACH_PORT_DEAD: mach_port_name_t = !0;

pub const MACH_MSG_TIMEOUT_NONE: mach_msg_timeout_t = 0;

// ========== mach_msg() options ==========

pub const MACH_MSG_OPTION_NONE: mach_msg_option_t = 0x0000_0000;

pub const MACH_SEND_MSG: mach_msg_option_t = 0x0000_0001;
pub const MACH_RCV_MSG: mach_msg_option_t = 0x0000_0002;

pub const MACH_RCV_LARGE: mach_msg_option_t = 0x0000_0004;
pub const MACH_RCV_LARGE_IDENTITY: mach_msg_option_t = 0x0000_0008;

pub const MACH_SEND_TIMEOUT: mach_msg_option_t = 0x0000_0010;
pub const MACH_SEND_OVERRIDE: mach_msg_option_t = 0x0000_0020;
pub const MACH_SEND_INTERRUPT: mach_msg_option_t = 0x0000_0040;
pub const MACH_SEND_NOTIFY: mach_msg_option_t = 0x0000_0080;
pub const MACH_SEND_ALWAYS: mach_msg_option_t = 0x0001_0000;
pub const MACH_SEND_TRAILER: mach_msg_option_t = 0x0002_0000;
pub const MACH_SEND_NOIMPORTANCE: mach_msg_option_t = 0x0004_0000;

pub const MACH_RCV_TIMEOUT: mach_msg_option_t = 0x0000_0100;
pub const MACH_RCV_NOTIFY: mach_msg_option_t = 0x0000_0200;
pub const MACH_RCV_INTERRUPT: mach_msg_option_t = 0x0000_0400;
pub const MACH_RCV_VOUCHER: mach_msg_option_t = 0x0000_0800;
pub const MACH_RCV_OVERWRITE: mach_msg_option_t = 0x0000_1000;

pub const MACH_MSG_TRAILER_FORMAT_0: mach_msg_trailer_type_t = 0;

pub const MACH_RCV_TRAILER_NULL: u32 = 0;
pub const MACH_RCV_TRAILER_SEQNO: u32 = 1;
pub const MACH_RCV_TRAILER_SENDER: u32 = 2;
pub const MACH_RCV_TRAILER_AUDIT: u32 = 3;
pub const MACH_RCV_TRAILER_CTX: u32 = 4;
pub const MACH_RCV_TRAILER_AV: u32 = 7;
pub const MACH_RCV_TRAILER_LABELS: u32 = 8;

/// Requests a trailer format on receive.
#[inline]
pub const fn MACH_RCV_TRAILER_TYPE(x: u32) -> mach_msg_option_t {
    ((x & 0xf) << 28) as mach_msg_option_t
}

/// Requests trailer elements on receive.
#[inline]
pub const fn MACH_RCV_TRAILER_ELEMENTS(x: u32) -> mach_msg_option_t {
    ((x & 0xf) << 24) as mach_msg_option_t
}

// ========== mach_msg() return codes ==========

pub const MACH_MSG_SUCCESS: mach_msg_return_t = 0x0000_0000;

pub const MACH_SEND_IN_PROGRESS: mach_msg_return_t = 0x1000_0001;
pub const MACH_SEND_INVALID_DATA: mach_msg_return_t = 0x1000_0002;
pub const MACH_SEND_INVALID_DEST: mach_msg_return_t = 0x1000_0003;
pub const MACH_SEND_TIMED_OUT: mach_msg_return_t = 0x1000_0004;
pub const MACH_SEND_INVALID_VOUCHER: mach_msg_return_t = 0x1000_0005;
pub const MACH_SEND_INTERRUPTED: mach_msg_return_t = 0x1000_0007;
pub const MACH_SEND_MSG_TOO_SMALL: mach_msg_return_t = 0x1000_0008;
pub const MACH_SEND_INVALID_REPLY: mach_msg_return_t = 0x1000_0009;
pub const MACH_SEND_INVALID_RIGHT: mach_msg_return_t = 0x1000_000a;
pub const MACH_SEND_INVALID_NOTIFY: mach_msg_return_t = 0x1000_000b;
pub const MACH_SEND_INVALID_MEMORY: mach_msg_return_t = 0x1000_000c;
pub const MACH_SEND_NO_BUFFER: mach_msg_return_t = 0x1000_000d;
pub const MACH_SEND_TOO_LARGE: mach_msg_return_t = 0x1000_000e;
pub const MACH_SEND_INVALID_TYPE: mach_msg_return_t = 0x1000_000f;
pub const MACH_SEND_INVALID_HEADER: mach_msg_return_t = 0x1000_0010;
pub const MACH_SEND_INVALID_TRAILER: mach_msg_return_t = 0x1000_0011;
pub const MACH_SEND_INVALID_RT_OOL_SIZE: mach_msg_return_t = 0x1000_0015;

pub const MACH_RCV_IN_PROGRESS: mach_msg_return_t = 0x1000_4001;
pub const MACH_RCV_INVALID_NAME: mach_msg_return_t = 0x1000_4002;
pub const MACH_RCV_TIMED_OUT: mach_msg_return_t = 0x1000_4003;
pub const MACH_RCV_TOO_LARGE: mach_msg_return_t = 0x1000_4004;
pub const MACH_RCV_INTERRUPTED: mach_msg_return_t = 0x1000_4005;
pub const MACH_RCV_PORT_CHANGED: mach_msg_return_t = 0x1000_4006;
pub const MACH_RCV_INVALID_NOTIFY: mach_msg_return_t = 0x1000_4007;
pub const MACH_RCV_INVALID_DATA: mach_msg_return_t = 0x1000_4008;
pub const MACH_RCV_PORT_DIED: mach_msg_return_t = 0x1000_4009;
pub const MACH_RCV_IN_SET: mach_msg_return_t = 0x1000_400a;
pub const MACH_RCV_HEADER_ERROR: mach_msg_return_t = 0x1000_400b;
pub const MACH_RCV_BODY_ERROR: mach_msg_return_t = 0x1000_400c;
pub const MACH_RCV_INVALID_TYPE: mach_msg_return_t = 0x1000_400d;
pub const MACH_RCV_SCATTER_SMALL: mach_msg_return_t = 0x1000_400e;
pub const MACH_RCV_INVALID_TRAILER: mach_msg_return_t = 0x1000_400f;
pub const MACH_RCV_IN_PROGRESS_TIMED: mach_msg_return_t = 0x1000_4011;

// ========== Header bits ==========

pub const MACH_MSGH_BITS_ZERO: mach_msg_bits_t = 0x0000_0000;
pub const MACH_MSGH_BITS_REMOTE_MASK: mach_msg_bits_t = 0x0000_001f;
pub const MACH_MSGH_BITS_LOCAL_MASK: mach_msg_bits_t = 0x0000_1f00;
pub const MACH_MSGH_BITS_VOUCHER_MASK: mach_msg_bits_t = 0x001f_0000;
pub const MACH_MSGH_BITS_COMPLEX: mach_msg_bits_t = 0x8000_0000;

pub const MACH_MSG_TYPE_MOVE_RECEIVE: mach_msg_bits_t = 16;
pub const MACH_MSG_TYPE_MOVE_SEND: mach_msg_bits_t = 17;
pub const MACH_MSG_TYPE_MOVE_SEND_ONCE: mach_msg_bits_t = 18;
pub const MACH_MSG_TYPE_COPY_SEND: mach_msg_bits_t = 19;
pub const MACH_MSG_TYPE_MAKE_SEND: mach_msg_bits_t = 20;
pub const MACH_MSG_TYPE_MAKE_SEND_ONCE: mach_msg_bits_t = 21;

#[inline]
pub const fn MACH_MSGH_BITS(remote: mach_msg_bits_t, local: mach_msg_bits_t) -> mach_msg_bits_t {
    remote | (local << 8)
}

#[inline]
pub const fn MACH_MSGH_BITS_REMOTE(bits: mach_msg_bits_t) -> mach_msg_bits_t {
    bits & MACH_MSGH_BITS_REMOTE_MASK
}

#[inline]
pub const fn MACH_MSGH_BITS_LOCAL(bits: mach_msg_bits_t) -> mach_msg_bits_t {
    (bits & MACH_MSGH_BITS_LOCAL_MASK) >> 8
}

/// Rounds a message size up to the kernel's message alignment unit.
#[inline]
pub const fn round_msg(size: mach_msg_size_t) -> usize {
    const ALIGN: usize = core::mem::size_of::<natural_t>();
    (size as usize + ALIGN - 1) & !(ALIGN - 1)
}

// ========== Structures ==========

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct mach_msg_header_t {
    pub msgh_bits: mach_msg_bits_t,
    pub msgh_size: mach_msg_size_t,
    pub msgh_remote_port: mach_port_t,
    pub msgh_local_port: mach_port_t,
    /// Called `msgh_reserved` by older headers.
    pub msgh_voucher_port: mach_port_name_t,
    pub msgh_id: mach_msg_id_t,
}

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct mach_msg_trailer_t {
    pub msgh_trailer_type: mach_msg_trailer_type_t,
    pub msgh_trailer_size: mach_msg_trailer_size_t,
}

/// Network data representation record carried by MIG messages.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NDR_record_t {
    pub mig_vers: u8,
    pub if_vers: u8,
    pub reserved1: u8,
    pub mig_encoding: u8,
    pub int_rep: u8,
    pub char_rep: u8,
    pub float_rep: u8,
    pub reserved2: u8,
}

pub const NDR_PROTOCOL_2_0: u8 = 0;
pub const NDR_INT_BIG_ENDIAN: u8 = 0;
pub const NDR_INT_LITTLE_ENDIAN: u8 = 1;
pub const NDR_FLOAT_IEEE: u8 = 0;
pub const NDR_CHAR_ASCII: u8 = 0;

/// The host's NDR record, identical to libsystem's exported `NDR_record`.
pub const NDR_record: NDR_record_t = NDR_record_t {
    mig_vers: 0,
    if_vers: 0,
    reserved1: 0,
    mig_encoding: NDR_PROTOCOL_2_0,
    #[cfg(target_endian = "little")]
    int_rep: NDR_INT_LITTLE_ENDIAN,
    #[cfg(target_endian = "big")]
    int_rep: NDR_INT_BIG_ENDIAN,
    char_rep: NDR_CHAR_ASCII,
    float_rep: NDR_FLOAT_IEEE,
    reserved2: 0,
};

#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct mig_reply_error_t {
    pub Head: mach_msg_header_t,
    pub NDR: NDR_record_t,
    pub RetCode: kern_return_t,
}

// MIG server errors
pub const MIG_TYPE_ERROR: kern_return_t = -300;
pub const MIG_REPLY_MISMATCH: kern_return_t = -301;
pub const MIG_REMOTE_ERROR: kern_return_t = -302;
pub const MIG_BAD_ID: kern_return_t = -303;
pub const MIG_BAD_ARGUMENTS: kern_return_t = -304;
pub const MIG_NO_REPLY: kern_return_t = -305;

/// Offset MIG adds to a request's `msgh_id` to form the reply's.
pub const MIG_REPLY_ID_OFFSET: mach_msg_id_t = 100;

assert_eq_size!(mach_msg_header_t, [u8; 24]);
assert_eq_size!(mach_msg_trailer_t, [u8; 8]);
assert_eq_size!(NDR_record_t, [u8; 8]);
assert_eq_size!(mig_reply_error_t, [u8; 36]);
assert_eq_align!(mig_reply_error_t, u32);
const_assert_eq!(core::mem::offset_of!(mig_reply_error_t, RetCode), 32);

// ========== Trap ==========

#[cfg(target_vendor = "apple")]
extern "C" {
    pub fn mach_msg(
        msg: *mut mach_msg_header_t,
        option: mach_msg_option_t,
        send_size: mach_msg_size_t,
        rcv_size: mach_msg_size_t,
        rcv_name: mach_port_name_t,
        timeout: mach_msg_timeout_t,
        notify: mach_port_name_t,
    ) -> mach_msg_return_t;
}
