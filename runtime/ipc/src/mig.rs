//! MIG reply and trailer helpers
//!
//! Small pieces of the MIG server convention used by dispatch code: building
//! a reply header from a request, stamping its return code, and finding the
//! trailer the kernel appends to received messages.

use core::mem::size_of;

use mach_sys::{
    kern_return_t, mach_msg_header_t, mach_msg_size_t, mach_msg_trailer_t, mig_reply_error_t,
    round_msg, MACH_MSGH_BITS, MACH_MSGH_BITS_REMOTE, MACH_PORT_NULL, MIG_REPLY_ID_OFFSET,
    NDR_record,
};

/// Size of a bare MIG error reply
pub const MIG_REPLY_SIZE: mach_msg_size_t = size_of::<mig_reply_error_t>() as mach_msg_size_t;

/// Fills in `reply`'s header and NDR record from `request`.
///
/// The reply goes back through the request's remote port with the same
/// disposition, carries no local port, and uses the request's id plus
/// [`MIG_REPLY_ID_OFFSET`]. The reserved (voucher) field is cleared, which
/// MIG-generated dispatch routines neglect to do. `RetCode` is left alone.
pub fn prepare_mig_reply_from_request(request: &mach_msg_header_t, reply: &mut mig_reply_error_t) {
    reply.Head.msgh_bits = MACH_MSGH_BITS(MACH_MSGH_BITS_REMOTE(request.msgh_bits), 0);
    reply.Head.msgh_remote_port = request.msgh_remote_port;
    reply.Head.msgh_size = MIG_REPLY_SIZE;
    reply.Head.msgh_local_port = MACH_PORT_NULL;
    reply.Head.msgh_id = request.msgh_id.wrapping_add(MIG_REPLY_ID_OFFSET);
    reply.NDR = NDR_record;
    reply.Head.msgh_voucher_port = 0;
}

pub fn set_mig_reply_error(reply: &mut mig_reply_error_t, error: kern_return_t) {
    reply.RetCode = error;
}

/// Byte offset of the trailer from the start of a received message
#[inline]
pub fn trailer_offset(header: &mach_msg_header_t) -> usize {
    round_msg(header.msgh_size)
}

/// Locates the trailer of a received message.
///
/// # Safety
/// `header` must point to a message received by the kernel into a buffer
/// that extends at least `round_msg(msgh_size)` bytes plus a trailer past
/// `header`. Nothing here checks that `msgh_size` matches the buffer.
pub unsafe fn mach_message_trailer_from_header(
    header: *const mach_msg_header_t,
) -> *const mach_msg_trailer_t {
    header
        .cast::<u8>()
        .add(round_msg((*header).msgh_size))
        .cast::<mach_msg_trailer_t>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mach_sys::{
        MACH_MSGH_BITS_COMPLEX, MACH_MSG_TYPE_MAKE_SEND, MACH_MSG_TYPE_MOVE_SEND_ONCE,
        MACH_MSG_TRAILER_FORMAT_0,
    };

    #[test]
    fn test_prepare_reply() {
        let request = mach_msg_header_t {
            msgh_bits: MACH_MSGH_BITS(MACH_MSG_TYPE_MOVE_SEND_ONCE, MACH_MSG_TYPE_MAKE_SEND)
                | MACH_MSGH_BITS_COMPLEX,
            msgh_size: 128,
            msgh_remote_port: 7,
            msgh_local_port: 9,
            msgh_voucher_port: 11,
            msgh_id: 200,
        };
        let before = request;

        let mut reply = mig_reply_error_t {
            Head: mach_msg_header_t {
                msgh_bits: 0xffff_ffff,
                msgh_size: 1,
                msgh_remote_port: 2,
                msgh_local_port: 3,
                msgh_voucher_port: 4,
                msgh_id: 5,
            },
            RetCode: 99,
            ..Default::default()
        };
        prepare_mig_reply_from_request(&request, &mut reply);

        assert_eq!(reply.Head.msgh_bits, MACH_MSG_TYPE_MOVE_SEND_ONCE);
        assert_eq!(reply.Head.msgh_remote_port, 7);
        assert_eq!(reply.Head.msgh_local_port, MACH_PORT_NULL);
        assert_eq!(reply.Head.msgh_id, 300);
        assert_eq!(reply.Head.msgh_size, 36);
        assert_eq!(reply.Head.msgh_voucher_port, 0);
        assert_eq!(reply.NDR, NDR_record);
        assert_eq!(reply.RetCode, 99);
        assert_eq!(request, before);
    }

    #[test]
    fn test_reply_id_wraps() {
        let request = mach_msg_header_t {
            msgh_id: i32::MAX,
            ..Default::default()
        };
        let mut reply = mig_reply_error_t::default();
        prepare_mig_reply_from_request(&request, &mut reply);
        assert_eq!(reply.Head.msgh_id, i32::MIN + 99);
    }

    #[test]
    fn test_set_reply_error() {
        let mut reply = mig_reply_error_t::default();
        set_mig_reply_error(&mut reply, 0x1000_0003);
        assert_eq!(reply.RetCode, 0x1000_0003);
        set_mig_reply_error(&mut reply, 0);
        assert_eq!(reply.RetCode, 0);
    }

    #[repr(C, align(8))]
    struct ReceiveBuffer([u8; 64]);

    #[test]
    fn test_trailer_location() {
        let mut buffer = ReceiveBuffer([0; 64]);
        let base = buffer.0.as_mut_ptr();

        let header = mach_msg_header_t {
            msgh_size: 26,
            ..Default::default()
        };
        let trailer = mach_msg_trailer_t {
            msgh_trailer_type: MACH_MSG_TRAILER_FORMAT_0,
            msgh_trailer_size: 8,
        };

        unsafe {
            base.cast::<mach_msg_header_t>().write(header);
            base.add(28).cast::<mach_msg_trailer_t>().write(trailer);

            let found = mach_message_trailer_from_header(base.cast::<mach_msg_header_t>());
            assert_eq!(found.cast::<u8>(), base.add(28).cast_const());
            assert_eq!(*found, trailer);
        }

        assert_eq!(trailer_offset(&header), 28);
    }
}
