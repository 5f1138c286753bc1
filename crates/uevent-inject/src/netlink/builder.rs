//! Fixed-capacity builder for netlink messages.
//!
//! Unlike a growable buffer, the builder reserves all of its memory up front
//! and refuses writes past that capacity. The wire framing (`nlmsg_len`) can
//! therefore never change behind the caller's back.

use zerocopy::FromBytes;

use super::message::{NLMSG_ALIGNTO, NLMSG_HDRLEN, NlMsgHdr};
use crate::error::{Error, Result};

/// Builder for a single netlink message of bounded size.
///
/// The whole buffer is zero-filled on allocation, and bytes past the current
/// end are never handed out twice, so alignment padding is always zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBuilder {
    buf: Vec<u8>,
    len: usize,
}

impl MessageBuilder {
    /// Allocate a message able to hold `payload_capacity` payload bytes.
    ///
    /// The buffer is sized to the header plus the payload capacity rounded up
    /// to netlink alignment.
    pub fn allocate(payload_capacity: usize) -> Result<Self> {
        let capacity = payload_capacity
            .checked_add(NLMSG_ALIGNTO - 1)
            .map(|n| n & !(NLMSG_ALIGNTO - 1))
            .and_then(|n| n.checked_add(NLMSG_HDRLEN))
            .filter(|&n| u32::try_from(n).is_ok())
            .ok_or(Error::Allocation {
                requested: payload_capacity.saturating_add(NLMSG_HDRLEN),
            })?;

        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity)
            .map_err(|_| Error::Allocation {
                requested: capacity,
            })?;
        buf.resize(capacity, 0);

        let mut builder = Self {
            buf,
            len: NLMSG_HDRLEN,
        };
        builder.write_len();
        Ok(builder)
    }

    /// Total capacity in bytes, header included.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Get the current message length (`nlmsg_len`).
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the message is empty (header only).
    pub fn is_empty(&self) -> bool {
        self.len == NLMSG_HDRLEN
    }

    /// Bytes still available for payload.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// Reserve `len` bytes directly after the current end of the message.
    ///
    /// The declared message length grows by exactly `len`. If the request does
    /// not fit, the message is left untouched.
    pub fn reserve(&mut self, len: usize) -> Result<&mut [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(Error::CapacityExceeded {
                requested: len,
                available,
            });
        }

        let start = self.len;
        self.len += len;
        self.write_len();
        Ok(&mut self.buf[start..start + len])
    }

    /// Append raw bytes verbatim.
    pub fn append_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?.copy_from_slice(data);
        Ok(())
    }

    /// Fill in the header fields.
    ///
    /// `port_id` is the destination-side origin port; messages for the kernel
    /// always carry 0.
    pub fn set_header(&mut self, msg_type: u16, flags: u16, port_id: u32) {
        self.buf[4..6].copy_from_slice(&msg_type.to_ne_bytes());
        self.buf[6..8].copy_from_slice(&flags.to_ne_bytes());
        self.buf[12..16].copy_from_slice(&port_id.to_ne_bytes());
    }

    /// Set the sequence number.
    pub fn set_seq(&mut self, seq: u32) {
        self.buf[8..12].copy_from_slice(&seq.to_ne_bytes());
    }

    /// Decode the current header.
    pub fn header(&self) -> NlMsgHdr {
        // The buffer always holds at least a full header.
        NlMsgHdr::read_from_prefix(&self.buf)
            .map(|(hdr, _)| hdr)
            .unwrap_or_default()
    }

    /// The message bytes as they go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The payload written so far.
    pub fn payload(&self) -> &[u8] {
        &self.buf[NLMSG_HDRLEN..self.len]
    }

    fn write_len(&mut self) {
        // Capacity is checked against u32 at allocation.
        let len = self.len as u32;
        self.buf[0..4].copy_from_slice(&len.to_ne_bytes());
    }
}
