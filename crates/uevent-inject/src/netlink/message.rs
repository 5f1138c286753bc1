//! Netlink message header and parsing.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};

/// Netlink message header alignment.
pub const NLMSG_ALIGNTO: usize = 4;

/// Align a length to NLMSG_ALIGNTO boundary.
#[inline]
pub const fn nlmsg_align(len: usize) -> usize {
    (len + NLMSG_ALIGNTO - 1) & !(NLMSG_ALIGNTO - 1)
}

/// Size of the netlink message header.
pub const NLMSG_HDRLEN: usize = nlmsg_align(std::mem::size_of::<NlMsgHdr>());

/// Netlink message header (mirrors struct nlmsghdr).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct NlMsgHdr {
    /// Length of message including header.
    pub nlmsg_len: u32,
    /// Message type.
    pub nlmsg_type: u16,
    /// Additional flags.
    pub nlmsg_flags: u16,
    /// Sequence number.
    pub nlmsg_seq: u32,
    /// Sending process port ID.
    pub nlmsg_pid: u32,
}

impl NlMsgHdr {
    /// Create a new message header.
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            nlmsg_len: NLMSG_HDRLEN as u32,
            nlmsg_type: msg_type,
            nlmsg_flags: flags,
            nlmsg_seq: 0,
            nlmsg_pid: 0,
        }
    }

    /// Check if this is an error message (or ACK).
    pub fn is_error(&self) -> bool {
        self.nlmsg_type == NlMsgType::ERROR
    }

    /// Check if the sender asked for an acknowledgement.
    pub fn wants_ack(&self) -> bool {
        self.nlmsg_flags & NLM_F_ACK != 0
    }

    /// Convert header to bytes.
    pub fn as_bytes(&self) -> &[u8] {
        <Self as IntoBytes>::as_bytes(self)
    }

    /// Parse header from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }
}

/// Netlink message types used on the uevent socket.
pub struct NlMsgType;

impl NlMsgType {
    /// Error message or ACK.
    pub const ERROR: u16 = 2;
    /// End of multipart message.
    pub const DONE: u16 = 3;

    /// Inject a uevent into the receiving namespace.
    ///
    /// Any type at or above `NLMSG_MIN_TYPE` (16) is handed to the uevent
    /// receive path; 16 is the conventional value.
    pub const UEVENT_SEND: u16 = 16;
}

/// The message is a request; the kernel only processes requests.
pub const NLM_F_REQUEST: u16 = 0x01;
/// Ask the kernel for an `NLMSG_ERROR` frame carrying the outcome.
pub const NLM_F_ACK: u16 = 0x04;

/// Iterator over netlink messages in a buffer.
pub struct MessageIter<'a> {
    data: &'a [u8],
}

impl<'a> MessageIter<'a> {
    /// Create a new message iterator.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl<'a> Iterator for MessageIter<'a> {
    type Item = Result<(&'a NlMsgHdr, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.data.len() < NLMSG_HDRLEN {
            return None;
        }

        let header = match NlMsgHdr::from_bytes(self.data) {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };

        let msg_len = header.nlmsg_len as usize;
        if msg_len < NLMSG_HDRLEN || msg_len > self.data.len() {
            self.data = &[];
            return Some(Err(Error::InvalidMessage(format!(
                "invalid message length: {}",
                msg_len
            ))));
        }

        let payload = &self.data[NLMSG_HDRLEN..msg_len];
        let aligned_len = nlmsg_align(msg_len);

        if aligned_len >= self.data.len() {
            self.data = &[];
        } else {
            self.data = &self.data[aligned_len..];
        }

        Some(Ok((header, payload)))
    }
}

/// Netlink error message payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout)]
pub struct NlMsgError {
    /// Error code (negative errno or 0 for ACK).
    pub error: i32,
    /// Original message header that caused the error.
    pub msg: NlMsgHdr,
}

impl NlMsgError {
    /// Parse error message from payload.
    pub fn from_bytes(data: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(data)
            .map(|(r, _)| r)
            .map_err(|_| Error::Truncated {
                expected: std::mem::size_of::<Self>(),
                actual: data.len(),
            })
    }

    /// Check if this is an ACK (no error).
    pub fn is_ack(&self) -> bool {
        self.error == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(NLMSG_HDRLEN, 16);
        assert_eq!(nlmsg_align(17), 20);
        assert_eq!(nlmsg_align(20), 20);
    }

    #[test]
    fn test_request_flags() {
        let one_way = NlMsgHdr::new(NlMsgType::UEVENT_SEND, NLM_F_REQUEST);
        assert!(!one_way.wants_ack());
        assert!(!one_way.is_error());

        let acked = NlMsgHdr::new(NlMsgType::UEVENT_SEND, NLM_F_REQUEST | NLM_F_ACK);
        assert!(acked.wants_ack());
        assert_eq!(acked.nlmsg_flags, 0x05);
    }

    #[test]
    fn test_iter_walks_aligned_messages() {
        let mut data = Vec::new();
        let mut first = NlMsgHdr::new(NlMsgType::UEVENT_SEND, NLM_F_REQUEST);
        first.nlmsg_len = (NLMSG_HDRLEN + 3) as u32;
        data.extend_from_slice(first.as_bytes());
        data.extend_from_slice(b"ab\0\0");
        let second = NlMsgHdr::new(NlMsgType::DONE, 0);
        data.extend_from_slice(second.as_bytes());

        let msgs: Vec<_> = MessageIter::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].1, b"ab\0");
        assert_eq!(msgs[1].0.nlmsg_type, NlMsgType::DONE);
    }

    #[test]
    fn test_iter_rejects_bad_length() {
        let mut hdr = NlMsgHdr::new(NlMsgType::ERROR, 0);
        hdr.nlmsg_len = 4096;
        let mut iter = MessageIter::new(hdr.as_bytes());
        assert!(matches!(iter.next(), Some(Err(Error::InvalidMessage(_)))));
        assert!(iter.next().is_none());
    }
}
