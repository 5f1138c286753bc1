//! Netlink framing and transport for kernel uevent injection.
//!
//! Only the pieces needed to push a single message into the
//! `NETLINK_KOBJECT_UEVENT` family live here: the `nlmsghdr` layout, a
//! fixed-capacity message builder, the socket, and the send / send-with-ACK
//! exchange.
//!
//! # Example
//!
//! ```ignore
//! use uevent_inject::netlink::{MessageBuilder, NLM_F_REQUEST, NlMsgType};
//!
//! let payload = b"ACTION=add\0SEQNUM=1\0";
//! let mut msg = MessageBuilder::allocate(payload.len())?;
//! msg.set_header(NlMsgType::UEVENT_SEND, NLM_F_REQUEST, 0);
//! msg.append_bytes(payload)?;
//!
//! let socket = NetlinkSocket::open()?;
//! socket.send(msg.as_bytes()).await?;
//! ```

mod builder;
pub mod message;
mod socket;
pub mod transport;

pub use builder::MessageBuilder;
pub use message::{
    MessageIter, NLM_F_ACK, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgError, NlMsgHdr, NlMsgType,
};
pub use socket::NetlinkSocket;
