//! Async `NETLINK_KOBJECT_UEVENT` socket.

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use bytes::BytesMut;
use netlink_sys::{Socket, SocketAddr, protocols};
use tokio::io::Interest;
use tokio::io::unix::AsyncFd;

use crate::error::{Error, Result};

/// Receive buffer size; ACK frames are tiny, but the kernel may echo the
/// whole request back on error.
const RECV_BUF_SIZE: usize = 32768;

/// Async uevent netlink socket.
///
/// The socket belongs to the network namespace the calling thread was in
/// when it was opened. It is closed on drop.
pub struct NetlinkSocket {
    /// The underlying async file descriptor.
    fd: AsyncFd<Socket>,
}

impl NetlinkSocket {
    /// Open and bind a uevent socket with a kernel-assigned port id.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open() -> Result<Self> {
        let mut socket =
            Socket::new(protocols::NETLINK_KOBJECT_UEVENT).map_err(Error::SocketOpen)?;
        socket.set_non_blocking(true).map_err(Error::SocketOpen)?;

        // Port 0: the kernel assigns the local port ID
        socket
            .bind(&SocketAddr::new(0, 0))
            .map_err(Error::SocketOpen)?;

        // Enable extended ACK for better error messages
        socket.set_ext_ack(true).ok(); // Ignore if not supported

        let fd = AsyncFd::new(socket).map_err(Error::SocketOpen)?;

        Ok(Self { fd })
    }

    /// Send one datagram to the kernel (port 0, no multicast groups).
    pub async fn send(&self, msg: &[u8]) -> Result<()> {
        let kernel = SocketAddr::new(0, 0);

        loop {
            let mut guard = self.fd.ready(Interest::WRITABLE).await.map_err(Error::Send)?;

            match guard.try_io(|inner| inner.get_ref().send_to(msg, &kernel, 0)) {
                Ok(result) => {
                    let sent = result.map_err(Error::Send)?;
                    if sent != msg.len() {
                        return Err(Error::Send(io::Error::new(
                            io::ErrorKind::WriteZero,
                            format!("short write: {} of {} bytes", sent, msg.len()),
                        )));
                    }
                    return Ok(());
                }
                Err(_would_block) => continue,
            }
        }
    }

    /// Receive a message, allocating a buffer.
    pub async fn recv_msg(&self) -> Result<Vec<u8>> {
        // Allocate buffer with capacity - don't resize, let recv fill it
        let mut buf = BytesMut::with_capacity(RECV_BUF_SIZE);

        loop {
            let mut guard = self.fd.ready(Interest::READABLE).await.map_err(Error::Send)?;

            match guard.try_io(|inner| inner.get_ref().recv(&mut buf, 0)) {
                Ok(result) => {
                    result.map_err(Error::Send)?;
                    // buf has been advanced by recv, so buf[..] contains the data
                    return Ok(buf.to_vec());
                }
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsRawFd for NetlinkSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.get_ref().as_raw_fd()
    }
}

impl std::fmt::Debug for NetlinkSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkSocket")
            .field("fd", &self.as_raw_fd())
            .finish()
    }
}
