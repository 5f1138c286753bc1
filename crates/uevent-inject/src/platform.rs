//! System-call seam between the injector and the kernel.
//!
//! [`LinuxPlatform`] issues the real syscalls. Tests use
//! [`FakePlatform`](crate::testing::FakePlatform), which records every call
//! and replays programmed results, so ordering and failure paths can be
//! checked without root or real namespaces.

use std::os::unix::io::RawFd;

use crate::error::Result;
use crate::namespace::{self, NamespaceFd};
use crate::netlink::NetlinkSocket;
use crate::privilege;

/// Privileged operations the injector depends on.
#[allow(async_fn_in_trait)]
pub trait Platform {
    /// Handle to a resolved network namespace.
    type Namespace;
    /// Open uevent socket.
    type Socket;

    /// Effective uid of the current process.
    fn effective_uid(&mut self) -> u32;

    /// Resolve the network namespace of `pid`, cross-checked against `pidfd`.
    fn resolve_namespace(&mut self, pid: i32, pidfd: RawFd) -> Result<Self::Namespace>;

    /// Move the current thread into `ns`. The handle is released afterwards.
    fn enter_namespace(&mut self, ns: Self::Namespace) -> Result<()>;

    /// Open a uevent socket in the current network namespace.
    fn open_socket(&mut self) -> Result<Self::Socket>;

    /// Send one datagram to the kernel.
    async fn send(&mut self, socket: &Self::Socket, msg: &[u8]) -> Result<()>;

    /// Receive one datagram.
    async fn recv(&mut self, socket: &Self::Socket) -> Result<Vec<u8>>;
}

/// The real Linux implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxPlatform;

impl Platform for LinuxPlatform {
    type Namespace = NamespaceFd;
    type Socket = NetlinkSocket;

    fn effective_uid(&mut self) -> u32 {
        privilege::effective_uid()
    }

    fn resolve_namespace(&mut self, pid: i32, pidfd: RawFd) -> Result<NamespaceFd> {
        namespace::resolve(pid, pidfd)
    }

    fn enter_namespace(&mut self, ns: NamespaceFd) -> Result<()> {
        namespace::enter(ns)
    }

    fn open_socket(&mut self) -> Result<NetlinkSocket> {
        NetlinkSocket::open()
    }

    async fn send(&mut self, socket: &NetlinkSocket, msg: &[u8]) -> Result<()> {
        socket.send(msg).await
    }

    async fn recv(&mut self, socket: &NetlinkSocket) -> Result<Vec<u8>> {
        socket.recv_msg().await
    }
}
