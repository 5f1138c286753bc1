//! Test doubles for the injector.
//!
//! Enabled under `cfg(test)` and by the `testing` feature.
//!
//! # Example
//!
//! ```ignore
//! use uevent_inject::testing::{Call, FakePlatform};
//!
//! let mut injector = Injector::new(FakePlatform::with_euid(1000), InjectOptions::new());
//! assert!(injector.run(&request).await.is_err());
//! assert_eq!(injector.platform().calls(), &[Call::EffectiveUid]);
//! ```

use std::collections::VecDeque;
use std::io;
use std::os::unix::io::RawFd;

use crate::error::{Error, Result};
use crate::netlink::{NLMSG_HDRLEN, NlMsgHdr, NlMsgType};
use crate::platform::Platform;

/// A platform call observed by [`FakePlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    EffectiveUid,
    ResolveNamespace { pid: i32, pidfd: RawFd },
    EnterNamespace { pid: i32 },
    OpenSocket,
    Send(Vec<u8>),
    Recv,
}

/// Namespace handle handed out by [`FakePlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeNamespace {
    pub pid: i32,
}

/// Socket handed out by [`FakePlatform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeSocket;

/// Records calls and returns programmed results.
///
/// Failures are programmed as errno values. `recv` replays queued datagrams
/// and never completes once the queue is empty, like a kernel that does not
/// answer.
#[derive(Debug, Default)]
pub struct FakePlatform {
    euid: u32,
    resolve_errno: Option<i32>,
    enter_errno: Option<i32>,
    open_errno: Option<i32>,
    send_errno: Option<i32>,
    responses: VecDeque<Vec<u8>>,
    calls: Vec<Call>,
}

impl FakePlatform {
    /// A platform running as root where every call succeeds.
    pub fn root() -> Self {
        Self::default()
    }

    /// A platform running with the given effective uid.
    pub fn with_euid(euid: u32) -> Self {
        Self {
            euid,
            ..Self::default()
        }
    }

    /// Make namespace resolution fail with `errno`.
    pub fn fail_resolve(mut self, errno: i32) -> Self {
        self.resolve_errno = Some(errno);
        self
    }

    /// Make the namespace switch fail with `errno`.
    pub fn fail_enter(mut self, errno: i32) -> Self {
        self.enter_errno = Some(errno);
        self
    }

    /// Make socket creation fail with `errno`.
    pub fn fail_open(mut self, errno: i32) -> Self {
        self.open_errno = Some(errno);
        self
    }

    /// Make every send fail with `errno`.
    pub fn fail_send(mut self, errno: i32) -> Self {
        self.send_errno = Some(errno);
        self
    }

    /// Queue a datagram for `recv`.
    pub fn respond(mut self, data: Vec<u8>) -> Self {
        self.responses.push_back(data);
        self
    }

    /// All calls in the order they were made.
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Messages passed to `send`.
    pub fn sent(&self) -> Vec<&[u8]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Send(msg) => Some(msg.as_slice()),
                _ => None,
            })
            .collect()
    }

    /// Whether any namespace or socket call happened.
    pub fn touched_system(&self) -> bool {
        self.calls
            .iter()
            .any(|call| !matches!(call, Call::EffectiveUid))
    }
}

impl Platform for FakePlatform {
    type Namespace = FakeNamespace;
    type Socket = FakeSocket;

    fn effective_uid(&mut self) -> u32 {
        self.calls.push(Call::EffectiveUid);
        self.euid
    }

    fn resolve_namespace(&mut self, pid: i32, pidfd: RawFd) -> Result<FakeNamespace> {
        self.calls.push(Call::ResolveNamespace { pid, pidfd });
        if let Some(errno) = self.resolve_errno {
            return Err(Error::NamespaceResolution {
                pid,
                source: io::Error::from_raw_os_error(errno),
            });
        }
        Ok(FakeNamespace { pid })
    }

    fn enter_namespace(&mut self, ns: FakeNamespace) -> Result<()> {
        self.calls.push(Call::EnterNamespace { pid: ns.pid });
        if let Some(errno) = self.enter_errno {
            return Err(Error::NamespaceSwitch {
                pid: ns.pid,
                source: io::Error::from_raw_os_error(errno),
            });
        }
        Ok(())
    }

    fn open_socket(&mut self) -> Result<FakeSocket> {
        self.calls.push(Call::OpenSocket);
        if let Some(errno) = self.open_errno {
            return Err(Error::SocketOpen(io::Error::from_raw_os_error(errno)));
        }
        Ok(FakeSocket)
    }

    async fn send(&mut self, _socket: &FakeSocket, msg: &[u8]) -> Result<()> {
        self.calls.push(Call::Send(msg.to_vec()));
        if let Some(errno) = self.send_errno {
            return Err(Error::Send(io::Error::from_raw_os_error(errno)));
        }
        Ok(())
    }

    async fn recv(&mut self, _socket: &FakeSocket) -> Result<Vec<u8>> {
        self.calls.push(Call::Recv);
        match self.responses.pop_front() {
            Some(data) => Ok(data),
            None => std::future::pending().await,
        }
    }
}

/// Build the `NLMSG_ERROR` frame the kernel sends in answer to `seq`.
///
/// `error` is 0 for an ACK or a negative errno.
pub fn ack_frame(seq: u32, error: i32) -> Vec<u8> {
    let mut echoed = NlMsgHdr::new(NlMsgType::UEVENT_SEND, 0);
    echoed.nlmsg_seq = seq;

    let mut header = NlMsgHdr::new(NlMsgType::ERROR, 0);
    header.nlmsg_len = (NLMSG_HDRLEN + 4 + NLMSG_HDRLEN) as u32;
    header.nlmsg_seq = seq;

    let mut frame = Vec::with_capacity(header.nlmsg_len as usize);
    frame.extend_from_slice(header.as_bytes());
    frame.extend_from_slice(&error.to_ne_bytes());
    frame.extend_from_slice(echoed.as_bytes());
    frame
}
