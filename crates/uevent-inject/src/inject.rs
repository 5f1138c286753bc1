//! The injection state machine.
//!
//! One run walks `Start → PrivilegeChecked → NamespaceEntered → MessageBuilt
//! → Sent → Done` and never goes back. The namespace switch cannot be
//! undone, so every check that can fail cheaply (privilege, argument
//! consistency, namespace resolution) happens before it.
//!
//! # Example
//!
//! ```ignore
//! use uevent_inject::{InjectOptions, InjectRequest, Injector, LinuxPlatform};
//!
//! let request = InjectRequest::new(4242, pidfd, 20, ["ACTION=add", "SEQNUM=1"])?;
//! let mut injector = Injector::new(LinuxPlatform, InjectOptions::new().ack(true));
//! injector.run(&request).await?;
//! ```

use std::os::unix::io::RawFd;
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};
use crate::namespace::NO_PIDFD;
use crate::netlink::{MessageBuilder, NLM_F_ACK, NLM_F_REQUEST, NlMsgType, transport};
use crate::platform::Platform;
use crate::privilege;

/// Sequence number carried by the injected message.
///
/// Each helper process sends exactly one message on a fresh socket.
pub const INJECT_SEQ: u32 = 1;

/// Progress of one injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Start,
    PrivilegeChecked,
    NamespaceEntered,
    MessageBuilt,
    Sent,
    Done,
    Failed,
}

/// Runtime switches for an injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectOptions {
    ack: bool,
    ack_timeout: Option<Duration>,
}

impl InjectOptions {
    /// Fire-and-forget delivery, no acknowledgement.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the kernel to acknowledge the uevent.
    pub fn ack(mut self, ack: bool) -> Self {
        self.ack = ack;
        self
    }

    /// Bound the wait for the acknowledgement.
    ///
    /// Without it the wait is unbounded and relies on the kernel answering.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = Some(timeout);
        self
    }
}

/// A decoded invocation: target plus uevent payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectRequest {
    pid: i32,
    pidfd: RawFd,
    declared_len: usize,
    payload: Vec<u8>,
}

impl InjectRequest {
    /// Assemble a request from the invocation arguments.
    ///
    /// Each token is one `KEY=VALUE` entry; the payload is the tokens, each
    /// NUL-terminated, concatenated in order. This is the kernel's uevent
    /// environment layout. The declared length is compared with the payload
    /// later, by [`validate`](Self::validate).
    pub fn new<I, T>(pid: i32, pidfd: RawFd, declared_len: usize, tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        if pid <= 0 {
            return Err(Error::Argument(format!("invalid pid {}", pid)));
        }
        if pidfd < NO_PIDFD {
            return Err(Error::Argument(format!("invalid pidfd {}", pidfd)));
        }

        let mut payload = Vec::new();
        let mut count = 0usize;
        for token in tokens {
            payload.extend_from_slice(token.as_ref());
            payload.push(0);
            count += 1;
        }
        if count == 0 {
            return Err(Error::Argument("missing uevent payload".into()));
        }

        Ok(Self {
            pid,
            pidfd,
            declared_len,
            payload,
        })
    }

    /// Target process id.
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Process descriptor for the target, or [`NO_PIDFD`].
    pub fn pidfd(&self) -> RawFd {
        self.pidfd
    }

    /// Payload length claimed by the caller.
    pub fn declared_len(&self) -> usize {
        self.declared_len
    }

    /// The raw uevent bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Check that the declared length matches the payload.
    pub fn validate(&self) -> Result<()> {
        if self.declared_len != self.payload.len() {
            return Err(Error::Argument(format!(
                "declared uevent length {} does not match payload length {}",
                self.declared_len,
                self.payload.len()
            )));
        }
        Ok(())
    }
}

/// Frame `payload` as a uevent-send request.
///
/// The buffer is sized from `declared_len`; a payload that does not fit is
/// rejected by the builder rather than truncated.
pub fn build_message(declared_len: usize, payload: &[u8], ack: bool) -> Result<MessageBuilder> {
    let mut msg = MessageBuilder::allocate(declared_len)?;

    let flags = if ack {
        NLM_F_REQUEST | NLM_F_ACK
    } else {
        NLM_F_REQUEST
    };
    msg.set_header(NlMsgType::UEVENT_SEND, flags, 0);
    msg.set_seq(INJECT_SEQ);
    msg.append_bytes(payload)?;

    Ok(msg)
}

/// Drives a single injection over a [`Platform`].
#[derive(Debug)]
pub struct Injector<P: Platform> {
    platform: P,
    options: InjectOptions,
    state: State,
}

impl<P: Platform> Injector<P> {
    /// Create an injector in the `Start` state.
    pub fn new(platform: P, options: InjectOptions) -> Self {
        Self {
            platform,
            options,
            state: State::Start,
        }
    }

    /// The last state reached.
    pub fn state(&self) -> State {
        self.state
    }

    /// The underlying platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Run the injection to completion.
    ///
    /// Any error leaves the injector in `Failed`; nothing is retried or rolled
    /// back. The error is only logged at debug level; the caller reports it.
    pub async fn run(&mut self, request: &InjectRequest) -> Result<()> {
        if self.state != State::Start {
            return Err(Error::AlreadyRan { state: self.state });
        }

        match self.drive(request).await {
            Ok(()) => {
                self.advance(State::Done);
                Ok(())
            }
            Err(e) => {
                debug!(
                    pid = request.pid(),
                    state = ?self.state,
                    kind = e.kind(),
                    error = %e,
                    "uevent injection failed"
                );
                self.state = State::Failed;
                Err(e)
            }
        }
    }

    async fn drive(&mut self, request: &InjectRequest) -> Result<()> {
        privilege::require_root(self.platform.effective_uid())?;
        self.advance(State::PrivilegeChecked);

        request.validate()?;

        let ns = self
            .platform
            .resolve_namespace(request.pid(), request.pidfd())?;
        self.platform.enter_namespace(ns)?;
        self.advance(State::NamespaceEntered);

        let msg = build_message(request.declared_len(), request.payload(), self.options.ack)?;
        self.advance(State::MessageBuilt);

        let socket = self.platform.open_socket()?;
        if self.options.ack {
            transport::send_and_await_ack(
                &mut self.platform,
                &socket,
                &msg,
                self.options.ack_timeout,
            )
            .await?;
        } else {
            transport::send(&mut self.platform, &socket, &msg).await?;
        }
        self.advance(State::Sent);

        Ok(())
    }

    fn advance(&mut self, next: State) {
        debug!(from = ?self.state, to = ?next, "injector state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::{NLMSG_HDRLEN, NlMsgHdr};
    use crate::testing::{Call, FakePlatform, ack_frame};

    fn request() -> InjectRequest {
        InjectRequest::new(4242, 17, 20, ["ACTION=add", "SEQNUM=1"]).unwrap()
    }

    #[test]
    fn test_request_payload_is_nul_terminated() {
        let req = request();
        assert_eq!(req.payload(), b"ACTION=add\0SEQNUM=1\0");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_request_length_mismatch() {
        let req = InjectRequest::new(4242, 17, 5, ["ab"]).unwrap();
        assert_eq!(req.payload().len(), 3);
        assert!(matches!(req.validate(), Err(Error::Argument(_))));
    }

    #[test]
    fn test_request_rejects_bad_arguments() {
        let no_tokens: [&str; 0] = [];
        assert!(matches!(
            InjectRequest::new(4242, 17, 0, no_tokens),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            InjectRequest::new(0, 17, 2, ["a"]),
            Err(Error::Argument(_))
        ));
        assert!(matches!(
            InjectRequest::new(1, -2, 2, ["a"]),
            Err(Error::Argument(_))
        ));
        assert!(InjectRequest::new(1, NO_PIDFD, 2, ["a"]).is_ok());
    }

    #[test]
    fn test_build_message() {
        let msg = build_message(3, b"ab\0", false).unwrap();
        let hdr = NlMsgHdr::from_bytes(msg.as_bytes()).unwrap();
        assert_eq!(hdr.nlmsg_len as usize, NLMSG_HDRLEN + 3);
        assert_eq!(hdr.nlmsg_type, NlMsgType::UEVENT_SEND);
        assert_eq!(hdr.nlmsg_flags, NLM_F_REQUEST);
        assert_eq!(hdr.nlmsg_seq, INJECT_SEQ);
        assert_eq!(hdr.nlmsg_pid, 0);
    }

    #[test]
    fn test_build_message_rejects_oversized_payload() {
        let err = build_message(2, b"abcdef\0", false).unwrap_err();
        assert!(matches!(err, Error::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn test_run_sends_once() {
        let mut injector = Injector::new(FakePlatform::root(), InjectOptions::new());
        injector.run(&request()).await.unwrap();
        assert_eq!(injector.state(), State::Done);

        let platform = injector.platform();
        assert_eq!(
            &platform.calls()[..4],
            &[
                Call::EffectiveUid,
                Call::ResolveNamespace {
                    pid: 4242,
                    pidfd: 17
                },
                Call::EnterNamespace { pid: 4242 },
                Call::OpenSocket,
            ]
        );
        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), NLMSG_HDRLEN + 20);
        assert_eq!(&sent[0][NLMSG_HDRLEN..], b"ACTION=add\0SEQNUM=1\0");
    }

    #[tokio::test]
    async fn test_non_root_touches_nothing() {
        let mut injector = Injector::new(FakePlatform::with_euid(1000), InjectOptions::new());
        let err = injector.run(&request()).await.unwrap_err();
        assert!(matches!(err, Error::Privilege { euid: 1000 }));
        assert_eq!(injector.state(), State::Failed);
        assert!(!injector.platform().touched_system());
    }

    #[tokio::test]
    async fn test_length_mismatch_stops_before_namespace() {
        let req = InjectRequest::new(4242, 17, 5, ["ab"]).unwrap();
        let mut injector = Injector::new(FakePlatform::root(), InjectOptions::new());
        let err = injector.run(&req).await.unwrap_err();
        assert!(matches!(err, Error::Argument(_)));
        assert_eq!(injector.platform().calls(), &[Call::EffectiveUid]);
    }

    #[tokio::test]
    async fn test_stale_namespace_fails_switch() {
        let platform = FakePlatform::root().fail_enter(libc::EINVAL);
        let mut injector = Injector::new(platform, InjectOptions::new());
        let err = injector.run(&request()).await.unwrap_err();
        assert!(matches!(err, Error::NamespaceSwitch { pid: 4242, .. }));
        assert_eq!(injector.state(), State::Failed);
        assert!(!injector.platform().calls().contains(&Call::OpenSocket));
    }

    #[tokio::test]
    async fn test_ack_round_trip() {
        let platform = FakePlatform::root().respond(ack_frame(INJECT_SEQ, 0));
        let mut injector = Injector::new(platform, InjectOptions::new().ack(true));
        injector.run(&request()).await.unwrap();

        let sent = injector.platform().sent();
        let hdr = NlMsgHdr::from_bytes(sent[0]).unwrap();
        assert!(hdr.wants_ack());
        assert_eq!(injector.platform().calls().last(), Some(&Call::Recv));
    }

    #[tokio::test]
    async fn test_runs_only_once() {
        let mut injector = Injector::new(FakePlatform::root(), InjectOptions::new());
        injector.run(&request()).await.unwrap();

        let err = injector.run(&request()).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyRan { state: State::Done }));
        assert_eq!(err.kind(), "state");
        assert_eq!(injector.state(), State::Done);
        assert_eq!(injector.platform().sent().len(), 1);
    }
}
