//! Error types for uevent injection.

use std::io;
use std::time::Duration;

/// Result type for injection operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while injecting a uevent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed invocation argument.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The helper is not running with an effective uid of 0.
    #[error("must be run as root (effective uid {euid})")]
    Privilege {
        /// The effective uid the process runs with.
        euid: u32,
    },

    /// The target process or its network namespace could not be resolved.
    #[error("cannot resolve network namespace of pid {pid}: {source}")]
    NamespaceResolution {
        /// Target process id.
        pid: i32,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// `setns(2)` rejected the switch.
    #[error("cannot enter network namespace of pid {pid}: {source}")]
    NamespaceSwitch {
        /// Target process id.
        pid: i32,
        /// Underlying cause.
        #[source]
        source: io::Error,
    },

    /// The message buffer could not be allocated.
    #[error("cannot allocate netlink message of {requested} bytes")]
    Allocation {
        /// Total bytes requested (header included).
        requested: usize,
    },

    /// A write would exceed the fixed message capacity.
    #[error("netlink message capacity exceeded: requested {requested} bytes, {available} available")]
    CapacityExceeded {
        /// Bytes requested by the write.
        requested: usize,
        /// Bytes left in the message.
        available: usize,
    },

    /// The uevent netlink socket could not be opened.
    #[error("cannot open uevent netlink socket: {0}")]
    SocketOpen(#[source] io::Error),

    /// Transmitting the message failed.
    #[error("cannot send uevent: {0}")]
    Send(#[source] io::Error),

    /// Kernel answered the request with an error code.
    #[error("kernel rejected uevent: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// No acknowledgement arrived within the configured bound.
    #[error("no acknowledgement from kernel within {0:?}")]
    AckTimeout(Duration),

    /// `Injector::run` was called again after a previous run.
    #[error("injector already ran (state {state:?})")]
    AlreadyRan {
        /// State the injector was left in.
        state: crate::inject::State,
    },
}

impl Error {
    /// Create a kernel error from a (negative) netlink errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Short name of the error class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Argument(_) => "argument",
            Self::Privilege { .. } => "privilege",
            Self::NamespaceResolution { .. } => "namespace-resolution",
            Self::NamespaceSwitch { .. } => "namespace-switch",
            Self::Allocation { .. } => "allocation",
            Self::CapacityExceeded { .. } => "capacity-exceeded",
            Self::SocketOpen(_) => "socket-open",
            Self::Send(_)
            | Self::Kernel { .. }
            | Self::Truncated { .. }
            | Self::InvalidMessage(_)
            | Self::AckTimeout(_) => "send",
            Self::AlreadyRan { .. } => "state",
        }
    }

    /// Get the errno value if one is known.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } => Some(*errno),
            Self::NamespaceResolution { source, .. }
            | Self::NamespaceSwitch { source, .. }
            | Self::SocketOpen(source)
            | Self::Send(source) => source.raw_os_error(),
            _ => None,
        }
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Privilege { .. })
            || matches!(self.errno(), Some(libc::EPERM) | Some(libc::EACCES))
    }

    /// Process exit code for this error.
    ///
    /// Every failure maps to 1; callers only distinguish success from failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
