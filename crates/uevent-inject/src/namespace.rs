//! Network namespace resolution and entry.
//!
//! A target is named by a pid plus an open pidfd for the same process. The
//! pidfd pins the process instance: after `/proc/<pid>/ns/net` is opened the
//! pidfd is checked again, so a pid recycled in between is detected instead of
//! silently resolving someone else's namespace.
//!
//! # Example
//!
//! ```ignore
//! use uevent_inject::namespace;
//!
//! let ns = namespace::resolve(4242, pidfd)?;
//! namespace::enter(ns)?;
//! // The calling thread now lives in the target's network namespace.
//! ```

use std::fs::{self, File};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use tracing::debug;

use crate::error::{Error, Result};

/// Mount point of procfs.
pub const PROC_ROOT: &str = "/proc";

/// A pidfd value meaning "no process descriptor available".
pub const NO_PIDFD: RawFd = -1;

/// A handle to an open network namespace file.
///
/// Only valid while the originating process lives; it is never cached.
#[derive(Debug)]
pub struct NamespaceFd {
    file: File,
    pid: i32,
}

impl NamespaceFd {
    /// The pid whose namespace this handle refers to.
    pub fn pid(&self) -> i32 {
        self.pid
    }
}

impl AsRawFd for NamespaceFd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Open the network namespace of `pid`, cross-checked against `pidfd`.
///
/// `pidfd` may be [`NO_PIDFD`] on kernels without pidfd support, in which
/// case only the `/proc` lookup is performed.
pub fn resolve(pid: i32, pidfd: RawFd) -> Result<NamespaceFd> {
    let fail = |source: io::Error| Error::NamespaceResolution { pid, source };

    if pid <= 0 {
        return Err(fail(io::Error::from_raw_os_error(libc::EINVAL)));
    }

    if pidfd != NO_PIDFD {
        check_pidfd_owner(pidfd, pid).map_err(fail)?;
    }

    let path = format!("{}/{}/ns/net", PROC_ROOT, pid);
    let file = File::open(&path).map_err(fail)?;

    // The namespace file was opened while the pidfd's process was alive, so
    // it belongs to that process and not to a recycled pid.
    if pidfd != NO_PIDFD {
        pidfd_alive(pidfd).map_err(fail)?;
    }

    debug!(pid, pidfd, path = %path, "resolved network namespace");
    Ok(NamespaceFd { file, pid })
}

/// Move the calling thread into the namespace referenced by `ns`.
///
/// The handle is consumed and closed once the switch is done. There is no
/// way back; the helper exits after its single task.
pub fn enter(ns: NamespaceFd) -> Result<()> {
    // SAFETY: libc::setns is a standard Linux syscall for switching namespaces.
    // ns.as_raw_fd() is an open namespace file owned by `ns`, CLONE_NEWNET
    // makes the kernel reject anything that is not a network namespace.
    let ret = unsafe { libc::setns(ns.as_raw_fd(), libc::CLONE_NEWNET) };
    if ret < 0 {
        return Err(Error::NamespaceSwitch {
            pid: ns.pid,
            source: io::Error::last_os_error(),
        });
    }

    debug!(pid = ns.pid, "entered network namespace");
    Ok(())
}

/// Verify that `pidfd` is a process descriptor for `pid`.
fn check_pidfd_owner(pidfd: RawFd, pid: i32) -> io::Result<()> {
    let fdinfo = fs::read_to_string(format!("{}/self/fdinfo/{}", PROC_ROOT, pidfd))?;

    match parse_fdinfo_pid(&fdinfo) {
        Some(owner) if owner == pid => Ok(()),
        // The kernel reports -1 once the process has been reaped.
        Some(-1) => Err(io::Error::from_raw_os_error(libc::ESRCH)),
        Some(owner) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("pidfd {} refers to pid {}", pidfd, owner),
        )),
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("fd {} is not a process descriptor", pidfd),
        )),
    }
}

/// Check that the process behind `pidfd` is still alive.
fn pidfd_alive(pidfd: RawFd) -> io::Result<()> {
    // SAFETY: signal 0 performs permission and existence checks only; a null
    // siginfo pointer is explicitly allowed by pidfd_send_signal(2).
    let ret = unsafe {
        libc::syscall(
            libc::SYS_pidfd_send_signal,
            pidfd,
            0,
            std::ptr::null::<libc::siginfo_t>(),
            0,
        )
    };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Extract the `Pid:` field from a `/proc/<pid>/fdinfo/<fd>` listing.
fn parse_fdinfo_pid(fdinfo: &str) -> Option<i32> {
    fdinfo
        .lines()
        .find_map(|line| line.strip_prefix("Pid:"))
        .and_then(|value| value.trim().parse().ok())
}
