//! Inject kernel uevents into another process's network namespace.
//!
//! Uevents are scoped to a network namespace: a device manager running in a
//! container only hears the `NETLINK_KOBJECT_UEVENT` traffic of its own
//! namespace. This crate lets a privileged helper enter the namespace of a
//! target process and replay a uevent there, so the container sees it as if
//! the kernel had emitted it locally.
//!
//! The helper is meant to be spawned once per uevent: it checks privileges,
//! enters the namespace (irreversibly), sends one netlink message and exits.
//!
//! # Modules
//!
//! - [`netlink`] - message framing, the uevent socket and the ACK exchange
//! - [`namespace`] - pid/pidfd to namespace resolution and `setns(2)`
//! - [`privilege`] - effective-root check
//! - [`platform`] - the syscall seam ([`LinuxPlatform`])
//! - [`inject`] - the state machine tying it together
//!
//! # Features
//!
//! - `testing` - exposes [`testing::FakePlatform`] for downstream tests
//!
//! # Example
//!
//! ```ignore
//! use uevent_inject::{InjectOptions, InjectRequest, Injector, LinuxPlatform};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> uevent_inject::Result<()> {
//!     let request = InjectRequest::new(4242, 17, 20, ["ACTION=add", "SEQNUM=1"])?;
//!     let mut injector = Injector::new(LinuxPlatform, InjectOptions::new());
//!     injector.run(&request).await
//! }
//! ```

mod error;
pub mod inject;
pub mod namespace;
pub mod netlink;
pub mod platform;
pub mod privilege;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{Error, Result};
pub use inject::{InjectOptions, InjectRequest, Injector, State};
pub use platform::{LinuxPlatform, Platform};
