//! One-shot uevent transmission, with or without a kernel acknowledgement.
//!
//! Every failure here is final. A uevent is an at-most-once signal: sending
//! it again would be a new event, so nothing is retried.

use std::time::Duration;

use tracing::debug;

use super::builder::MessageBuilder;
use super::message::{MessageIter, NlMsgError};
use crate::error::{Error, Result};
use crate::platform::Platform;

/// Transmit `msg` as a one-way datagram.
pub async fn send<P: Platform>(
    platform: &mut P,
    socket: &P::Socket,
    msg: &MessageBuilder,
) -> Result<()> {
    platform.send(socket, msg.as_bytes()).await?;
    debug!(len = msg.len(), "uevent sent");
    Ok(())
}

/// Transmit `msg` and wait for the kernel's answer.
///
/// The message must carry `NLM_F_ACK`. Frames for other sequence numbers are
/// skipped. With `timeout` set to `None` the wait is unbounded.
pub async fn send_and_await_ack<P: Platform>(
    platform: &mut P,
    socket: &P::Socket,
    msg: &MessageBuilder,
    timeout: Option<Duration>,
) -> Result<()> {
    let header = msg.header();
    if !header.wants_ack() {
        return Err(Error::InvalidMessage(
            "acknowledged send without NLM_F_ACK".into(),
        ));
    }
    let seq = header.nlmsg_seq;

    platform.send(socket, msg.as_bytes()).await?;
    debug!(len = msg.len(), seq, "uevent sent, awaiting ack");

    let wait = async {
        loop {
            let data = platform.recv(socket).await?;
            if process_ack(&data, seq)? {
                return Ok::<(), Error>(());
            }
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| Error::AckTimeout(limit))?,
        None => wait.await,
    }?;

    debug!(seq, "uevent acknowledged");
    Ok(())
}

/// Look for the answer to `expected_seq` in one received datagram.
///
/// Returns `Ok(true)` on ACK, `Ok(false)` if the datagram holds no answer.
fn process_ack(data: &[u8], expected_seq: u32) -> Result<bool> {
    for result in MessageIter::new(data) {
        let (header, payload) = result?;

        if header.nlmsg_seq != expected_seq {
            continue;
        }

        if header.is_error() {
            let err = NlMsgError::from_bytes(payload)?;
            if !err.is_ack() {
                return Err(Error::from_errno(err.error));
            }
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ack_frame;

    #[test]
    fn test_process_ack() {
        assert!(process_ack(&ack_frame(3, 0), 3).unwrap());
    }

    #[test]
    fn test_process_ack_skips_other_sequence() {
        assert!(!process_ack(&ack_frame(2, 0), 3).unwrap());
    }

    #[test]
    fn test_process_ack_nack() {
        let err = process_ack(&ack_frame(3, -libc::EPERM), 3).unwrap_err();
        assert_eq!(err.errno(), Some(libc::EPERM));
        assert!(err.is_permission_denied());
    }

    #[test]
    fn test_process_ack_truncated() {
        let mut frame = ack_frame(3, 0);
        // Shrink nlmsg_len so the error payload no longer fits.
        frame[0..4].copy_from_slice(&18u32.to_ne_bytes());
        frame.truncate(18);
        assert!(matches!(
            process_ack(&frame, 3),
            Err(Error::Truncated { .. })
        ));
    }
}
