//! CLI argument parsing tests for the forkuevent command.
//!
//! None of these reach the namespace switch: they fail on argument decoding,
//! on the privilege check (non-root) or on the length check (root).

use assert_cmd::Command;
use predicates::prelude::*;

fn forkuevent_cmd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_forkuevent"))
}

mod global_flags {
    use super::*;

    #[test]
    fn test_help() {
        forkuevent_cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Inject a uevent into a process's network namespace",
            ))
            .stdout(predicate::str::contains("--ack-timeout"));
    }

    #[test]
    fn test_version() {
        forkuevent_cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("forkuevent"));
    }
}

mod arguments {
    use super::*;

    #[test]
    fn test_no_arguments() {
        forkuevent_cmd()
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("required"));
    }

    #[test]
    fn test_missing_uevent() {
        forkuevent_cmd()
            .args(["4242", "17", "20"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("required"));
    }

    #[test]
    fn test_non_numeric_pid() {
        forkuevent_cmd()
            .args(["abc", "17", "20", "ACTION=add"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("invalid value"));
    }

    #[test]
    fn test_zero_pid() {
        forkuevent_cmd()
            .args(["0", "17", "11", "ACTION=add"])
            .assert()
            .code(1);
    }

    #[test]
    fn test_pidfd_below_minus_one() {
        forkuevent_cmd()
            .args(["4242", "-2", "11", "ACTION=add"])
            .assert()
            .code(1);
    }

    #[test]
    fn test_negative_length() {
        forkuevent_cmd()
            .args(["4242", "17", "-5", "ACTION=add"])
            .assert()
            .code(1);
    }

    #[test]
    fn test_ack_timeout_requires_ack() {
        forkuevent_cmd()
            .args(["--ack-timeout", "100", "4242", "17", "11", "ACTION=add"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("--ack"));
    }
}

mod validation {
    use super::*;

    #[test]
    fn test_length_mismatch_fails() {
        // Non-root stops at the privilege check, root at the length check.
        forkuevent_cmd()
            .args(["1", "-1", "5", "ab"])
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty())
            .stderr(
                predicate::str::contains("must be run as root")
                    .or(predicate::str::contains("does not match payload length")),
            );
    }

    #[test]
    fn test_failure_prints_one_line() {
        let output = forkuevent_cmd()
            .env_remove("RUST_LOG")
            .args(["1", "-1", "5", "ab"])
            .assert()
            .code(1)
            .get_output()
            .clone();

        let stderr = String::from_utf8_lossy(&output.stderr);
        assert_eq!(stderr.lines().count(), 1, "stderr: {stderr}");
        assert!(stderr.starts_with("Error: "));
    }

    #[test]
    fn test_rust_log_debug_shows_failure_event() {
        // The failure is logged at debug whichever check stops the run.
        forkuevent_cmd()
            .env("RUST_LOG", "debug")
            .args(["1", "-1", "5", "ab"])
            .assert()
            .code(1)
            .stdout(predicate::str::is_empty())
            .stderr(predicate::str::contains("uevent injection failed"))
            .stderr(predicate::str::contains("Error: "));
    }
}
