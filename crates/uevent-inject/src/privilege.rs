//! Effective-root check run before any privileged work.

use crate::error::{Error, Result};

/// The effective uid of the calling process.
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid(2) cannot fail and has no preconditions.
    unsafe { libc::geteuid() }
}

/// Fail unless `euid` is the superuser.
pub fn require_root(euid: u32) -> Result<()> {
    if euid != 0 {
        return Err(Error::Privilege { euid });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_root() {
        assert!(require_root(0).is_ok());
        assert!(matches!(
            require_root(1000),
            Err(Error::Privilege { euid: 1000 })
        ));
    }

    #[test]
    fn test_effective_uid_matches_libc() {
        assert_eq!(effective_uid(), unsafe { libc::geteuid() });
    }
}
