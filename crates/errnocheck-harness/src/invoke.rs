//! Syscall invocation and outcome classification.
//!
//! The new owner passed to `chown` is always the caller's own effective
//! uid/gid. That change is a no-op, so success never counts as correct
//! behaviour: every scenario must fail, and fail with one specific errno.

use std::fmt;
use std::time::{Duration, Instant};

use errnocheck_sys::chown::chown_ptr;
use rustix::io::Errno;

use crate::privilege::Identity;
use crate::scenario::{ErrorKind, ResolvedTarget};

/// Raw result of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub result: Result<(), Errno>,
    pub elapsed: Duration,
}

/// Classified result of one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Failed with the expected errno.
    Pass { errno: Errno },
    /// Returned success.
    UnexpectedSuccess,
    /// Failed with some other errno.
    WrongError { expected: ErrorKind, actual: Errno },
}

impl Outcome {
    #[inline]
    pub fn passed(&self) -> bool {
        matches!(self, Outcome::Pass { .. })
    }

    /// The errno observed, if the call failed.
    pub fn errno(&self) -> Option<Errno> {
        match *self {
            Outcome::Pass { errno } => Some(errno),
            Outcome::WrongError { actual, .. } => Some(actual),
            Outcome::UnexpectedSuccess => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass { errno } => write!(f, "failed as expected: {}", describe(*errno)),
            Outcome::UnexpectedSuccess => f.write_str("succeeded unexpectedly"),
            Outcome::WrongError { expected, actual } => write!(
                f,
                "failed with {}, expected {} ({})",
                describe(*actual),
                expected,
                describe(expected.errno())
            ),
        }
    }
}

/// `EPERM (Operation not permitted)`.
pub fn describe(errno: Errno) -> String {
    let nix_errno = nix::errno::Errno::from_raw(errno.raw_os_error());
    format!("{nix_errno:?} ({})", nix_errno.desc())
}

/// Call `chown(target, owner.uid, owner.gid)` and time it.
pub fn invoke(target: &ResolvedTarget, owner: Identity) -> Invocation {
    let start = Instant::now();
    let result = chown_ptr(target.as_ptr(), owner.uid.as_raw(), owner.gid.as_raw());
    Invocation {
        result,
        elapsed: start.elapsed(),
    }
}

/// Compare a call's result against the scenario's expectation.
pub fn classify(expected: ErrorKind, result: Result<(), Errno>) -> Outcome {
    match result {
        Ok(()) => Outcome::UnexpectedSuccess,
        Err(errno) if errno == expected.errno() => Outcome::Pass { errno },
        Err(actual) => Outcome::WrongError { expected, actual },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_success_is_failure() {
        let outcome = classify(ErrorKind::PermissionDenied, Ok(()));
        assert_eq!(outcome, Outcome::UnexpectedSuccess);
        assert!(!outcome.passed());
        assert_eq!(outcome.errno(), None);
    }

    #[test]
    fn classify_expected_errno() {
        let outcome = classify(ErrorKind::NotADirectory, Err(Errno::NOTDIR));
        assert_eq!(outcome, Outcome::Pass { errno: Errno::NOTDIR });
        assert!(outcome.passed());
    }

    #[test]
    fn classify_wrong_errno() {
        let outcome = classify(ErrorKind::ReadOnlyFilesystem, Err(Errno::PERM));
        assert_eq!(
            outcome,
            Outcome::WrongError {
                expected: ErrorKind::ReadOnlyFilesystem,
                actual: Errno::PERM,
            }
        );
        assert_eq!(outcome.errno(), Some(Errno::PERM));
        let msg = outcome.to_string();
        assert!(msg.contains("EPERM") && msg.contains("EROFS"), "{msg}");
    }

    #[test]
    fn describe_names_errno() {
        assert!(describe(Errno::NOENT).starts_with("ENOENT ("));
    }

    #[test]
    fn invoke_empty_path() {
        let target = ResolvedTarget::Path(Default::default());
        let inv = invoke(&target, Identity::current());
        assert_eq!(
            classify(ErrorKind::NoSuchEntry, inv.result),
            Outcome::Pass { errno: Errno::NOENT }
        );
    }
}
