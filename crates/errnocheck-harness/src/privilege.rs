//! Effective identity switching.
//!
//! The harness runs with real uid 0 and drops its *effective* ids to an
//! unprivileged account. Because the real and saved uids stay 0, the
//! process can regain root for a single setup step and then drop again.
//!
//! ```text
//! real=0 saved=0 effective=nobody ──elevate()──▶ effective=0
//!                                  ◀─restore()── (or Drop)
//! ```
//!
//! Effective ids are process-global (glibc broadcasts `seteuid` to every
//! thread), so the harness must stay single-threaded while a guard is live.

use nix::unistd::{getegid, geteuid, setegid, seteuid, Gid, Uid, User};
use thiserror::Error;

use crate::error::SetupError;

/// Error while changing effective ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PrivilegeError {
    #[error("seteuid({uid}): {errno}")]
    SetEuid { uid: Uid, errno: nix::Error },

    #[error("setegid({gid}): {errno}")]
    SetEgid { gid: Gid, errno: nix::Error },
}

/// An effective user/group pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
}

impl Identity {
    pub const fn new(uid: u32, gid: u32) -> Self {
        Self {
            uid: Uid::from_raw(uid),
            gid: Gid::from_raw(gid),
        }
    }

    pub const fn root() -> Self {
        Self::new(0, 0)
    }

    /// The calling process's effective ids.
    pub fn current() -> Self {
        Self {
            uid: geteuid(),
            gid: getegid(),
        }
    }

    /// Resolve an account name through the password database.
    pub fn lookup(name: &str) -> Result<Self, SetupError> {
        let user = User::from_name(name)
            .map_err(|errno| SetupError::UserLookup {
                name: name.to_owned(),
                errno,
            })?
            .ok_or_else(|| SetupError::UnknownUser(name.to_owned()))?;
        Ok(Self {
            uid: user.uid,
            gid: user.gid,
        })
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.uid.is_root()
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.uid, self.gid)
    }
}

/// Make `target` the effective identity.
///
/// Regains euid 0 first when needed, since `setegid` requires it.
pub fn switch_to(target: Identity) -> Result<(), PrivilegeError> {
    let current = Identity::current();
    if current == target {
        return Ok(());
    }

    if !current.is_root() {
        set_euid(Uid::from_raw(0))?;
    }
    if current.gid != target.gid {
        setegid(target.gid).map_err(|errno| PrivilegeError::SetEgid {
            gid: target.gid,
            errno,
        })?;
    }
    if !target.is_root() {
        set_euid(target.uid)?;
    }

    tracing::trace!(from = %current, to = %target, "switched effective identity");
    Ok(())
}

fn set_euid(uid: Uid) -> Result<(), PrivilegeError> {
    seteuid(uid).map_err(|errno| PrivilegeError::SetEuid { uid, errno })
}

/// Scoped administrative identity.
///
/// Created by [`elevate`]. Call [`Elevated::restore`] where a failure to drop
/// back must be reported; dropping the guard restores too, but only warns.
#[must_use = "the prior identity is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct Elevated {
    prior: Identity,
    restored: bool,
}

impl Elevated {
    #[inline]
    pub fn prior(&self) -> Identity {
        self.prior
    }

    pub fn restore(mut self) -> Result<(), PrivilegeError> {
        self.restored = true;
        switch_to(self.prior)
    }
}

impl Drop for Elevated {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = switch_to(self.prior) {
            tracing::warn!(identity = %self.prior, error = %e, "failed to restore identity");
        }
    }
}

/// Become root until the returned guard is restored or dropped.
pub fn elevate() -> Result<Elevated, PrivilegeError> {
    let prior = Identity::current();
    switch_to(Identity::root())?;
    Ok(Elevated {
        prior,
        restored: false,
    })
}

/// Run `f` as root and drop back afterwards.
///
/// A failure to drop back is reported even when `f` succeeded.
pub fn as_admin<T, E>(f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
where
    E: From<PrivilegeError>,
{
    let guard = elevate()?;
    let value = f()?;
    guard.restore()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_matches_libc() {
        let id = Identity::current();
        // SAFETY: geteuid/getegid are always safe
        assert_eq!(id.uid.as_raw(), unsafe { libc::geteuid() });
        assert_eq!(id.gid.as_raw(), unsafe { libc::getegid() });
    }

    #[test]
    fn switch_to_self_is_noop() {
        assert_eq!(switch_to(Identity::current()), Ok(()));
    }

    #[test]
    fn identity_display() {
        assert_eq!(Identity::new(65534, 65534).to_string(), "65534:65534");
        assert!(Identity::root().is_root());
        assert!(!Identity::new(1000, 0).is_root());
    }

    #[test]
    fn lookup_root() {
        let root = Identity::lookup("root").unwrap();
        assert_eq!(root, Identity::root());
    }

    #[test]
    fn lookup_unknown_user() {
        let err = Identity::lookup("errnocheck-no-such-user").unwrap_err();
        assert!(matches!(err, SetupError::UnknownUser(_)));
    }
}
