//! Scenario table.
//!
//! A [`Scenario`] pairs a target path expression with the one errno the call
//! under test must fail with, plus an optional precondition that prepares
//! on-disk state. Tables are plain data; the runner decides when builders
//! run and when targets are resolved.
//!
//! ## Targets
//!
//! Some targets are known at compile time (`"tfile_1"`, `""`), others only
//! exist once setup has run (the address of a `PROT_NONE` page). The latter
//! are [`Target::Deferred`] and resolved exactly once, before the first
//! iteration.

use std::ffi::CString;
use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use errnocheck_sys::memory::FaultingPage;
use libc::c_char;
use rustix::io::Errno;

use crate::error::SetupError;
use crate::precondition;

/// Name of the read-only mount point inside the scratch directory.
pub const MOUNT_POINT: &str = "mntpoint";

/// The two symlinks that point at each other.
pub const SYMLINK_LOOP: [&str; 2] = ["test_eloop1", "test_eloop2"];

/// The error a scenario expects the call under test to fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    PermissionDenied,
    AccessDenied,
    InvalidAddress,
    NameTooLong,
    NotADirectory,
    NoSuchEntry,
    TooManySymbolicLinks,
    ReadOnlyFilesystem,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::PermissionDenied,
        ErrorKind::AccessDenied,
        ErrorKind::InvalidAddress,
        ErrorKind::NameTooLong,
        ErrorKind::NotADirectory,
        ErrorKind::NoSuchEntry,
        ErrorKind::TooManySymbolicLinks,
        ErrorKind::ReadOnlyFilesystem,
    ];

    pub fn errno(self) -> Errno {
        match self {
            ErrorKind::PermissionDenied => Errno::PERM,
            ErrorKind::AccessDenied => Errno::ACCESS,
            ErrorKind::InvalidAddress => Errno::FAULT,
            ErrorKind::NameTooLong => Errno::NAMETOOLONG,
            ErrorKind::NotADirectory => Errno::NOTDIR,
            ErrorKind::NoSuchEntry => Errno::NOENT,
            ErrorKind::TooManySymbolicLinks => Errno::LOOP,
            ErrorKind::ReadOnlyFilesystem => Errno::ROFS,
        }
    }

    pub fn from_errno(errno: Errno) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.errno() == errno)
    }

    /// Symbolic errno name, e.g. `EPERM`.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => "EPERM",
            ErrorKind::AccessDenied => "EACCES",
            ErrorKind::InvalidAddress => "EFAULT",
            ErrorKind::NameTooLong => "ENAMETOOLONG",
            ErrorKind::NotADirectory => "ENOTDIR",
            ErrorKind::NoSuchEntry => "ENOENT",
            ErrorKind::TooManySymbolicLinks => "ELOOP",
            ErrorKind::ReadOnlyFilesystem => "EROFS",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Setup state visible to deferred target resolvers.
#[derive(Debug, Clone, Copy)]
pub struct Fixtures<'a> {
    pub scratch: &'a Path,
    pub faulting_page: &'a FaultingPage,
}

/// Prepares on-disk state for one scenario inside the scratch directory.
pub type Precondition = fn(&Path) -> Result<(), SetupError>;

/// Computes a target that only exists after setup.
pub type Resolver = fn(&Fixtures<'_>) -> Result<ResolvedTarget, SetupError>;

/// Path expression handed to the call under test.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    /// Path inside the scratch directory.
    Relative(&'static str),
    /// Passed to the kernel exactly as written.
    Literal(&'static str),
    /// Computed once during setup.
    Deferred(Resolver),
}

impl Target {
    pub fn resolve(&self, fixtures: &Fixtures<'_>) -> Result<ResolvedTarget, SetupError> {
        match self {
            Target::Relative(name) => ResolvedTarget::from_path(&fixtures.scratch.join(name)),
            Target::Literal(path) => ResolvedTarget::from_path(Path::new(path)),
            Target::Deferred(resolver) => resolver(fixtures),
        }
    }
}

/// A target in the form the kernel receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    Path(CString),
    /// Deliberately invalid pointer; never dereferenced in userspace.
    Address(*const c_char),
}

impl ResolvedTarget {
    pub fn from_path(path: &Path) -> Result<Self, SetupError> {
        CString::new(path.as_os_str().as_bytes())
            .map(ResolvedTarget::Path)
            .map_err(|_| SetupError::InvalidTarget(path.to_string_lossy().into_owned()))
    }

    #[inline]
    pub fn as_ptr(&self) -> *const c_char {
        match self {
            ResolvedTarget::Path(path) => path.as_ptr(),
            ResolvedTarget::Address(addr) => *addr,
        }
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOWN: usize = 48;
        match self {
            ResolvedTarget::Path(path) => {
                let bytes = path.as_bytes();
                if bytes.len() > SHOWN {
                    let head = String::from_utf8_lossy(&bytes[..SHOWN]);
                    write!(f, "\"{head}...\" ({} bytes)", bytes.len())
                } else {
                    write!(f, "{:?}", String::from_utf8_lossy(bytes))
                }
            }
            ResolvedTarget::Address(addr) => write!(f, "{:p}", *addr),
        }
    }
}

/// One (target, expected error, precondition) test unit.
#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub target: Target,
    pub expected: ErrorKind,
    pub precondition: Option<Precondition>,
}

/// A scenario whose target has been resolved.
#[derive(Debug, Clone)]
pub struct PreparedScenario {
    pub scenario: Scenario,
    pub target: ResolvedTarget,
}

/// Error paths of `chown(2)` called by an unprivileged identity.
pub fn chown_scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "not-owner",
            target: Target::Relative(precondition::NOT_OWNER_FILE),
            expected: ErrorKind::PermissionDenied,
            precondition: Some(precondition::file_owned_by_root),
        },
        Scenario {
            name: "search-denied",
            target: Target::Relative(precondition::SEARCH_DENIED_FILE),
            expected: ErrorKind::AccessDenied,
            precondition: Some(precondition::search_denied_dir),
        },
        Scenario {
            name: "kernel-address",
            target: Target::Deferred(precondition::kernel_address),
            expected: ErrorKind::InvalidAddress,
            precondition: None,
        },
        Scenario {
            name: "protected-page",
            target: Target::Deferred(precondition::protected_page),
            expected: ErrorKind::InvalidAddress,
            precondition: None,
        },
        Scenario {
            name: "name-too-long",
            target: Target::Deferred(precondition::overlong_name),
            expected: ErrorKind::NameTooLong,
            precondition: None,
        },
        Scenario {
            name: "empty-path",
            target: Target::Literal(""),
            expected: ErrorKind::NoSuchEntry,
            precondition: None,
        },
        Scenario {
            name: "not-a-directory",
            target: Target::Relative(precondition::NOT_A_DIRECTORY_PATH),
            expected: ErrorKind::NotADirectory,
            precondition: Some(precondition::plain_file_component),
        },
        Scenario {
            name: "symlink-loop",
            target: Target::Relative(SYMLINK_LOOP[0]),
            expected: ErrorKind::TooManySymbolicLinks,
            precondition: None,
        },
        Scenario {
            name: "read-only-fs",
            target: Target::Relative(MOUNT_POINT),
            expected: ErrorKind::ReadOnlyFilesystem,
            precondition: None,
        },
    ]
}
