//! Error types for the harness.
//!
//! Everything here is an infrastructure failure ("broken"): the suite could
//! not run as intended. A syscall returning the wrong errno is not an error,
//! it is a failed [`Outcome`](crate::invoke::Outcome).

use std::io;
use std::path::PathBuf;

use errnocheck_sys::CheckError;
use nix::sys::signal::Signal;
use rustix::io::Errno;
use thiserror::Error;

use crate::privilege::PrivilegeError;

/// Invalid run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("a block device is required for the read-only mount (-D)")]
    MissingDevice,

    #[error("{0} concurrent copies requested, only 1 is supported per device")]
    UnsupportedCopies(u32),

    #[error("filesystem type cannot be empty")]
    EmptyFsType,

    #[error("unprivileged user name cannot be empty")]
    EmptyUser,
}

/// A setup step failed; no scenario outcome is meaningful.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("system check: {0}")]
    SystemCheck(#[from] CheckError),

    #[error("mkfs.{fs_type} not found")]
    MkfsNotFound { fs_type: String },

    #[error("mkfs.{fs_type} {device:?} failed: {reason}")]
    Mkfs {
        fs_type: String,
        device: PathBuf,
        reason: String,
    },

    #[error("signal handler for {signal}: {errno}")]
    Signal { signal: Signal, errno: nix::Error },

    #[error("privilege: {0}")]
    Privilege(#[from] PrivilegeError),

    #[error("user {0:?} not found")]
    UnknownUser(String),

    #[error("user {0:?} is privileged, an unprivileged account is required")]
    PrivilegedUser(String),

    #[error("user lookup {name:?}: {errno}")]
    UserLookup { name: String, errno: nix::Error },

    #[error("scratch directory: {0}")]
    Scratch(io::Error),

    #[error("mmap: {0}")]
    Mmap(Errno),

    #[error("fixture {path:?}: {source}")]
    Fixture { path: PathBuf, source: io::Error },

    #[error("chown {path:?}: {errno}")]
    Chown { path: PathBuf, errno: Errno },

    #[error("mount {device:?} on {target:?} ({fs_type}): {errno}")]
    Mount {
        device: PathBuf,
        target: PathBuf,
        fs_type: String,
        errno: Errno,
    },

    #[error("invalid target {0:?}: contains a NUL byte")]
    InvalidTarget(String),

    #[error("environment already torn down")]
    TornDown,

    #[error("precondition for {scenario}: {source}")]
    Precondition {
        scenario: &'static str,
        source: Box<SetupError>,
    },
}

impl SetupError {
    pub(crate) fn fixture(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Fixture {
            path: path.into(),
            source,
        }
    }
}

/// A teardown step that must succeed for the host to stay clean.
#[derive(Debug, Error)]
pub enum TeardownError {
    #[error("umount {target:?}: {errno}")]
    Unmount { target: PathBuf, errno: Errno },

    #[error("remove scratch directory {path:?}: {source}")]
    RemoveScratch { path: PathBuf, source: io::Error },
}

/// Why a run ended without producing a complete summary.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("setup: {0}")]
    Setup(#[from] SetupError),

    #[error("teardown: {0}")]
    Teardown(#[from] TeardownError),

    #[error("interrupted by {0}")]
    Interrupted(Signal),
}
