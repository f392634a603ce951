//! Host capability checking.
//!
//! Collects the facts the harness needs before touching the system and caches
//! them in a static `OnceLock`.
//!
//! ## Collected Facts
//!
//! | Fact | Source |
//! |------|--------|
//! | Kernel version | `uname` syscall |
//! | Effective UID | `geteuid` |
//! | Filesystems | `/proc/filesystems` |
//!
//! ## Usage
//!
//! ```ignore
//! match check::check() {
//!     Ok(info) => println!("kernel {:?}", info.kernel_version),
//!     Err(e) => eprintln!("host not supported: {}", e),
//! }
//! ```

use std::fs;
use std::sync::OnceLock;

use rustix::process::geteuid;
use rustix::system::uname;
use thiserror::Error;

/// Information about the host the harness runs on.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub kernel_version: (u32, u32, u32),
    pub effective_uid: u32,
    pub filesystems: Vec<String>,
}

impl SystemInfo {
    /// Whether the running kernel has a driver registered for `name`.
    ///
    /// Modules that are not loaded yet are missing from `/proc/filesystems`,
    /// so a `false` here is a hint, not proof.
    pub fn supports_filesystem(&self, name: &str) -> bool {
        self.filesystems.iter().any(|fs| fs == name)
    }
}

/// Errors that can occur during host capability checking.
#[derive(Debug, Clone, Error)]
pub enum CheckError {
    #[error("administrative privilege required (effective uid is {euid})")]
    NotRoot { euid: u32 },

    #[error("failed to read kernel version")]
    KernelVersionReadFailed,

    #[error("failed to read /proc/filesystems: {0}")]
    FilesystemsReadFailed(String),
}

static SYSTEM_INFO: OnceLock<Result<SystemInfo, CheckError>> = OnceLock::new();

/// Check host capabilities and cache the result.
pub fn check() -> Result<&'static SystemInfo, &'static CheckError> {
    SYSTEM_INFO.get_or_init(check_impl).as_ref()
}

/// Fail unless the calling process runs with effective uid 0.
///
/// Not cached: the effective uid changes over the lifetime of a run.
pub fn require_root() -> Result<(), CheckError> {
    let euid = geteuid().as_raw();
    if euid != 0 {
        return Err(CheckError::NotRoot { euid });
    }
    Ok(())
}

fn check_impl() -> Result<SystemInfo, CheckError> {
    let kernel_version = get_kernel_version()?;
    let filesystems = fs::read_to_string("/proc/filesystems")
        .map(|content| parse_filesystems(&content))
        .map_err(|e| CheckError::FilesystemsReadFailed(e.to_string()))?;

    Ok(SystemInfo {
        kernel_version,
        effective_uid: geteuid().as_raw(),
        filesystems,
    })
}

fn get_kernel_version() -> Result<(u32, u32, u32), CheckError> {
    let uts = uname();
    let release = uts
        .release()
        .to_str()
        .map_err(|_| CheckError::KernelVersionReadFailed)?;
    parse_kernel_version(release)
}

fn parse_kernel_version(release: &str) -> Result<(u32, u32, u32), CheckError> {
    let parts: Vec<&str> = release.split('.').collect();
    if parts.len() < 2 {
        return Err(CheckError::KernelVersionReadFailed);
    }

    let major = parts[0]
        .parse::<u32>()
        .map_err(|_| CheckError::KernelVersionReadFailed)?;

    let minor = parts[1]
        .parse::<u32>()
        .map_err(|_| CheckError::KernelVersionReadFailed)?;

    // Patch might have additional suffix like "0-generic"
    let patch = parts
        .get(2)
        .and_then(|p| p.split('-').next())
        .and_then(|p| p.parse::<u32>().ok())
        .unwrap_or(0);

    Ok((major, minor, patch))
}

/// Parse `/proc/filesystems`.
///
/// Each line is either `nodev\t<name>` or `\t<name>`.
fn parse_filesystems(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|name| *name != "nodev")
        .map(str::to_owned)
        .collect()
}
