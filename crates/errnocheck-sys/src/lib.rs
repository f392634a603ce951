//! Low-level Linux syscall wrappers for error-path conformance testing.
//!
//! The harness needs to hand the kernel arguments that safe wrappers refuse
//! to build: dangling pointers, pointers into `PROT_NONE` memory, paths longer
//! than `PATH_MAX`. This crate keeps those calls in one place so the harness
//! itself stays free of raw pointer juggling.
//!
//! ## Modules
//!
//! - **chown** - `fchownat`/`fchown` with arbitrary path pointers
//! - **memory** - Addresses guaranteed to fault when the kernel reads them
//! - **mount** - Thin `mount(2)` / `umount2(2)` wrappers
//! - **check** - Runtime host capability detection
//!
//! # Safety
//!
//! This crate contains raw syscall wrappers. Casts between integer types
//! are unavoidable when interfacing with the kernel ABI.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod check;
pub mod chown;
pub mod memory;
pub mod mount;

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

pub use check::{check, require_root, CheckError, SystemInfo};

#[inline]
pub fn last_errno() -> rustix::io::Errno {
    // SAFETY: __errno_location always returns valid thread-local pointer.
    rustix::io::Errno::from_raw_os_error(unsafe { *libc::__errno_location() })
}

/// Convert a path to a C string, rejecting interior NUL bytes.
#[inline]
pub fn path_to_cstring(path: &Path) -> Result<CString, rustix::io::Errno> {
    CString::new(path.as_os_str().as_bytes()).map_err(|_| rustix::io::Errno::INVAL)
}
