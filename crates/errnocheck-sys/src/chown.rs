//! Ownership-change syscalls with unchecked path arguments.
//!
//! `chown_ptr` goes straight to `fchownat(AT_FDCWD, ...)` through
//! `libc::syscall` so the path pointer is only ever read by the kernel.
//! Passing a dangling or `PROT_NONE` pointer therefore yields `EFAULT`
//! instead of a segfault in userspace.

use std::ffi::CStr;
use std::os::fd::{AsRawFd, BorrowedFd};

use libc::c_char;
use rustix::io::Errno;

use crate::last_errno;

/// Change ownership of the file named by `path`, following symlinks.
///
/// The pointer is never dereferenced in userspace.
pub fn chown_ptr(path: *const c_char, uid: u32, gid: u32) -> Result<(), Errno> {
    // SAFETY: the kernel validates `path` and reports EFAULT for
    // inaccessible addresses; nothing here reads through it.
    let ret = unsafe { libc::syscall(libc::SYS_fchownat, libc::AT_FDCWD, path, uid, gid, 0) };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

/// Change ownership of the file named by `path`.
#[inline]
pub fn chown_path(path: &CStr, uid: u32, gid: u32) -> Result<(), Errno> {
    chown_ptr(path.as_ptr(), uid, gid)
}

/// Change ownership of an open file.
pub fn fchown(fd: BorrowedFd<'_>, uid: u32, gid: u32) -> Result<(), Errno> {
    // SAFETY: fd is a valid open descriptor for the lifetime of the borrow.
    let ret = unsafe { libc::fchown(fd.as_raw_fd(), uid, gid) };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::os::fd::AsFd;
    use std::os::unix::fs::MetadataExt;

    use super::*;

    #[test]
    fn chown_to_self_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("owned");
        std::fs::write(&path, b"").unwrap();
        let md = std::fs::metadata(&path).unwrap();

        let c_path = CString::new(path.to_str().unwrap()).unwrap();
        assert_eq!(chown_path(&c_path, md.uid(), md.gid()), Ok(()));
    }

    #[test]
    fn fchown_to_self_is_noop() {
        let file = tempfile::tempfile().unwrap();
        let md = file.metadata().unwrap();
        assert_eq!(fchown(file.as_fd(), md.uid(), md.gid()), Ok(()));
    }

    #[test]
    fn empty_path_is_enoent() {
        assert_eq!(chown_path(c"", 0, 0), Err(Errno::NOENT));
    }

    #[test]
    fn kernel_address_is_efault() {
        let ptr = usize::MAX as *const c_char;
        assert_eq!(chown_ptr(ptr, 0, 0), Err(Errno::FAULT));
    }
}
