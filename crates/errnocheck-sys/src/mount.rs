//! `mount(2)` and `umount2(2)` wrappers.

use std::ffi::CString;
use std::path::Path;

use rustix::io::Errno;

use crate::{last_errno, path_to_cstring};

/// Mount the filesystem on `device` at `target`.
pub fn mount_fs(device: &Path, target: &Path, fstype: &str, readonly: bool) -> Result<(), Errno> {
    let device_c = path_to_cstring(device)?;
    let target_c = path_to_cstring(target)?;
    let fstype_c = CString::new(fstype).map_err(|_| Errno::INVAL)?;
    let flags = if readonly { libc::MS_RDONLY } else { 0 };

    let ret = unsafe {
        libc::mount(
            device_c.as_ptr(),
            target_c.as_ptr(),
            fstype_c.as_ptr(),
            flags,
            std::ptr::null(),
        )
    };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

/// Unmount the filesystem mounted at `target`.
pub fn umount(target: &Path) -> Result<(), Errno> {
    let target_c = path_to_cstring(target)?;
    let ret = unsafe { libc::umount2(target_c.as_ptr(), 0) };
    if ret != 0 { Err(last_errno()) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umount_not_a_mount_point() {
        let dir = tempfile::tempdir().unwrap();
        // EINVAL as root, EPERM otherwise.
        let err = umount(dir.path()).unwrap_err();
        assert!(err == Errno::INVAL || err == Errno::PERM, "got {err:?}");
    }

    #[test]
    fn mount_rejects_interior_nul() {
        let dir = tempfile::tempdir().unwrap();
        let err = mount_fs(Path::new("/dev/null"), dir.path(), "ext\0", true).unwrap_err();
        assert_eq!(err, Errno::INVAL);
    }
}
