//! Addresses that fault when the kernel tries to read through them.

use std::ffi::c_void;
use std::ptr;

use libc::c_char;
use rustix::io::Errno;
use rustix::mm::{mmap_anonymous, munmap, MapFlags, ProtFlags};
use rustix::param::page_size;

/// An address in the kernel half of the address space.
///
/// No userspace mapping can ever cover it.
pub const KERNEL_ADDRESS: usize = usize::MAX;

/// One anonymous page mapped with no access rights.
///
/// Any read the kernel attempts through [`FaultingPage::as_ptr`] fails with
/// `EFAULT`. The page is unmapped on drop.
#[derive(Debug)]
pub struct FaultingPage {
    addr: *mut c_void,
    len: usize,
}

impl FaultingPage {
    pub fn map() -> Result<Self, Errno> {
        let len = page_size();
        // SAFETY: a fresh anonymous mapping at a kernel-chosen address does
        // not alias any existing Rust allocation.
        let addr = unsafe {
            mmap_anonymous(ptr::null_mut(), len, ProtFlags::empty(), MapFlags::PRIVATE)?
        };
        Ok(Self { addr, len })
    }

    #[inline]
    pub fn as_ptr(&self) -> *const c_char {
        self.addr.cast_const().cast()
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.len
    }
}

impl Drop for FaultingPage {
    fn drop(&mut self) {
        // SAFETY: addr/len describe the mapping created in `map` and nothing
        // else references it.
        unsafe {
            munmap(self.addr, self.len).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_page_sized() {
        let page = FaultingPage::map().unwrap();
        assert_eq!(page.size(), page_size());
        assert!(!page.as_ptr().is_null());
    }

    #[test]
    fn kernel_rejects_page_as_path() {
        let page = FaultingPage::map().unwrap();
        let ret = crate::chown::chown_ptr(page.as_ptr(), 0, 0);
        assert_eq!(ret, Err(Errno::FAULT));
    }
}
