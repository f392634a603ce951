//! Precondition builders and deferred target resolvers.
//!
//! Builders run once, in table order, after the global environment exists and
//! while the process holds the unprivileged identity. Each one tolerates the
//! state a previous run of itself left behind.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io;
use std::os::fd::AsFd;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

use errnocheck_sys::chown::fchown;
use errnocheck_sys::memory::KERNEL_ADDRESS;

use crate::error::SetupError;
use crate::privilege::{as_admin, Identity};
use crate::scenario::{Fixtures, ResolvedTarget};

pub const NOT_OWNER_FILE: &str = "tfile_1";
pub const SEARCH_DENIED_DIR: &str = "testdir_1";
pub const SEARCH_DENIED_FILE: &str = "testdir_1/tfile_2";
pub const PLAIN_FILE: &str = "t_file";
pub const NOT_A_DIRECTORY_PATH: &str = "t_file/tfile_3";

/// Character repeated to build the overlong path component.
pub const FILLER: char = 'a';

/// Length of the overlong component: past both `NAME_MAX` and `PATH_MAX`.
pub const OVERLONG_LEN: usize = libc::PATH_MAX as usize + 2;

fn create_file(path: &Path, mode: u32) -> Result<File, SetupError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .mode(mode)
        .open(path)
        .map_err(|e| SetupError::fixture(path, e))
}

/// A file created by the caller, then handed to root.
pub fn file_owned_by_root(scratch: &Path) -> Result<(), SetupError> {
    let path = scratch.join(NOT_OWNER_FILE);
    let file = create_file(&path, 0o666)?;
    let root = Identity::root();

    as_admin(|| {
        fchown(file.as_fd(), root.uid.as_raw(), root.gid.as_raw())
            .map_err(|errno| SetupError::Chown { path, errno })
    })
}

/// A root-owned `0700` directory with a file inside.
pub fn search_denied_dir(scratch: &Path) -> Result<(), SetupError> {
    let dir = scratch.join(SEARCH_DENIED_DIR);
    let file = scratch.join(SEARCH_DENIED_FILE);

    as_admin(|| {
        match DirBuilder::new().mode(0o700).create(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(SetupError::fixture(&dir, e)),
        }
        create_file(&file, 0o666).map(drop)
    })
}

/// A regular file that later appears as a directory component.
pub fn plain_file_component(scratch: &Path) -> Result<(), SetupError> {
    create_file(&scratch.join(PLAIN_FILE), 0o777).map(drop)
}

pub fn kernel_address(_: &Fixtures<'_>) -> Result<ResolvedTarget, SetupError> {
    Ok(ResolvedTarget::Address(KERNEL_ADDRESS as *const libc::c_char))
}

pub fn protected_page(fixtures: &Fixtures<'_>) -> Result<ResolvedTarget, SetupError> {
    Ok(ResolvedTarget::Address(fixtures.faulting_page.as_ptr()))
}

/// `<scratch>/aaaa...` with a single component of [`OVERLONG_LEN`] bytes.
pub fn overlong_name(fixtures: &Fixtures<'_>) -> Result<ResolvedTarget, SetupError> {
    let component = FILLER.to_string().repeat(OVERLONG_LEN);
    ResolvedTarget::from_path(&fixtures.scratch.join(component))
}
