//! Global environment shared by every scenario of a run.
//!
//! The environment is built once before the first iteration and torn down
//! exactly once afterwards, whether the run passed, failed, or aborted.
//!
//! ## Scratch Layout
//!
//! ```text
//! /tmp/errnocheck-XXXXXX/       owned by the unprivileged user, 0700
//! ├── mntpoint/                 device mounted read-only
//! ├── test_eloop1 → test_eloop2
//! ├── test_eloop2 → test_eloop1
//! └── ...                       files created by precondition builders
//! ```
//!
//! ## Identity
//!
//! Setup starts as root, formats the device, then drops the effective ids to
//! the unprivileged account. Only the mount step (and builders that need it)
//! briefly regain root. Teardown regains root for good.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::{symlink, DirBuilderExt};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use errnocheck_sys::memory::FaultingPage;
use errnocheck_sys::mount::{mount_fs, umount};
use errnocheck_sys::{check, require_root};
use rustix::io::Errno;
use tempfile::TempDir;

use crate::config::Config;
use crate::error::{SetupError, TeardownError};
use crate::mkfs;
use crate::privilege::{self, as_admin, Identity};
use crate::scenario::{Fixtures, PreparedScenario, Scenario, MOUNT_POINT, SYMLINK_LOOP};
use crate::signal;

const SCRATCH_PREFIX: &str = "errnocheck-";
const MOUNT_DIR_MODE: u32 = 0o755;
const UMOUNT_RETRIES: u32 = 50;
const UMOUNT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Process-wide state spanning one run.
#[derive(Debug)]
pub struct Environment {
    device: PathBuf,
    fs_type: String,
    admin: Identity,
    user: Identity,
    scratch_path: PathBuf,
    scratch: Option<TempDir>,
    faulting_page: Option<FaultingPage>,
    /// Set while the device is mounted.
    mount_point: Option<PathBuf>,
    torn_down: bool,
}

impl Environment {
    /// Build the environment. Every step must succeed.
    ///
    /// On error, whatever was already created is torn down before returning.
    pub fn setup(config: &Config, device: &Path) -> Result<Self, SetupError> {
        require_root()?;
        if let Ok(info) = check() {
            if !info.supports_filesystem(&config.fs_type) {
                tracing::warn!(
                    fs_type = %config.fs_type,
                    "filesystem not registered with the kernel yet, relying on module autoload"
                );
            }
        }

        mkfs::format(device, &config.fs_type)?;
        signal::install()?;

        let user = Identity::lookup(&config.user)?;
        if user.is_root() {
            return Err(SetupError::PrivilegedUser(config.user.clone()));
        }

        let mut env = Self {
            device: device.to_path_buf(),
            fs_type: config.fs_type.clone(),
            admin: Identity::current(),
            user,
            scratch_path: PathBuf::new(),
            scratch: None,
            faulting_page: None,
            mount_point: None,
            torn_down: false,
        };

        privilege::switch_to(user)?;
        tracing::info!(user = %config.user, identity = %user, "dropped to unprivileged identity");

        let base = config
            .scratch_base
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let scratch = TempDir::with_prefix_in(SCRATCH_PREFIX, &base).map_err(SetupError::Scratch)?;
        env.scratch_path = scratch.path().to_path_buf();
        env.scratch = Some(scratch);
        tracing::debug!(path = %env.scratch_path.display(), "scratch directory created");

        env.faulting_page = Some(FaultingPage::map().map_err(SetupError::Mmap)?);
        create_symlink_loop(&env.scratch_path)?;
        env.mount_read_only()?;

        Ok(env)
    }

    fn mount_read_only(&mut self) -> Result<(), SetupError> {
        let target = self.scratch_path.join(MOUNT_POINT);
        let device = self.device.clone();
        let fs_type = self.fs_type.clone();
        let mount_point = &mut self.mount_point;

        as_admin(|| {
            DirBuilder::new()
                .mode(MOUNT_DIR_MODE)
                .create(&target)
                .map_err(|e| SetupError::fixture(&target, e))?;
            mount_fs(&device, &target, &fs_type, true).map_err(|errno| SetupError::Mount {
                device: device.clone(),
                target: target.clone(),
                fs_type: fs_type.clone(),
                errno,
            })?;
            tracing::info!(
                device = %device.display(),
                target = %target.display(),
                fs_type,
                "mounted read-only"
            );
            *mount_point = Some(target.clone());
            Ok(())
        })
    }

    /// Run every precondition in table order, then resolve every target once.
    pub fn prepare(&self, scenarios: &[Scenario]) -> Result<Vec<PreparedScenario>, SetupError> {
        let fixtures = self.fixtures().ok_or(SetupError::TornDown)?;

        for scenario in scenarios {
            if let Some(build) = scenario.precondition {
                build(fixtures.scratch).map_err(|e| SetupError::Precondition {
                    scenario: scenario.name,
                    source: Box::new(e),
                })?;
                tracing::debug!(scenario = scenario.name, "precondition ready");
            }
        }

        scenarios
            .iter()
            .map(|scenario| {
                let target = scenario.target.resolve(&fixtures)?;
                Ok(PreparedScenario {
                    scenario: *scenario,
                    target,
                })
            })
            .collect()
    }

    pub fn fixtures(&self) -> Option<Fixtures<'_>> {
        Some(Fixtures {
            scratch: self.scratch.as_ref()?.path(),
            faulting_page: self.faulting_page.as_ref()?,
        })
    }

    #[inline]
    pub fn user(&self) -> Identity {
        self.user
    }

    #[inline]
    pub fn scratch(&self) -> &Path {
        &self.scratch_path
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.mount_point.is_some()
    }

    /// Undo setup. Every step is attempted; the first fatal error is returned.
    pub fn teardown(mut self) -> Result<(), TeardownError> {
        self.teardown_inner()
    }

    fn teardown_inner(&mut self) -> Result<(), TeardownError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if let Err(e) = privilege::switch_to(self.admin) {
            tracing::warn!(error = %e, "could not regain administrative identity");
        }

        let mut first_err = None;

        if let Some(target) = self.mount_point.take() {
            match umount_with_retry(&target) {
                Ok(()) => tracing::info!(target = %target.display(), "unmounted"),
                Err(errno) => {
                    tracing::error!(target = %target.display(), %errno, "umount failed");
                    first_err = Some(TeardownError::Unmount { target, errno });
                }
            }
        }

        self.faulting_page.take();

        if let Some(scratch) = self.scratch.take() {
            if first_err.is_some() {
                // Never recurse into a directory that may still hold a live mount.
                let kept = scratch.keep();
                tracing::warn!(path = %kept.display(), "scratch directory left behind");
            } else if let Err(source) = scratch.close() {
                first_err = Some(TeardownError::RemoveScratch {
                    path: self.scratch_path.clone(),
                    source,
                });
            } else {
                tracing::debug!(path = %self.scratch_path.display(), "scratch directory removed");
            }
        }

        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        if let Err(e) = self.teardown_inner() {
            tracing::error!(error = %e, "teardown failed");
        }
    }
}

/// Create two symlinks that resolve to each other.
pub fn create_symlink_loop(dir: &Path) -> Result<(), SetupError> {
    let [first, second] = SYMLINK_LOOP;
    for (target, link) in [(second, first), (first, second)] {
        let link = dir.join(link);
        match symlink(target, &link) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(SetupError::fixture(link, e)),
        }
    }
    Ok(())
}

fn umount_with_retry(target: &Path) -> Result<(), Errno> {
    let mut attempt = 0;
    loop {
        match umount(target) {
            Err(Errno::BUSY) if attempt + 1 < UMOUNT_RETRIES => {
                attempt += 1;
                tracing::debug!(target = %target.display(), attempt, "mount busy, retrying");
                thread::sleep(UMOUNT_RETRY_DELAY);
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn symlink_loop_points_both_ways() {
        let dir = tempfile::tempdir().unwrap();
        create_symlink_loop(dir.path()).unwrap();

        let [first, second] = SYMLINK_LOOP;
        assert_eq!(fs::read_link(dir.path().join(first)).unwrap(), Path::new(second));
        assert_eq!(fs::read_link(dir.path().join(second)).unwrap(), Path::new(first));
        assert!(fs::metadata(dir.path().join(first)).is_err());
    }

    #[test]
    fn symlink_loop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        create_symlink_loop(dir.path()).unwrap();
        create_symlink_loop(dir.path()).unwrap();
    }

    #[test]
    fn umount_non_mount_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        assert!(umount_with_retry(dir.path()).is_err());
    }
}
