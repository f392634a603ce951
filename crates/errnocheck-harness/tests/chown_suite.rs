//! Full `chown` suite and its teardown guarantees.
//!
//! Every test here needs root. Tests that mount read `ERRNOCHECK_DEVICE`, a
//! device that may be reformatted:
//!
//! ```bash
//! truncate -s 64M /tmp/errnocheck.img
//! sudo losetup /dev/loop7 /tmp/errnocheck.img
//! sudo ERRNOCHECK_DEVICE=/dev/loop7 cargo test -p errnocheck-harness \
//!     --test chown_suite -- --ignored --test-threads=1
//! ```
//!
//! Effective ids are process-wide, so these must not run in parallel.

use std::fs::{self, File, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use errnocheck_harness::precondition::NOT_OWNER_FILE;
use errnocheck_harness::privilege::{elevate, switch_to};
use errnocheck_harness::{
    chown_scenarios, Config, Environment, ErrorKind, Identity, RunError, Runner, Scenario, Target,
};
use tempfile::TempDir;

fn device() -> Option<PathBuf> {
    match std::env::var_os("ERRNOCHECK_DEVICE") {
        Some(dev) => Some(PathBuf::from(dev)),
        None => {
            eprintln!("Skipping: ERRNOCHECK_DEVICE not set");
            None
        }
    }
}

fn running_as_root() -> bool {
    let root = Identity::current().is_root();
    if !root {
        eprintln!("Skipping: requires root");
    }
    root
}

/// A parent for scratch directories that the unprivileged user can write to.
fn scratch_parent() -> TempDir {
    let base = tempfile::tempdir().unwrap();
    fs::set_permissions(base.path(), Permissions::from_mode(0o1777)).unwrap();
    base
}

fn leftovers(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect()
}

#[test]
#[ignore]
fn all_scenarios_pass_and_teardown_is_clean() {
    let Some(device) = device() else { return };
    let base = scratch_parent();
    let config = Config::new()
        .device(&device)
        .fs_type("ext2")
        .iterations(3)
        .errno_logging(true)
        .scratch_base(base.path());

    let summary = Runner::new(config).run(&chown_scenarios()).expect("run should not break");

    for tally in &summary.scenarios {
        assert_eq!(tally.failed, 0, "{}: {:?}", tally.name, tally.last_failure);
        assert_eq!(tally.passed, 3, "{}", tally.name);
    }
    assert_eq!(Identity::current(), Identity::root());
    assert!(leftovers(base.path()).is_empty(), "scratch directory left behind");
}

#[test]
#[ignore]
fn teardown_follows_failed_scenarios() {
    let Some(device) = device() else { return };
    let base = scratch_parent();
    let config = Config::new()
        .device(&device)
        .fs_type("ext2")
        .iterations(2)
        .scratch_base(base.path());

    // The root-owned file from the not-owner row exists, so this gets EPERM.
    let mut table = chown_scenarios();
    table.push(Scenario {
        name: "wrong-expectation",
        target: Target::Relative(NOT_OWNER_FILE),
        expected: ErrorKind::NoSuchEntry,
        precondition: None,
    });

    let summary = Runner::new(config).run(&table).expect("run should not break");

    assert!(!summary.success());
    assert_eq!(summary.failed, 2);
    let wrong = summary.scenarios.last().unwrap();
    assert_eq!(wrong.name, "wrong-expectation");
    assert_eq!(wrong.failed, 2);
    assert!(wrong.last_failure.as_deref().unwrap().contains("EPERM"));

    assert_eq!(Identity::current(), Identity::root());
    assert!(leftovers(base.path()).is_empty(), "scratch directory left behind");
}

#[test]
#[ignore]
fn partial_setup_is_undone_when_mount_fails() {
    if !running_as_root() {
        return;
    }
    // A regular file formats fine but cannot be mounted as a block device.
    let disk_dir = tempfile::tempdir().unwrap();
    let disk = disk_dir.path().join("disk.img");
    File::create(&disk).unwrap().set_len(16 << 20).unwrap();

    let base = scratch_parent();
    let config = Config::new()
        .device(&disk)
        .fs_type("ext2")
        .scratch_base(base.path());

    let err = Runner::new(config).run(&chown_scenarios()).unwrap_err();

    assert!(matches!(err, RunError::Setup(_)), "{err}");
    assert_eq!(Identity::current(), Identity::root());
    assert!(leftovers(base.path()).is_empty(), "scratch directory left behind");
}

#[test]
#[ignore]
fn environment_prepares_every_target() {
    let Some(device) = device() else { return };
    let base = scratch_parent();
    let config = Config::new()
        .device(&device)
        .fs_type("ext2")
        .scratch_base(base.path());

    let env = Environment::setup(&config, &device).expect("setup");
    assert!(env.is_mounted());
    assert_ne!(Identity::current(), Identity::root());

    let prepared = env.prepare(&chown_scenarios()).expect("prepare");
    assert_eq!(prepared.len(), 9);

    let scratch = env.scratch().to_path_buf();
    env.teardown().expect("teardown");
    assert!(!scratch.exists());
    assert_eq!(Identity::current(), Identity::root());
}

#[test]
#[ignore]
fn elevate_restores_prior_identity() {
    if !running_as_root() {
        return;
    }
    let nobody = Identity::lookup("nobody").unwrap();

    switch_to(nobody).unwrap();
    {
        let guard = elevate().unwrap();
        assert!(Identity::current().is_root());
        assert_eq!(guard.prior(), nobody);
        guard.restore().unwrap();
    }
    assert_eq!(Identity::current(), nobody);

    {
        let _guard = elevate().unwrap();
        assert!(Identity::current().is_root());
    }
    assert_eq!(Identity::current(), nobody);

    switch_to(Identity::root()).unwrap();
}
