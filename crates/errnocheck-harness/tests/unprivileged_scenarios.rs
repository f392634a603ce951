//! Scenarios that need neither root nor a block device.
//!
//! These run the real `chown` invoker against fixtures in a temporary
//! directory, so they exercise the kernel's error paths on any Linux host.

use errnocheck_harness::environment::create_symlink_loop;
use errnocheck_harness::scenario::Fixtures;
use errnocheck_harness::{
    chown_scenarios, execute, invoke, Config, ErrorKind, Identity, PreparedScenario,
};
use errnocheck_sys::memory::FaultingPage;

const UNPRIVILEGED: &[&str] = &[
    "kernel-address",
    "protected-page",
    "name-too-long",
    "empty-path",
    "not-a-directory",
    "symlink-loop",
];

fn prepare(scratch: &std::path::Path, page: &FaultingPage) -> Vec<PreparedScenario> {
    create_symlink_loop(scratch).expect("symlink loop");
    let fixtures = Fixtures {
        scratch,
        faulting_page: page,
    };

    chown_scenarios()
        .into_iter()
        .filter(|s| UNPRIVILEGED.contains(&s.name))
        .map(|scenario| {
            if let Some(build) = scenario.precondition {
                build(scratch).expect("precondition");
            }
            PreparedScenario {
                target: scenario.target.resolve(&fixtures).expect("resolve"),
                scenario,
            }
        })
        .collect()
}

#[test]
fn every_unprivileged_scenario_passes() {
    let dir = tempfile::tempdir().unwrap();
    let page = FaultingPage::map().unwrap();
    let prepared = prepare(dir.path(), &page);
    assert_eq!(prepared.len(), UNPRIVILEGED.len());

    let summary = execute(&Config::new(), "chown", &prepared, Identity::current(), invoke)
        .expect("loop should not abort");

    for tally in &summary.scenarios {
        assert_eq!(
            tally.failed, 0,
            "{} failed: {:?}",
            tally.name, tally.last_failure
        );
    }
    assert!(summary.success());
}

#[test]
fn outcomes_are_stable_across_iterations() {
    let dir = tempfile::tempdir().unwrap();
    let page = FaultingPage::map().unwrap();
    let prepared = prepare(dir.path(), &page);

    let config = Config::new().iterations(5).errno_logging(true).timing(true);
    let summary = execute(&config, "chown", &prepared, Identity::current(), invoke).unwrap();

    assert_eq!(summary.iterations, 5);
    assert_eq!(summary.passed, 5 * prepared.len() as u64);
    for tally in &summary.scenarios {
        assert_eq!(tally.passed, 5, "{}", tally.name);
    }

    let log = summary.errno_log.expect("errno logging enabled");
    let efault = log
        .iter()
        .find(|(name, _)| name.starts_with("EFAULT"))
        .map(|(_, count)| *count);
    assert_eq!(efault, Some(10), "two EFAULT scenarios, five iterations");

    let timing = summary.timing.expect("timing enabled");
    assert_eq!(timing.calls, 5 * prepared.len() as u64);
    assert!(timing.min_us <= timing.mean_us && timing.mean_us <= timing.max_us);
}

#[test]
fn expected_kinds_match_table() {
    let dir = tempfile::tempdir().unwrap();
    let page = FaultingPage::map().unwrap();
    let kinds: Vec<_> = prepare(dir.path(), &page)
        .iter()
        .map(|p| p.scenario.expected)
        .collect();
    assert_eq!(
        kinds,
        vec![
            ErrorKind::InvalidAddress,
            ErrorKind::InvalidAddress,
            ErrorKind::NameTooLong,
            ErrorKind::NoSuchEntry,
            ErrorKind::NotADirectory,
            ErrorKind::TooManySymbolicLinks,
        ]
    );
}
