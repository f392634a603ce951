//! errnocheck-harness: table-driven error-path conformance testing
//!
//! This crate checks that a privileged system call fails with exactly the
//! documented errno under a set of prepared conditions. It ships the
//! `chown(2)` suite:
//!
//! - **EPERM** - file owned by root, caller unprivileged
//! - **EACCES** - search permission denied on a path prefix
//! - **EFAULT** - path pointer outside the accessible address space (x2)
//! - **ENAMETOOLONG** - overlong path component
//! - **ENOENT** - empty path
//! - **ENOTDIR** - regular file used as a directory component
//! - **ELOOP** - two symlinks pointing at each other
//! - **EROFS** - target on a read-only mount
//!
//! ## Quick Start
//!
//! ```ignore
//! use errnocheck_harness::{chown_scenarios, Config, Runner};
//!
//! let config = Config::new().device("/dev/loop0").iterations(3);
//! let summary = Runner::new(config).run(&chown_scenarios())?;
//! assert!(summary.success());
//! ```
//!
//! ## Requirements
//!
//! - Linux, started as root (real uid 0)
//! - A block device that may be reformatted
//! - An unprivileged account (default `nobody`)

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod environment;
pub mod error;
pub mod invoke;
pub mod mkfs;
pub mod precondition;
pub mod privilege;
pub mod report;
pub mod runner;
pub mod scenario;
pub mod signal;

pub use config::{Config, Looping};
pub use environment::Environment;
pub use error::{ConfigError, RunError, SetupError, TeardownError};
pub use invoke::{classify, invoke, Invocation, Outcome};
pub use privilege::{Identity, PrivilegeError};
pub use report::{Reporter, ScenarioTally, Summary, TimingSummary};
pub use runner::{execute, Runner};
pub use scenario::{
    chown_scenarios, ErrorKind, PreparedScenario, ResolvedTarget, Scenario, Target,
};
