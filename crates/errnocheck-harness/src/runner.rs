//! Run driver.
//!
//! Ties the pieces together in a fixed order:
//!
//! 1. validate the configuration
//! 2. build the [`Environment`] and prepare the scenario table
//! 3. loop over the table (count, duration, or until interrupted)
//! 4. tear the environment down, always
//!
//! ## Example
//!
//! ```ignore
//! use errnocheck_harness::{chown_scenarios, Config, Runner};
//!
//! let summary = Runner::new(Config::new().device("/dev/loop0"))
//!     .run(&chown_scenarios())?;
//! assert!(summary.success());
//! ```

use std::thread;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::environment::Environment;
use crate::error::RunError;
use crate::invoke::{classify, invoke, Invocation};
use crate::privilege::Identity;
use crate::report::{Reporter, Summary};
use crate::scenario::{PreparedScenario, ResolvedTarget, Scenario};
use crate::signal;

/// Longest stretch the pause sleeps before checking for a signal again.
const PAUSE_SLICE: Duration = Duration::from_millis(100);

/// Drives one run of a scenario table.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Config,
    syscall: &'static str,
}

impl Runner {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            syscall: "chown",
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Execute the full lifecycle for `scenarios`.
    ///
    /// Scenario failures end up in the returned [`Summary`]; only
    /// infrastructure problems produce an `Err`.
    pub fn run(&self, scenarios: &[Scenario]) -> Result<Summary, RunError> {
        let device = self.config.validate()?.clone();
        signal::reset();

        let env = Environment::setup(&self.config, &device)?;
        let result = env
            .prepare(scenarios)
            .map_err(RunError::from)
            .and_then(|prepared| {
                execute(&self.config, self.syscall, &prepared, Identity::current(), invoke)
            });

        match (result, env.teardown()) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(teardown)) => {
                tracing::error!(error = %teardown, "teardown failed after aborted run");
                Err(e)
            }
        }
    }
}

/// Loop over prepared scenarios without touching the environment.
///
/// `call` performs one invocation; the runner passes [`invoke`].
pub fn execute<F>(
    config: &Config,
    syscall: &'static str,
    prepared: &[PreparedScenario],
    owner: Identity,
    mut call: F,
) -> Result<Summary, RunError>
where
    F: FnMut(&ResolvedTarget, Identity) -> Invocation,
{
    let looping = config.looping();
    let mut reporter = Reporter::new(syscall, prepared).with_config(config);
    let start = Instant::now();
    let mut iteration = 0u32;

    tracing::info!(
        scenarios = prepared.len(),
        ?looping,
        owner = %owner,
        "starting {syscall} scenarios"
    );

    while looping.should_run(iteration, start.elapsed()) {
        reporter.begin_iteration(iteration);
        for (index, scenario) in prepared.iter().enumerate() {
            check_interrupt(&reporter)?;
            let invocation = call(&scenario.target, owner);
            let outcome = classify(scenario.scenario.expected, invocation.result);
            reporter.record(iteration, index, scenario, &invocation, outcome);
        }
        iteration = iteration.saturating_add(1);

        if let Some(pause) = config.pause {
            if looping.should_run(iteration, start.elapsed()) {
                pause_unless(pause, || signal::interrupted().is_some());
            }
        }
        check_interrupt(&reporter)?;
    }

    Ok(reporter.summary())
}

/// Sleep for `pause`, waking early once `stop` returns true.
fn pause_unless(pause: Duration, stop: impl Fn() -> bool) {
    let deadline = Instant::now() + pause;
    while !stop() {
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return;
        }
        thread::sleep(left.min(PAUSE_SLICE));
    }
}

fn check_interrupt(reporter: &Reporter) -> Result<(), RunError> {
    match signal::interrupted() {
        None => Ok(()),
        Some(sig) => {
            let partial = reporter.summary();
            tracing::warn!(
                signal = %sig,
                passed = partial.passed,
                failed = partial.failed,
                "interrupted, tearing down"
            );
            Err(RunError::Interrupted(sig))
        }
    }
}
