//! Result reporting.
//!
//! Every classified call is logged as it happens and folded into per-scenario
//! tallies. Two optional aggregates mirror the classic harness switches:
//!
//! - **errno log** (`-e`) - how often each errno was observed
//! - **timing** (`-t`) - min / max / mean syscall latency
//!
//! Infrastructure failures never reach the reporter; they end the run as a
//! [`RunError`](crate::RunError) instead.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::invoke::{describe, Invocation, Outcome};
use crate::scenario::{ErrorKind, PreparedScenario};

/// Pass/fail counts for one scenario across all iterations.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioTally {
    pub name: &'static str,
    pub expected: ErrorKind,
    pub passed: u64,
    pub failed: u64,
    /// Message of the most recent failure.
    pub last_failure: Option<String>,
}

/// Syscall latency aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimingSummary {
    pub calls: u64,
    pub min_us: f64,
    pub max_us: f64,
    pub mean_us: f64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Timing {
    calls: u64,
    min: Duration,
    max: Duration,
    total: Duration,
}

impl Timing {
    fn add(&mut self, elapsed: Duration) {
        if self.calls == 0 || elapsed < self.min {
            self.min = elapsed;
        }
        self.max = self.max.max(elapsed);
        self.total += elapsed;
        self.calls += 1;
    }

    fn summary(&self) -> TimingSummary {
        let us = |d: Duration| d.as_secs_f64() * 1e6;
        TimingSummary {
            calls: self.calls,
            min_us: us(self.min),
            max_us: us(self.max),
            mean_us: if self.calls == 0 {
                0.0
            } else {
                us(self.total) / self.calls as f64
            },
        }
    }
}

/// Final report of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub syscall: &'static str,
    pub iterations: u32,
    pub passed: u64,
    pub failed: u64,
    pub scenarios: Vec<ScenarioTally>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errno_log: Option<BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TimingSummary>,
}

impl Summary {
    #[inline]
    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Collects outcomes for one run.
#[derive(Debug)]
pub struct Reporter {
    syscall: &'static str,
    errno_logging: bool,
    timing_enabled: bool,
    iterations: u32,
    tallies: Vec<ScenarioTally>,
    errno_log: BTreeMap<String, u64>,
    timing: Timing,
}

impl Reporter {
    pub fn new(syscall: &'static str, scenarios: &[PreparedScenario]) -> Self {
        Self {
            syscall,
            errno_logging: false,
            timing_enabled: false,
            iterations: 0,
            tallies: scenarios
                .iter()
                .map(|p| ScenarioTally {
                    name: p.scenario.name,
                    expected: p.scenario.expected,
                    passed: 0,
                    failed: 0,
                    last_failure: None,
                })
                .collect(),
            errno_log: BTreeMap::new(),
            timing: Timing::default(),
        }
    }

    pub fn with_config(mut self, config: &Config) -> Self {
        self.errno_logging = config.errno_logging;
        self.timing_enabled = config.timing;
        self
    }

    pub fn begin_iteration(&mut self, iteration: u32) {
        self.iterations = self.iterations.max(iteration.saturating_add(1));
        tracing::debug!(iteration, "iteration start");
    }

    /// Record the outcome of scenario `index` in the table.
    pub fn record(
        &mut self,
        iteration: u32,
        index: usize,
        prepared: &PreparedScenario,
        invocation: &Invocation,
        outcome: Outcome,
    ) {
        let scenario = prepared.scenario.name;
        if outcome.passed() {
            tracing::info!(
                iteration,
                scenario,
                target = %prepared.target,
                "PASS {} {outcome}",
                self.syscall
            );
        } else {
            tracing::error!(
                iteration,
                scenario,
                target = %prepared.target,
                "FAIL {} {outcome}",
                self.syscall
            );
        }

        if let Some(tally) = self.tallies.get_mut(index) {
            if outcome.passed() {
                tally.passed += 1;
            } else {
                tally.failed += 1;
                tally.last_failure = Some(outcome.to_string());
            }
        }

        if self.errno_logging {
            if let Some(errno) = outcome.errno() {
                *self.errno_log.entry(describe(errno)).or_default() += 1;
            }
        }
        if self.timing_enabled {
            self.timing.add(invocation.elapsed);
        }
    }

    pub fn summary(&self) -> Summary {
        Summary {
            syscall: self.syscall,
            iterations: self.iterations,
            passed: self.tallies.iter().map(|t| t.passed).sum(),
            failed: self.tallies.iter().map(|t| t.failed).sum(),
            scenarios: self.tallies.clone(),
            errno_log: self.errno_logging.then(|| self.errno_log.clone()),
            timing: self.timing_enabled.then(|| self.timing.summary()),
        }
    }
}
