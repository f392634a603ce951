//! errnocheck CLI - run syscall error-path suites from the command line

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use errnocheck_harness::config::{DEFAULT_FS_TYPE, DEFAULT_USER};
use errnocheck_harness::{chown_scenarios, Config, RunError, Runner, Summary};

/// Every scenario produced the expected errno.
const EXIT_PASS: u8 = 0;
/// At least one scenario produced the wrong result.
const EXIT_FAIL: u8 = 1;
/// Setup, teardown, or configuration failed.
const EXIT_BROKEN: u8 = 2;

#[derive(Parser)]
#[command(name = "errnocheck")]
#[command(author, version, about = "Error-path conformance checks for privileged syscalls")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the chown(2) error-path suite (requires root)
    Chown(ChownArgs),

    /// List the chown scenarios and their expected errors
    List,

    /// Report kernel and filesystem support without running anything
    Check,
}

#[derive(clap::Args, Debug)]
struct ChownArgs {
    /// Block device to format and mount read-only
    #[arg(short = 'D', long)]
    device: Option<PathBuf>,

    /// Filesystem type to create on the device
    #[arg(short = 'T', long, default_value = DEFAULT_FS_TYPE)]
    fs_type: String,

    /// Number of concurrent copies (only 1 is supported)
    #[arg(short = 'c', long, default_value_t = 1)]
    copies: u32,

    /// Count observed errno values
    #[arg(short = 'e', long)]
    errno_log: bool,

    /// Iterations over the table (0 loops until interrupted)
    #[arg(short = 'i', long, default_value_t = 1)]
    iterations: u32,

    /// Loop for this many seconds instead of a fixed count
    #[arg(short = 'I', long, value_name = "SECS")]
    duration: Option<f64>,

    /// Pause between iterations, in seconds
    #[arg(short = 'P', long, value_name = "SECS")]
    pause: Option<f64>,

    /// Collect per-call timing statistics
    #[arg(short = 't', long)]
    timing: bool,

    /// Unprivileged account the scenarios run as
    #[arg(long, default_value = DEFAULT_USER)]
    user: String,

    /// Parent directory for the scratch directory
    #[arg(long)]
    scratch: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

impl ChownArgs {
    fn to_config(&self) -> anyhow::Result<Config> {
        let mut config = Config::new()
            .fs_type(&self.fs_type)
            .copies(self.copies)
            .errno_logging(self.errno_log)
            .iterations(self.iterations)
            .timing(self.timing)
            .user(&self.user);

        if let Some(device) = &self.device {
            config = config.device(device);
        }
        if let Some(secs) = self.duration {
            config = config.duration(seconds(secs).context("invalid -I duration")?);
        }
        if let Some(secs) = self.pause {
            config = config.pause(seconds(secs).context("invalid -P pause")?);
        }
        if let Some(dir) = &self.scratch {
            config = config.scratch_base(dir);
        }
        Ok(config)
    }
}

fn seconds(secs: f64) -> anyhow::Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .with_context(|| format!("{secs} is not a valid number of seconds"))
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("errnocheck_harness=info".parse()?)
                .add_directive("errnocheck=info".parse()?),
        )
        .init();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing() {
        eprintln!("Error: {e:#}");
        return ExitCode::from(EXIT_BROKEN);
    }

    let result = match cli.command {
        Commands::Chown(args) => run_chown(&args),
        Commands::List => {
            list();
            Ok(EXIT_PASS)
        }
        Commands::Check => check(),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_BROKEN)
        }
    }
}

fn run_chown(args: &ChownArgs) -> anyhow::Result<u8> {
    let config = args.to_config()?;
    let runner = Runner::new(config);

    match runner.run(&chown_scenarios()) {
        Ok(summary) => {
            tracing::info!(
                iterations = summary.iterations,
                passed = summary.passed,
                failed = summary.failed,
                "chown run complete"
            );
            print_summary(&summary, args.json)?;
            Ok(if summary.success() { EXIT_PASS } else { EXIT_FAIL })
        }
        Err(RunError::Interrupted(signal)) => {
            tracing::warn!(%signal, "interrupted, environment torn down");
            Ok(EXIT_BROKEN)
        }
        Err(e) => Err(broken(&e)),
    }
}

/// One-line error for a run that did not complete.
///
/// The harness errors already spell out their causes, so the chain is not
/// carried along.
fn broken(e: &RunError) -> anyhow::Error {
    anyhow::anyhow!("chown suite did not complete: {e}")
}

fn print_summary(summary: &Summary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!("{} summary: {} iteration(s)", summary.syscall, summary.iterations);
    for tally in &summary.scenarios {
        let status = if tally.failed == 0 { "PASS" } else { "FAIL" };
        println!(
            "  {status} {:<16} {:<13} passed={} failed={}",
            tally.name,
            tally.expected.name(),
            tally.passed,
            tally.failed
        );
        if let Some(failure) = &tally.last_failure {
            println!("       last failure: {failure}");
        }
    }
    println!("passed: {}  failed: {}", summary.passed, summary.failed);

    if let Some(log) = &summary.errno_log {
        println!("errno log:");
        for (errno, count) in log {
            println!("  {count:>8}  {errno}");
        }
    }
    if let Some(timing) = &summary.timing {
        println!(
            "timing: {} calls, min {:.2}us, mean {:.2}us, max {:.2}us",
            timing.calls, timing.min_us, timing.mean_us, timing.max_us
        );
    }
    Ok(())
}

fn list() {
    for (index, scenario) in chown_scenarios().iter().enumerate() {
        let fixture = if scenario.precondition.is_some() { "fixture" } else { "" };
        println!(
            "{:>2}  {:<16} {:<13} {fixture}",
            index + 1,
            scenario.name,
            scenario.expected.name()
        );
    }
}

fn check() -> anyhow::Result<u8> {
    let info = errnocheck_sys::check().map_err(|e| anyhow::anyhow!("{e}"))?;
    let (major, minor, patch) = info.kernel_version;
    println!("kernel: {major}.{minor}.{patch}");
    println!("effective uid: {}", info.effective_uid);
    println!(
        "root: {}",
        if info.effective_uid == 0 { "yes" } else { "no (chown suite will refuse to run)" }
    );
    println!("filesystems: {}", info.filesystems.join(", "));
    Ok(EXIT_PASS)
}
