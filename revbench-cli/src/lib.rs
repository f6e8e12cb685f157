#![warn(missing_docs)]
//! revbench CLI Library
//!
//! Harness side of revbench: executors, isolation backends, the run driver and the
//! command line entry point. A benchmark binary registers its subjects and calls
//! [`run()`]; the same binary serves as its own isolated worker.
//!
//! # Example
//!
//! ```ignore
//! use revbench::prelude::*;
//!
//! fn parse_small(_: &ParameterSet) { /* ... */ }
//!
//! register_subject!(SubjectDef::new("parsing", "small", parse_small).revs(100).iterations(5));
//!
//! fn main() -> anyhow::Result<()> {
//!     revbench::run()
//! }
//! ```

mod config;
mod environment;
mod executor;
mod planner;
mod runner;
mod supervisor;

pub use config::*;
pub use environment::probe_all;
pub use executor::{
    Executor, ExecutorConfig, ExecutorError, InProcessBackend, IsolatedOutcome,
    IsolationBackend, IsolationError, IterationCallback, LaunchTarget, MicrotimeExecutor,
    TraceExecutor, executor_for,
};
pub use planner::{ExecutionPlan, Overrides, build_plan};
pub use runner::{RunSummary, Runner, RunnerOptions};
pub use supervisor::{ProcessBackend, WORKER_FLAG};

use anyhow::Context;
use clap::{Parser, Subcommand};
use regex::Regex;
use revbench_core::WorkerMain;
use revbench_model::{Suite, SuiteCollection};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// revbench CLI arguments
#[derive(Parser, Debug)]
#[command(name = "revbench")]
#[command(author, version, about = "revbench - micro-benchmark harness with per-iteration isolation")]
pub struct Cli {
    /// Optional subcommand (List, Run); defaults to Run
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Filter subjects by regex over `benchmark::subject`
    #[arg(default_value = ".*")]
    pub filter: String,

    /// Run subjects of this group only
    #[arg(long)]
    pub group: Option<String>,

    /// Iterations per variant (overrides every subject)
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Revolutions per iteration (overrides every subject)
    #[arg(long)]
    pub revs: Option<u32>,

    /// Warmup revolutions per iteration (overrides every subject)
    #[arg(long)]
    pub warmup: Option<u32>,

    /// Reject iterations deviating more than this percentage from the mean
    #[arg(long)]
    pub retry_threshold: Option<f64>,

    /// Rounds of re-measuring rejected iterations
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Executor: "microtime" or "trace"
    #[arg(long)]
    pub executor: Option<String>,

    /// Timeout for a single iteration (e.g. "30s")
    #[arg(long)]
    pub timeout: Option<String>,

    /// Where to write the suite document
    #[arg(long)]
    pub dump_file: Option<PathBuf>,

    /// Label stored on the suite
    #[arg(long)]
    pub context: Option<String>,

    /// Configuration file (default: discover revbench.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run subjects inside the harness process (no isolation, no noise capture)
    #[arg(long)]
    pub no_isolation: bool,

    /// Show a progress bar
    #[arg(long)]
    pub progress: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Internal: Run as worker process (used by the process backend)
    #[arg(long, hide = true)]
    pub revbench_worker: bool,

    /// Internal: Absorb cargo bench's --bench flag
    #[arg(long, hide = true)]
    pub bench: bool,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered subjects
    List,
    /// Measure subjects (default)
    Run,
}

/// Run the revbench CLI with the process arguments.
/// This is the main entry point for benchmark binaries.
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    run_with_cli(cli)
}

/// Run the revbench CLI with pre-parsed arguments.
pub fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    // Worker mode first: a worker must never log or print
    if cli.revbench_worker {
        return run_worker_mode();
    }

    let filter = if cli.verbose { "revbench=debug" } else { "revbench=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();

    let config_path = cli.config.clone().or_else(RevbenchConfig::discover);
    let config = match &config_path {
        Some(path) => RevbenchConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => RevbenchConfig::default(),
    };

    let filter = Regex::new(&cli.filter).with_context(|| format!("invalid filter {:?}", cli.filter))?;
    let plan = build_plan(revbench_core::subjects(), Some(&filter), cli.group.as_deref());

    match cli.command {
        Some(Commands::List) => {
            list_subjects(&plan);
            Ok(())
        }
        Some(Commands::Run) | None => run_subjects(&cli, &config, config_path, &plan),
    }
}

fn run_worker_mode() -> anyhow::Result<()> {
    let mut worker = WorkerMain::new();
    worker
        .run()
        .map_err(|e| anyhow::anyhow!("Worker error: {}", e))
}

fn list_subjects(plan: &ExecutionPlan) {
    println!("revbench plan:");
    let mut current = None;
    for subject in &plan.subjects {
        if current != Some(subject.benchmark) {
            println!("├── {}", subject.benchmark);
            current = Some(subject.benchmark);
        }
        let groups = if subject.groups.is_empty() {
            String::new()
        } else {
            format!(" [{}]", subject.groups.join(", "))
        };
        println!(
            "│   ├── {}{} (revs {}, iterations {}, warmup {})",
            subject.name, groups, subject.revs, subject.iterations, subject.warmup
        );
    }
    println!("{} subjects found.", plan.len());
}

fn run_subjects(
    cli: &Cli,
    config: &RevbenchConfig,
    config_path: Option<PathBuf>,
    plan: &ExecutionPlan,
) -> anyhow::Result<()> {
    if plan.is_empty() {
        println!("No subjects found.");
        return Ok(());
    }

    let overrides = Overrides {
        iterations: cli.iterations.or(config.runner.iterations),
        revs: cli.revs.or(config.runner.revs),
        warmup: cli.warmup.or(config.runner.warmup),
        retry_threshold: cli.retry_threshold.or(config.runner.retry_threshold),
    };
    let context = cli.context.clone().or_else(|| config.runner.context.clone());

    let mut suite = Suite::new(context, config_path);
    for information in probe_all() {
        suite.add_information(information);
    }
    plan.populate(&mut suite, &overrides)?;

    let timeout = match &cli.timeout {
        Some(timeout) => Duration::from_nanos(RevbenchConfig::parse_duration(timeout)?),
        None => config.timeout()?,
    };
    let backend: Arc<dyn IsolationBackend> = if cli.no_isolation {
        Arc::new(InProcessBackend)
    } else {
        Arc::new(ProcessBackend::current_exe(timeout)?)
    };

    let executor_name = cli.executor.as_deref().unwrap_or(&config.runner.executor);
    let runner = Runner::new(
        executor_for(executor_name, backend)?,
        ExecutorConfig::new(config.executor_options()?),
        RunnerOptions {
            max_retries: cli.max_retries.unwrap_or(config.runner.max_retries),
            progress: cli.progress,
        },
    )?;

    info!(subjects = plan.len(), executor = executor_name, "starting run");
    let summary = runner.run(&mut suite)?;
    print_outcome(&suite);

    let dump_file = cli.dump_file.as_ref().unwrap_or(&config.output.dump_file);
    revbench_serializer::encode_file(dump_file, &SuiteCollection::from(vec![suite]))
        .with_context(|| format!("failed to write {}", dump_file.display()))?;
    info!(path = %dump_file.display(), "suite written");

    if summary.failed_variants > 0 {
        anyhow::bail!("{} variant(s) failed", summary.failed_variants);
    }
    Ok(())
}

fn print_outcome(suite: &Suite) {
    for benchmark in suite.benchmarks() {
        for subject in benchmark.subjects() {
            for variant in subject.variants() {
                let label = format!(
                    "{}::{} #{}",
                    benchmark.class(),
                    subject.name(),
                    variant.parameter_set().index()
                );
                match (variant.error_stack(), variant.stats()) {
                    (Some(stack), _) => {
                        println!("{label}: ERROR {}: {}", stack.top().kind, stack.top().message)
                    }
                    (None, Ok(stats)) => println!(
                        "{label}: mean {:.3}µs/rev, rstdev {:.2}%, {} rejected",
                        stats.mean,
                        stats.rstdev,
                        variant.reject_count()
                    ),
                    (None, Err(e)) => println!("{label}: {e}"),
                }
            }
        }
    }
}
