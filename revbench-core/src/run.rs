//! Measured Run
//!
//! Executes one iteration as described by a [`RunSpec`]: before hooks, the
//! revolution loop (warmup included), after hooks. Only the loop is timed.

use crate::allocator::{current_allocation, peak_allocation, reset_peak};
use crate::measure::Timer;
use crate::registry::{HookDef, SubjectFn, find_hook, find_subject};
use crate::trace::{TraceEntry, write_trace};
use revbench_ipc::{FailureKind, RunOutcome, RunSpec, TRACE_OUTPUT_OPTION};
use revbench_model::ParameterSet;
use std::path::Path;

/// Why a run produced no outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailure {
    /// Failure category
    pub kind: FailureKind,
    /// Human-readable message
    pub message: String,
    /// Backtrace, when one was captured
    pub backtrace: Option<String>,
}

impl RunFailure {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            backtrace: None,
        }
    }
}

struct Measured {
    time_us: u64,
    memory_bytes: u64,
    entries: Vec<TraceEntry>,
}

/// Run one iteration in the current process.
///
/// The loop executes `revolutions + warmup` calls; the reported time covers all of
/// them. Memory is the peak heap growth over the loop, 0 unless the
/// [`TrackingAllocator`](crate::TrackingAllocator) is installed.
pub fn execute_run(spec: &RunSpec) -> Result<RunOutcome, RunFailure> {
    let subject = find_subject(&spec.benchmark, &spec.subject).ok_or_else(|| {
        RunFailure::new(
            FailureKind::SubjectNotFound,
            format!("subject not found: {}::{}", spec.benchmark, spec.subject),
        )
    })?;

    if spec.revolutions == 0 {
        return Err(RunFailure::new(
            FailureKind::InvalidSpec,
            "revolutions must be greater than zero",
        ));
    }

    let params = ParameterSet::from_json(&spec.parameters_json).map_err(|e| {
        RunFailure::new(FailureKind::InvalidSpec, format!("invalid parameters: {e}"))
    })?;

    let before = resolve_hooks(&spec.benchmark, &spec.before)?;
    let after = resolve_hooks(&spec.benchmark, &spec.after)?;
    let trace_path = spec.option(TRACE_OUTPUT_OPTION).map(Path::new);

    run_hooks(&before, &params)?;

    let measured = guarded(FailureKind::Panic, || {
        measure_loop(
            subject.subject_fn,
            &params,
            spec.loop_bound(),
            u64::from(spec.warmup),
            trace_path.is_some(),
        )
    })?;

    run_hooks(&after, &params)?;

    if let Some(path) = trace_path {
        write_trace(path, &measured.entries)
            .map_err(|e| RunFailure::new(FailureKind::Artifact, e.to_string()))?;
    }

    Ok(RunOutcome {
        time_us: measured.time_us,
        memory_bytes: measured.memory_bytes,
    })
}

fn measure_loop(
    subject_fn: SubjectFn,
    params: &ParameterSet,
    loop_bound: u64,
    warmup: u64,
    trace: bool,
) -> Measured {
    // reserved up front so recording does not allocate inside the loop
    let mut entries = Vec::with_capacity(if trace { loop_bound as usize } else { 0 });

    let baseline = current_allocation();
    reset_peak();
    let timer = Timer::start();

    if trace {
        for revolution in 0..loop_bound {
            let call = Timer::start();
            subject_fn(std::hint::black_box(params));
            entries.push(TraceEntry {
                revolution,
                warmup: revolution < warmup,
                time_ns: u64::try_from(call.elapsed().as_nanos()).unwrap_or(u64::MAX),
                memory_bytes: current_allocation().saturating_sub(baseline),
            });
        }
    } else {
        for _ in 0..loop_bound {
            subject_fn(std::hint::black_box(params));
        }
    }

    Measured {
        time_us: timer.elapsed_micros(),
        memory_bytes: peak_allocation().saturating_sub(baseline),
        entries,
    }
}

fn resolve_hooks(
    benchmark: &str,
    names: &[String],
) -> Result<Vec<&'static HookDef>, RunFailure> {
    names
        .iter()
        .map(|name| {
            find_hook(benchmark, name).ok_or_else(|| {
                RunFailure::new(
                    FailureKind::Hook,
                    format!("hook not found: {benchmark}::{name}"),
                )
            })
        })
        .collect()
}

fn run_hooks(hooks: &[&'static HookDef], params: &ParameterSet) -> Result<(), RunFailure> {
    for hook in hooks {
        guarded(FailureKind::Hook, || (hook.hook_fn)(params))?.map_err(|e| {
            RunFailure::new(FailureKind::Hook, format!("hook {} failed: {e}", hook.name))
        })?;
    }
    Ok(())
}

fn guarded<T>(kind: FailureKind, f: impl FnOnce() -> T) -> Result<T, RunFailure> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).map_err(|panic| {
        let message = if let Some(s) = panic.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };

        let backtrace = std::backtrace::Backtrace::capture();
        RunFailure {
            kind,
            message,
            backtrace: match backtrace.status() {
                std::backtrace::BacktraceStatus::Captured => Some(backtrace.to_string()),
                _ => None,
            },
        }
    })
}
