//! Isolation Backends
//!
//! An isolation backend turns a [`RunSpec`] into measurements taken somewhere the
//! harness cannot be disturbed by the subject. Executors only see this trait, so a
//! backend can be swapped without touching variants or statistics.

use revbench_core::execute_run;
use revbench_ipc::{FailureKind, RunSpec};
use std::time::Duration;
use thiserror::Error;

/// What an isolated run reports back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IsolatedOutcome {
    /// Wall time of the whole loop, in microseconds
    pub time_us: u64,
    /// Peak memory growth, in bytes
    pub memory_bytes: u64,
    /// Anything the subject printed; empty for a clean run
    pub diagnostic_output: String,
}

/// Why an isolated run produced no outcome
#[derive(Debug, Error)]
pub enum IsolationError {
    /// The isolated context could not be started
    #[error("failed to launch isolated run: {0}")]
    Launch(String),

    /// The run was killed, timed out or vanished
    #[error("{reason}")]
    Aborted {
        /// What happened
        reason: String,
        /// Output captured before the run ended
        diagnostic_output: String,
    },

    /// The run reported a failure of its own
    #[error("{message}")]
    RunFailed {
        /// Failure category
        kind: FailureKind,
        /// Message from the run
        message: String,
        /// Backtrace captured by the run, if any
        backtrace: Option<String>,
        /// Output captured during the run
        diagnostic_output: String,
    },
}

impl IsolationError {
    /// Abort after `timeout`
    pub fn timed_out(timeout: Duration) -> Self {
        IsolationError::Aborted {
            reason: format!("timed out after {timeout:?}"),
            diagnostic_output: String::new(),
        }
    }
}

/// Runs one iteration in isolation
pub trait IsolationBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Execute `spec` to completion
    fn run(&self, spec: &RunSpec) -> Result<IsolatedOutcome, IsolationError>;
}

/// Runs the subject inside the harness process.
///
/// No isolation and no output capture: useful for debugging subjects and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcessBackend;

impl IsolationBackend for InProcessBackend {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn run(&self, spec: &RunSpec) -> Result<IsolatedOutcome, IsolationError> {
        execute_run(spec)
            .map(|outcome| IsolatedOutcome {
                time_us: outcome.time_us,
                memory_bytes: outcome.memory_bytes,
                diagnostic_output: String::new(),
            })
            .map_err(|failure| IsolationError::RunFailed {
                kind: failure.kind,
                message: failure.message,
                backtrace: failure.backtrace,
                diagnostic_output: String::new(),
            })
    }
}
