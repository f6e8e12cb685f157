#![warn(missing_docs)]
//! # revbench
//!
//! Micro-benchmark harness measuring every iteration in its own process.
//!
//! - **Process isolation**: each iteration runs in a freshly re-executed worker;
//!   a crash, hang or panic fails that iteration and nothing else
//! - **Noise detection**: anything a subject prints fails the iteration
//! - **Typed results**: time, memory, function calls and computed statistics, at
//!   most one of each kind per iteration
//! - **Rejection and retry**: iterations deviating beyond a threshold are
//!   re-measured until the sample settles
//! - **Suite documents**: runs are persisted as XML and can be loaded back for
//!   comparison
//!
//! ## Quick Start
//!
//! ```ignore
//! use revbench::prelude::*;
//!
//! #[global_allocator]
//! static GLOBAL: TrackingAllocator = TrackingAllocator;
//!
//! fn sum_vec(params: &ParameterSet) {
//!     let size = params.parse::<u64>("size").unwrap_or(100);
//!     std::hint::black_box((0..size).collect::<Vec<_>>().iter().sum::<u64>());
//! }
//!
//! register_subject!(SubjectDef::new("vectors", "sum", sum_vec).revs(100).iterations(10));
//!
//! fn main() {
//!     if let Err(e) = revbench::run() {
//!         eprintln!("Error: {e:#}");
//!         std::process::exit(1);
//!     }
//! }
//! ```

pub use revbench_cli::{
    Cli, Executor, ExecutorConfig, ExecutorError, InProcessBackend, IsolationBackend,
    MicrotimeExecutor, ProcessBackend, RevbenchConfig, RunSummary, Runner, RunnerOptions,
    TraceExecutor, run, run_with_cli,
};
pub use revbench_core::{
    HookDef, HookResult, SubjectDef, TrackingAllocator, register_hook, register_subject,
};
pub use revbench_model::{
    Distribution, ErrorRecord, ErrorStack, Iteration, ParameterSet, ResultCollection, ResultKind,
    Suite, SuiteCollection, Variant,
};
pub use revbench_serializer::{decode_file, decode_files, encode_file};

/// Numeric reduction used by variants
pub use revbench_stats as stats;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        HookDef, HookResult, ParameterSet, SubjectDef, TrackingAllocator, register_hook,
        register_subject,
    };
}
