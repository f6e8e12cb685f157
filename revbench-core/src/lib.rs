#![warn(missing_docs)]
//! revbench Core - Worker Runtime
//!
//! Everything that runs on the measured side of the isolation boundary:
//! - Subject and hook registry, populated at link time through `inventory`
//! - The measured revolution loop with before/after hooks
//! - Global allocator interceptor for peak memory
//! - Per-revolution trace artifacts for the trace executor
//! - The worker main loop answering run commands over IPC

mod allocator;
mod measure;
mod registry;
mod run;
mod trace;
mod worker;

pub use allocator::{TrackingAllocator, current_allocation, is_tracking_active, peak_allocation, reset_peak};
pub use measure::{Timer, pin_to_cpu};
pub use registry::{
    HookDef, HookFn, HookResult, SubjectDef, SubjectFn, default_parameters, find_hook,
    find_subject, subjects,
};
pub use run::{RunFailure, execute_run};
pub use trace::{TraceEntry, TraceError, TraceSummary, read_trace};
pub use worker::{IPC_FD_ENV, WorkerMain};

#[doc(hidden)]
pub use inventory;

/// Register a [`SubjectDef`]
///
/// ```ignore
/// fn sort_small(params: &ParameterSet) { /* ... */ }
///
/// revbench_core::register_subject!(
///     SubjectDef::new("sorting", "small", sort_small).revs(100).iterations(5)
/// );
/// ```
#[macro_export]
macro_rules! register_subject {
    ($def:expr) => {
        $crate::inventory::submit! { $def }
    };
}

/// Register a [`HookDef`]
#[macro_export]
macro_rules! register_hook {
    ($def:expr) => {
        $crate::inventory::submit! { $def }
    };
}
