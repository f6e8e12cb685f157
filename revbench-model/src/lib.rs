#![warn(missing_docs)]
//! revbench Result Model
//!
//! Typed measurements and the containers that hold them:
//! - [`MetricResult`] kinds with their flat field mappings
//! - [`ResultCollection`], at most one result per kind
//! - [`Iteration`] and [`Variant`], with statistics and the rejection pass
//! - the [`Suite`] hierarchy walked by serializers

mod collection;
mod environment;
mod error;
mod error_stack;
mod iteration;
mod parameters;
mod result;
mod suite;
mod variant;

pub use collection::ResultCollection;
pub use environment::Information;
pub use error::ModelError;
pub use error_stack::{ErrorRecord, ErrorStack};
pub use iteration::{Iteration, IterationState, VariantId};
pub use parameters::{ParameterSet, ParameterValue};
pub use result::{
    ComputedResult, FieldValue, FunctionCallsResult, MemoryResult, MetricResult,
    RejectionCountResult, ResultKind, TimeResult, TypedResult,
};
pub use revbench_stats::Distribution;
pub use suite::{Benchmark, Subject, SubjectOptions, Suite, SuiteCollection};
pub use variant::Variant;
