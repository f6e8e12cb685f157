//! Model Errors

use crate::result::ResultKind;
use crate::IterationState;
use thiserror::Error;

/// Errors raised by the result model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// A result of this kind is already present in the collection
    #[error("result of kind \"{kind}\" has already been set")]
    ResultAlreadySet { kind: ResultKind },

    /// No result of this kind is present in the collection
    #[error("result of kind \"{kind}\" has not been set")]
    ResultNotSet { kind: ResultKind },

    /// The kind does not declare the requested field
    #[error("result kind \"{kind}\" has no field \"{field}\"")]
    UnknownField { kind: ResultKind, field: String },

    /// A field needed to rebuild a result is missing
    #[error("missing field \"{field}\" for result kind \"{kind}\"")]
    MissingField { kind: ResultKind, field: &'static str },

    /// A field value could not be parsed
    #[error("invalid value {value:?} for field \"{field}\" of result kind \"{kind}\"")]
    InvalidField {
        kind: ResultKind,
        field: &'static str,
        value: String,
    },

    /// Statistics were queried before `compute_stats` produced any
    #[error("no statistics have yet been computed for this variant")]
    StatsNotComputed,

    /// Statistics were queried on a variant whose measurement failed
    #[error("cannot retrieve stats when an error stack is present")]
    StatsWithErrorStack,

    /// The variant already terminated with an error stack
    #[error("variant already has an error stack")]
    ErrorStackAlreadySet,

    /// An error stack needs at least one error
    #[error("an error stack must contain at least one error")]
    EmptyErrorStack,

    /// Revolutions must be a positive integer
    #[error("revolutions must be greater than zero")]
    InvalidRevolutions,

    /// No iteration exists at this index
    #[error("iteration {index} does not exist")]
    IterationNotFound { index: usize },

    /// The iteration cannot make this state transition
    #[error("iteration {index} cannot be launched from state {state:?}")]
    InvalidTransition { index: usize, state: IterationState },
}
