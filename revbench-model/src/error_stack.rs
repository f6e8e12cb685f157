//! Error Stack
//!
//! Terminal failure record of a variant. The top entry is the error that ended the
//! measurement; following entries are its causes.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// One recorded error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Human-readable message
    pub message: String,
    /// Classification of the error (e.g. `NoiseDetected`, `Panic`)
    pub kind: String,
    /// Numeric code, 0 when the error carries none
    pub code: i64,
    /// Source file the error is attributed to
    pub file: String,
    /// Source line the error is attributed to
    pub line: u32,
    /// Backtrace, if captured. Never persisted.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub trace: String,
}

impl ErrorRecord {
    /// Create a record with no code, location or trace
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: kind.into(),
            code: 0,
            file: String::new(),
            line: 0,
            trace: String::new(),
        }
    }

    /// Attach a source location
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    /// Attach a numeric code
    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    /// Attach a backtrace
    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }
}

/// Non-empty stack of errors, top first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ErrorRecord>", into = "Vec<ErrorRecord>")]
pub struct ErrorStack {
    errors: Vec<ErrorRecord>,
}

impl ErrorStack {
    /// Create a stack from records ordered top first
    pub fn new(errors: Vec<ErrorRecord>) -> Result<Self, ModelError> {
        if errors.is_empty() {
            return Err(ModelError::EmptyErrorStack);
        }
        Ok(Self { errors })
    }

    /// The error that terminated the measurement
    pub fn top(&self) -> &ErrorRecord {
        // non-empty by construction
        &self.errors[0]
    }

    /// All records, top first
    pub fn errors(&self) -> &[ErrorRecord] {
        &self.errors
    }
}

impl TryFrom<Vec<ErrorRecord>> for ErrorStack {
    type Error = ModelError;

    fn try_from(errors: Vec<ErrorRecord>) -> Result<Self, Self::Error> {
        Self::new(errors)
    }
}

impl From<ErrorStack> for Vec<ErrorRecord> {
    fn from(stack: ErrorStack) -> Self {
        stack.errors
    }
}

impl From<ErrorRecord> for ErrorStack {
    fn from(record: ErrorRecord) -> Self {
        Self {
            errors: vec![record],
        }
    }
}
