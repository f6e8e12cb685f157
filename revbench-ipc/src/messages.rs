//! IPC Message Types
//!
//! The harness sends one [`SupervisorCommand::Run`] per iteration; the worker answers
//! with exactly one [`WorkerMessage::Outcome`] or [`WorkerMessage::Failure`].

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// A backend toggle for a single run, e.g. `trace.output=/tmp/x.jsonl`
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct BackendOption {
    /// Option name
    pub key: String,
    /// Option value
    pub value: String,
}

/// Everything the worker needs to measure one iteration
#[derive(Debug, Clone, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct RunSpec {
    /// Benchmark the subject belongs to
    pub benchmark: String,
    /// Subject name
    pub subject: String,
    /// Parameter set, JSON encoded
    pub parameters_json: String,
    /// Measured revolutions
    pub revolutions: u32,
    /// Unmeasured revolutions run first
    pub warmup: u32,
    /// Hooks run before the measured loop
    pub before: Vec<String>,
    /// Hooks run after the measured loop
    pub after: Vec<String>,
    /// Backend toggles for this run only
    pub options: Vec<BackendOption>,
}

impl RunSpec {
    /// Create a spec with no hooks and no backend options
    pub fn new(
        benchmark: impl Into<String>,
        subject: impl Into<String>,
        parameters_json: impl Into<String>,
        revolutions: u32,
        warmup: u32,
    ) -> Self {
        Self {
            benchmark: benchmark.into(),
            subject: subject.into(),
            parameters_json: parameters_json.into(),
            revolutions,
            warmup,
            before: Vec::new(),
            after: Vec::new(),
            options: Vec::new(),
        }
    }

    /// Total revolutions the worker executes: warmup plus measured
    pub fn loop_bound(&self) -> u64 {
        u64::from(self.revolutions) + u64::from(self.warmup)
    }

    /// Set a backend option, replacing an earlier value for the same key
    pub fn set_option(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.options.iter_mut().find(|option| option.key == key) {
            Some(option) => option.value = value,
            None => self.options.push(BackendOption { key, value }),
        }
    }

    /// Value of a backend option
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.key == key)
            .map(|option| option.value.as_str())
    }
}

/// Worker capabilities advertised during handshake
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct WorkerCapabilities {
    /// Protocol version for compatibility
    pub protocol_version: u32,
    /// Whether the worker counts allocated bytes
    pub has_alloc_tracking: bool,
    /// Process id, for diagnostics
    pub pid: u32,
}

impl Default for WorkerCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: crate::PROTOCOL_VERSION,
            has_alloc_tracking: false,
            pid: std::process::id(),
        }
    }
}

/// Measurements of a successful run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct RunOutcome {
    /// Wall time of the whole loop, in microseconds
    pub time_us: u64,
    /// Peak memory above the pre-loop baseline, in bytes
    pub memory_bytes: u64,
}

/// Categories of run failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum FailureKind {
    /// The subject panicked
    Panic,
    /// A before/after hook failed or is unknown
    Hook,
    /// No subject registered under the requested name
    SubjectNotFound,
    /// The run spec is malformed (e.g. bad parameters)
    InvalidSpec,
    /// A backend artifact could not be written
    Artifact,
}

impl FailureKind {
    /// Stable name, used as the error classification
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Panic => "Panic",
            FailureKind::Hook => "HookFailed",
            FailureKind::SubjectNotFound => "SubjectNotFound",
            FailureKind::InvalidSpec => "InvalidSpec",
            FailureKind::Artifact => "ArtifactFailed",
        }
    }
}

/// Messages sent from the harness to the worker
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum SupervisorCommand {
    /// Measure one iteration
    Run(RunSpec),
    /// Exit cleanly
    Shutdown,
}

/// Messages sent from the worker to the harness
#[derive(Debug, Clone, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub enum WorkerMessage {
    /// Handshake
    Hello(WorkerCapabilities),
    /// The run completed
    Outcome(RunOutcome),
    /// The run failed
    Failure {
        /// Error category
        kind: FailureKind,
        /// Human-readable message
        message: String,
        /// Optional backtrace
        backtrace: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_bound_includes_warmup() {
        assert_eq!(RunSpec::new("b", "s", "{}", 10, 1).loop_bound(), 11);
        assert_eq!(RunSpec::new("b", "s", "{}", u32::MAX, u32::MAX).loop_bound(), 2 * u64::from(u32::MAX));
    }

    #[test]
    fn test_set_option_replaces() {
        let mut spec = RunSpec::new("b", "s", "{}", 1, 0);
        spec.set_option("trace.output", "/tmp/a");
        spec.set_option("trace.output", "/tmp/b");

        assert_eq!(spec.options.len(), 1);
        assert_eq!(spec.option("trace.output"), Some("/tmp/b"));
        assert_eq!(spec.option("missing"), None);
    }

    #[test]
    fn test_capabilities_default() {
        let caps = WorkerCapabilities::default();
        assert_eq!(caps.protocol_version, crate::PROTOCOL_VERSION);
        assert_eq!(caps.pid, std::process::id());
    }
}
