//! Executor Protocol
//!
//! An executor measures one [`Iteration`] through an [`IsolationBackend`]:
//!
//! ```text
//! Pending ──begin_launch──▶ Launched ──clean run──▶ Succeeded (results attached)
//!                               └────any error────▶ Failed    (no results)
//! ```
//!
//! Output printed by the subject fails the iteration before any result is
//! attached. Results go in through `add`, so a second launch of a measured
//! iteration is refused.

mod backend;
mod microtime;
mod trace;

pub use backend::{InProcessBackend, IsolatedOutcome, IsolationBackend, IsolationError};
pub use microtime::MicrotimeExecutor;
pub use trace::TraceExecutor;

use revbench_ipc::RunSpec;
use revbench_model::{ErrorRecord, Iteration, ModelError, ParameterSet, ResultCollection};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised while launching an iteration
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Invalid or unknown executor option
    #[error("invalid executor configuration: {0}")]
    Configuration(String),

    /// The isolated context could not be started
    #[error("isolated run could not be launched: {0}")]
    Launch(String),

    /// The subject printed something
    #[error("benchmark made noise: {output}")]
    NoiseDetected {
        /// Captured output
        output: String,
    },

    /// The isolated run was killed or timed out
    #[error("execution aborted: {reason}")]
    Aborted {
        /// What happened
        reason: String,
    },

    /// The subject or one of its hooks failed
    #[error("{kind}: {message}")]
    RunFailed {
        /// Failure classification
        kind: &'static str,
        /// Message from the run
        message: String,
        /// Backtrace captured by the run, if any
        backtrace: Option<String>,
    },

    /// A backend artifact could not be read
    #[error("artifact error: {0}")]
    Artifact(String),

    /// A model contract was violated
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl ExecutorError {
    /// Classification stored as the error record kind
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorError::Configuration(_) => "ConfigurationError",
            ExecutorError::Launch(_) => "IsolationLaunchError",
            ExecutorError::NoiseDetected { .. } => "NoiseDetected",
            ExecutorError::Aborted { .. } => "ExecutionAborted",
            ExecutorError::RunFailed { kind, .. } => *kind,
            ExecutorError::Artifact(_) => "ArtifactError",
            ExecutorError::Model(_) => "ModelError",
        }
    }

    /// Whether the error invalidates the whole run rather than one variant
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecutorError::Configuration(_) | ExecutorError::Model(_))
    }

    /// Error record for an iteration or variant error stack
    pub fn to_record(&self) -> ErrorRecord {
        match self {
            ExecutorError::RunFailed {
                message, backtrace, ..
            } => {
                let record = ErrorRecord::new(self.kind(), message.clone());
                match backtrace {
                    Some(trace) => record.with_trace(trace.clone()),
                    None => record,
                }
            }
            other => ErrorRecord::new(self.kind(), other.to_string()),
        }
    }
}

impl From<IsolationError> for ExecutorError {
    fn from(err: IsolationError) -> Self {
        match err {
            IsolationError::Launch(message) => ExecutorError::Launch(message),
            IsolationError::Aborted {
                reason,
                diagnostic_output,
            } => ExecutorError::Aborted {
                reason: with_output(reason, &diagnostic_output),
            },
            IsolationError::RunFailed {
                kind,
                message,
                backtrace,
                diagnostic_output,
            } => ExecutorError::RunFailed {
                kind: kind.as_str(),
                message: with_output(message, &diagnostic_output),
                backtrace,
            },
        }
    }
}

fn with_output(message: String, output: &str) -> String {
    if output.is_empty() {
        message
    } else {
        format!("{message}\n{output}")
    }
}

/// Invoked with each iteration that received results
pub type IterationCallback = Arc<dyn Fn(&Iteration, &ResultCollection) + Send + Sync>;

/// Executor options plus an optional success callback
#[derive(Clone, Default)]
pub struct ExecutorConfig {
    /// Executor-specific options, validated by [`Executor::validate`]
    pub options: Map<String, Value>,
    /// Called after results are attached
    pub callback: Option<IterationCallback>,
}

impl ExecutorConfig {
    /// Config with options and no callback
    pub fn new(options: Map<String, Value>) -> Self {
        Self {
            options,
            callback: None,
        }
    }

    /// Attach a success callback
    pub fn with_callback(
        mut self,
        callback: impl Fn(&Iteration, &ResultCollection) + Send + Sync + 'static,
    ) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Deserialize the options into a typed schema
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ExecutorError> {
        serde_json::from_value(Value::Object(self.options.clone()))
            .map_err(|e| ExecutorError::Configuration(e.to_string()))
    }
}

impl fmt::Debug for ExecutorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorConfig")
            .field("options", &self.options)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Identity of the subject behind a variant, plus its loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    /// Benchmark name
    pub benchmark: String,
    /// Subject name
    pub subject: String,
    /// Hooks run before the loop
    pub before: Vec<String>,
    /// Hooks run after the loop
    pub after: Vec<String>,
    /// Parameter set, JSON encoded
    pub parameters_json: String,
    /// Warmup revolutions
    pub warmup: u32,
}

impl LaunchTarget {
    /// Target with no hooks
    pub fn new(
        benchmark: impl Into<String>,
        subject: impl Into<String>,
        parameters: &ParameterSet,
        warmup: u32,
    ) -> Result<Self, ExecutorError> {
        Ok(Self {
            benchmark: benchmark.into(),
            subject: subject.into(),
            before: Vec::new(),
            after: Vec::new(),
            parameters_json: parameters
                .to_json()
                .map_err(|e| ExecutorError::Configuration(format!("unencodable parameters: {e}")))?,
            warmup,
        })
    }

    /// Run spec for one iteration
    pub fn run_spec(&self, iteration: &Iteration) -> RunSpec {
        let mut spec = RunSpec::new(
            self.benchmark.clone(),
            self.subject.clone(),
            self.parameters_json.clone(),
            iteration.revolutions(),
            self.warmup,
        );
        spec.before = self.before.clone();
        spec.after = self.after.clone();
        spec
    }
}

/// Measures iterations in isolation
pub trait Executor: Send + Sync {
    /// Name used in configuration
    fn name(&self) -> &'static str;

    /// Check options against the executor's schema; unknown keys are rejected
    fn validate(&self, config: &ExecutorConfig) -> Result<(), ExecutorError>;

    /// Measure `iteration` and attach its results
    fn launch(
        &self,
        target: &LaunchTarget,
        iteration: &mut Iteration,
        config: &ExecutorConfig,
    ) -> Result<(), ExecutorError>;
}

/// Build an executor by name
pub fn executor_for(
    name: &str,
    backend: Arc<dyn IsolationBackend>,
) -> Result<Box<dyn Executor>, ExecutorError> {
    match name {
        MicrotimeExecutor::NAME => Ok(Box::new(MicrotimeExecutor::new(backend))),
        TraceExecutor::NAME => Ok(Box::new(TraceExecutor::new(backend))),
        other => Err(ExecutorError::Configuration(format!(
            "unknown executor \"{other}\" (expected \"{}\" or \"{}\")",
            MicrotimeExecutor::NAME,
            TraceExecutor::NAME
        ))),
    }
}

/// Drive one iteration through its states.
///
/// `build` turns a clean outcome into results; it is not called when the run
/// failed or made noise. On any error the iteration ends `Failed` with nothing
/// attached.
pub(crate) fn run_isolated<F>(
    backend: &dyn IsolationBackend,
    spec: &RunSpec,
    iteration: &mut Iteration,
    config: &ExecutorConfig,
    build: F,
) -> Result<(), ExecutorError>
where
    F: FnOnce(&IsolatedOutcome) -> Result<ResultCollection, ExecutorError>,
{
    iteration.begin_launch()?;
    debug!(
        backend = backend.name(),
        subject = %spec.subject,
        iteration = iteration.index(),
        loop_bound = spec.loop_bound(),
        "launching iteration"
    );

    let recorded = backend
        .run(spec)
        .map_err(ExecutorError::from)
        .and_then(|outcome| {
            if !outcome.diagnostic_output.is_empty() {
                return Err(ExecutorError::NoiseDetected {
                    output: outcome.diagnostic_output,
                });
            }
            build(&outcome)
        })
        .and_then(|results| Ok(iteration.record_results(results)?));

    match recorded {
        Ok(()) => {
            if let Some(callback) = &config.callback {
                callback(iteration, iteration.results());
            }
            Ok(())
        }
        Err(err) => {
            iteration.fail(err.to_record());
            Err(err)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Backend replaying a scripted outcome and remembering the specs it saw
    pub(crate) struct ScriptedBackend {
        pub outcome: Mutex<Option<Result<IsolatedOutcome, IsolationError>>>,
        pub specs: Mutex<Vec<RunSpec>>,
    }

    impl ScriptedBackend {
        pub(crate) fn returning(outcome: Result<IsolatedOutcome, IsolationError>) -> Arc<Self> {
            Arc::new(Self {
                outcome: Mutex::new(Some(outcome)),
                specs: Mutex::new(Vec::new()),
            })
        }
    }

    impl IsolationBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn run(&self, spec: &RunSpec) -> Result<IsolatedOutcome, IsolationError> {
            self.specs.lock().unwrap().push(spec.clone());
            self.outcome
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(IsolatedOutcome::default()))
        }
    }

    #[test]
    fn test_unknown_executor() {
        let err = executor_for("xdebug", Arc::new(InProcessBackend)).err().unwrap();
        assert!(matches!(err, ExecutorError::Configuration(_)));
    }

    #[test]
    fn test_isolation_errors_map_to_taxonomy() {
        let err = ExecutorError::from(IsolationError::Launch("no such file".into()));
        assert_eq!(err.kind(), "IsolationLaunchError");

        let err = ExecutorError::from(IsolationError::timed_out(std::time::Duration::from_secs(1)));
        assert_eq!(err.kind(), "ExecutionAborted");
        assert!(err.to_string().starts_with("execution aborted"));

        let err = ExecutorError::from(IsolationError::RunFailed {
            kind: revbench_ipc::FailureKind::Panic,
            message: "boom".into(),
            backtrace: None,
            diagnostic_output: String::new(),
        });
        assert_eq!(err.to_record().kind, "Panic");
        assert_eq!(err.to_record().message, "boom");
        assert!(err.to_record().trace.is_empty());
    }

    #[test]
    fn test_worker_backtrace_reaches_the_record() {
        let err = ExecutorError::from(IsolationError::RunFailed {
            kind: revbench_ipc::FailureKind::Panic,
            message: "boom".into(),
            backtrace: Some("0: demo::panicking\n1: revbench_core::run".into()),
            diagnostic_output: String::new(),
        });
        let record = err.to_record();
        assert_eq!(record.message, "boom");
        assert_eq!(record.trace, "0: demo::panicking\n1: revbench_core::run");
    }

    #[test]
    fn test_model_error_after_the_run_fails_the_iteration() {
        use revbench_model::{IterationState, ResultKind, Variant, VariantId};

        let id = VariantId {
            benchmark: 0,
            subject: 0,
            variant: 0,
        };
        let mut variant = Variant::new(id, ParameterSet::new(0), 1, 0, None).unwrap();
        variant.spawn_iterations(1);
        let iteration = variant.iteration_mut(0).unwrap();
        let backend = ScriptedBackend::returning(Ok(IsolatedOutcome::default()));
        let spec = RunSpec::new("bench", "subject", "{}", 1, 0);

        let err = run_isolated(
            backend.as_ref(),
            &spec,
            iteration,
            &ExecutorConfig::default(),
            |_| Err(ModelError::ResultAlreadySet { kind: ResultKind::Time }.into()),
        )
        .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(iteration.state(), IterationState::Failed);
        assert_eq!(iteration.failure().unwrap().kind, "ModelError");
        assert!(iteration.results().is_empty());
    }

    #[test]
    fn test_noise_message() {
        let err = ExecutorError::NoiseDetected {
            output: "hello".into(),
        };
        assert_eq!(err.to_string(), "benchmark made noise: hello");
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_config_parse_rejects_unknown_keys() {
        #[derive(Debug, serde::Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Schema {
            #[allow(dead_code)]
            output_dir: Option<String>,
        }

        let mut options = Map::new();
        options.insert("output_dir".into(), Value::from("/tmp"));
        assert!(ExecutorConfig::new(options.clone()).parse::<Schema>().is_ok());

        options.insert("colour".into(), Value::from("blue"));
        assert!(matches!(
            ExecutorConfig::new(options).parse::<Schema>(),
            Err(ExecutorError::Configuration(_))
        ));
    }
}
