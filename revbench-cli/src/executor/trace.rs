//! Trace Executor
//!
//! Asks the worker to record every revolution into a JSON-lines artifact, then
//! folds the artifact into time, memory and function-call results. The artifact
//! is removed afterwards unless `keep_artifacts` is set.

use super::{
    Executor, ExecutorConfig, ExecutorError, IsolationBackend, LaunchTarget, run_isolated,
};
use revbench_core::{TraceSummary, read_trace};
use revbench_ipc::TRACE_OUTPUT_OPTION;
use revbench_model::{FunctionCallsResult, Iteration, MemoryResult, ResultCollection, TimeResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceOptions {
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default)]
    keep_artifacts: bool,
}

fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join("revbench-trace")
}

/// Per-revolution tracing executor
pub struct TraceExecutor {
    backend: Arc<dyn IsolationBackend>,
}

impl TraceExecutor {
    /// Configuration name
    pub const NAME: &'static str = "trace";

    /// Executor running iterations through `backend`
    pub fn new(backend: Arc<dyn IsolationBackend>) -> Self {
        Self { backend }
    }
}

fn artifact_name(target: &LaunchTarget, iteration: &Iteration) -> String {
    let raw = format!(
        "{}-{}-v{}-i{}.jsonl",
        target.benchmark,
        target.subject,
        iteration.variant().variant,
        iteration.index()
    );
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn fold_artifact(path: &Path) -> Result<ResultCollection, ExecutorError> {
    let entries = read_trace(path).map_err(|e| ExecutorError::Artifact(e.to_string()))?;
    let summary = TraceSummary::from_entries(&entries);

    let mut results = ResultCollection::new();
    results.add(TimeResult::new(summary.time_us))?;
    results.add(MemoryResult::new(summary.memory_bytes))?;
    results.add(FunctionCallsResult::new(summary.calls))?;
    Ok(results)
}

impl Executor for TraceExecutor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, config: &ExecutorConfig) -> Result<(), ExecutorError> {
        config.parse::<TraceOptions>().map(|_| ())
    }

    fn launch(
        &self,
        target: &LaunchTarget,
        iteration: &mut Iteration,
        config: &ExecutorConfig,
    ) -> Result<(), ExecutorError> {
        let options: TraceOptions = config.parse()?;
        std::fs::create_dir_all(&options.output_dir).map_err(|e| {
            ExecutorError::Artifact(format!("{}: {e}", options.output_dir.display()))
        })?;

        let artifact = options.output_dir.join(artifact_name(target, iteration));
        let mut spec = target.run_spec(iteration);
        spec.set_option(TRACE_OUTPUT_OPTION, artifact.display().to_string());

        let outcome = run_isolated(self.backend.as_ref(), &spec, iteration, config, |_| {
            fold_artifact(&artifact)
        });

        if !options.keep_artifacts && artifact.exists() {
            if let Err(e) = std::fs::remove_file(&artifact) {
                warn!(path = %artifact.display(), error = %e, "failed to remove trace artifact");
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{InProcessBackend, IsolatedOutcome};
    use crate::executor::tests::ScriptedBackend;
    use revbench_core::{SubjectDef, register_subject};
    use revbench_model::{FunctionCallsResult, IterationState, ParameterSet, Variant, VariantId};
    use serde_json::{Map, Value};

    fn traced(_: &ParameterSet) {
        std::hint::black_box((0..64).sum::<u64>());
    }

    register_subject!(SubjectDef::new("trace_executor_test", "traced", traced));

    fn config(dir: &Path, keep: bool) -> ExecutorConfig {
        let mut options = Map::new();
        options.insert("output_dir".into(), Value::from(dir.display().to_string()));
        options.insert("keep_artifacts".into(), Value::from(keep));
        ExecutorConfig::new(options)
    }

    fn variant(revs: u32, warmup: u32) -> Variant {
        let id = VariantId {
            benchmark: 0,
            subject: 0,
            variant: 3,
        };
        let mut variant = Variant::new(id, ParameterSet::new(0), revs, warmup, None).unwrap();
        variant.spawn_iterations(1);
        variant
    }

    #[test]
    fn test_counts_every_call_including_warmup() {
        let dir = tempfile::tempdir().unwrap();
        let executor = TraceExecutor::new(Arc::new(InProcessBackend));
        let target = LaunchTarget::new("trace_executor_test", "traced", &ParameterSet::new(0), 1).unwrap();
        let mut variant = variant(10, 1);
        let iteration = variant.iteration_mut(0).unwrap();

        executor.launch(&target, iteration, &config(dir.path(), false)).unwrap();

        assert_eq!(iteration.state(), IterationState::Succeeded);
        let calls = iteration.results().get_as::<FunctionCallsResult>().unwrap();
        assert_eq!(calls.calls(), 11);
        assert!(iteration.time().is_ok());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_keeps_artifact_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let executor = TraceExecutor::new(Arc::new(InProcessBackend));
        let target = LaunchTarget::new("trace_executor_test", "traced", &ParameterSet::new(0), 0).unwrap();
        let mut variant = variant(2, 0);

        executor
            .launch(&target, variant.iteration_mut(0).unwrap(), &config(dir.path(), true))
            .unwrap();

        let kept = dir.path().join("trace_executor_test-traced-v3-i0.jsonl");
        assert_eq!(read_trace(&kept).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_artifact_fails_iteration() {
        let dir = tempfile::tempdir().unwrap();
        let executor = TraceExecutor::new(ScriptedBackend::returning(Ok(IsolatedOutcome::default())));
        let target = LaunchTarget::new("bench", "subject", &ParameterSet::new(0), 0).unwrap();
        let mut variant = variant(1, 0);
        let iteration = variant.iteration_mut(0).unwrap();

        let err = executor.launch(&target, iteration, &config(dir.path(), false)).unwrap_err();
        assert!(matches!(err, ExecutorError::Artifact(_)));
        assert_eq!(iteration.state(), IterationState::Failed);
        assert!(iteration.results().is_empty());
    }

    #[test]
    fn test_artifact_name_is_sanitized() {
        let target = LaunchTarget::new("my bench", "a/b", &ParameterSet::new(0), 0).unwrap();
        let variant = variant(1, 0);
        assert_eq!(
            artifact_name(&target, &variant.iterations()[0]),
            "my_bench-a_b-v3-i0.jsonl"
        );
    }

    #[test]
    fn test_unknown_option() {
        let executor = TraceExecutor::new(Arc::new(InProcessBackend));
        let mut options = Map::new();
        options.insert("sampling".into(), Value::from(true));
        assert!(executor.validate(&ExecutorConfig::new(options)).is_err());
    }
}
