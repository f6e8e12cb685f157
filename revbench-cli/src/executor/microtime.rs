//! Wall-clock executor: net loop time plus peak memory.

use super::{
    Executor, ExecutorConfig, ExecutorError, IsolationBackend, LaunchTarget, run_isolated,
};
use revbench_model::{Iteration, MemoryResult, ResultCollection, TimeResult};
use serde::Deserialize;
use std::sync::Arc;

/// Accepts no options; any key is a configuration error
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MicrotimeOptions {}

/// Attaches a [`TimeResult`] and a [`MemoryResult`] to each iteration
pub struct MicrotimeExecutor {
    backend: Arc<dyn IsolationBackend>,
}

impl MicrotimeExecutor {
    /// Configuration name
    pub const NAME: &'static str = "microtime";

    /// Executor running iterations through `backend`
    pub fn new(backend: Arc<dyn IsolationBackend>) -> Self {
        Self { backend }
    }
}

impl Executor for MicrotimeExecutor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn validate(&self, config: &ExecutorConfig) -> Result<(), ExecutorError> {
        config.parse::<MicrotimeOptions>().map(|_| ())
    }

    fn launch(
        &self,
        target: &LaunchTarget,
        iteration: &mut Iteration,
        config: &ExecutorConfig,
    ) -> Result<(), ExecutorError> {
        let spec = target.run_spec(iteration);
        run_isolated(self.backend.as_ref(), &spec, iteration, config, |outcome| {
            let mut results = ResultCollection::new();
            results.add(TimeResult::new(outcome.time_us))?;
            results.add(MemoryResult::new(outcome.memory_bytes))?;
            Ok(results)
        })
    }
}
