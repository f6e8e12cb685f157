//! Variant
//!
//! One measurement scenario of a subject: a parameter set with fixed revolutions and
//! warmup. Owns its iterations and the statistical reduction over them.
//!
//! A variant ends in exactly one of two terminal states. Either its iterations were
//! measured and `compute_stats` reduced them, or an [`ErrorStack`] records why the
//! measurement failed; the two never coexist.

use crate::collection::ResultCollection;
use crate::error::ModelError;
use crate::error_stack::ErrorStack;
use crate::iteration::{Iteration, VariantId};
use crate::parameters::ParameterSet;
use crate::result::ResultKind;
use revbench_stats::{Distribution, compute_distribution, screen_deviations};

/// A configured measurement scenario and its iterations
#[derive(Debug, Clone)]
pub struct Variant {
    id: VariantId,
    parameter_set: ParameterSet,
    revolutions: u32,
    warmup: u32,
    retry_threshold: Option<f64>,
    iterations: Vec<Iteration>,
    error_stack: Option<ErrorStack>,
    stats: Option<Distribution>,
    rejects: Vec<usize>,
}

impl Variant {
    /// Create an empty variant. Revolutions must be positive.
    pub fn new(
        id: VariantId,
        parameter_set: ParameterSet,
        revolutions: u32,
        warmup: u32,
        retry_threshold: Option<f64>,
    ) -> Result<Self, ModelError> {
        if revolutions == 0 {
            return Err(ModelError::InvalidRevolutions);
        }
        Ok(Self {
            id,
            parameter_set,
            revolutions,
            warmup,
            retry_threshold,
            iterations: Vec::new(),
            error_stack: None,
            stats: None,
            rejects: Vec::new(),
        })
    }

    /// Address of this variant in its suite
    pub fn id(&self) -> VariantId {
        self.id
    }

    /// Parameters handed to the subject
    pub fn parameter_set(&self) -> &ParameterSet {
        &self.parameter_set
    }

    /// Measured revolutions per iteration
    pub fn revolutions(&self) -> u32 {
        self.revolutions
    }

    /// Unmeasured revolutions run ahead of the measured ones
    pub fn warmup(&self) -> u32 {
        self.warmup
    }

    /// Rejection threshold in percent, `None` when rejection is disabled
    pub fn retry_threshold(&self) -> Option<f64> {
        self.retry_threshold
    }

    /// Append `count` pending iterations
    pub fn spawn_iterations(&mut self, count: usize) {
        for _ in 0..count {
            let index = self.iterations.len();
            self.iterations
                .push(Iteration::new(index, self.id, self.revolutions));
        }
    }

    /// Append one iteration carrying `results` and return it
    pub fn create_iteration(
        &mut self,
        results: ResultCollection,
    ) -> Result<&mut Iteration, ModelError> {
        let mut iteration = Iteration::new(self.iterations.len(), self.id, self.revolutions);
        iteration.record_results(results)?;
        self.iterations.push(iteration);
        let last = self.iterations.len() - 1;
        Ok(&mut self.iterations[last])
    }

    /// Iterations in index order
    pub fn iterations(&self) -> &[Iteration] {
        &self.iterations
    }

    /// Iteration at `index`
    pub fn iteration(&self, index: usize) -> Result<&Iteration, ModelError> {
        self.iterations
            .get(index)
            .ok_or(ModelError::IterationNotFound { index })
    }

    /// Mutable iteration at `index`
    pub fn iteration_mut(&mut self, index: usize) -> Result<&mut Iteration, ModelError> {
        self.iterations
            .get_mut(index)
            .ok_or(ModelError::IterationNotFound { index })
    }

    /// Reduce the measured iterations to statistics and run the rejection pass.
    ///
    /// Every measured iteration gets a Computed result. Iterations that failed are
    /// left out of the sample. Without any measured iteration the variant is left
    /// without statistics. Calling it again over the same raw results yields the
    /// same outcome.
    pub fn compute_stats(&mut self) {
        self.stats = None;
        self.rejects.clear();
        if self.error_stack.is_some() {
            return;
        }

        let measured: Vec<(usize, f64)> = self
            .iterations
            .iter()
            .filter(|iteration| iteration.is_measured())
            .filter_map(|iteration| {
                iteration
                    .rev_time()
                    .ok()
                    .map(|rev_time| (iteration.index(), rev_time))
            })
            .collect();

        let samples: Vec<f64> = measured.iter().map(|(_, rev_time)| *rev_time).collect();
        let Some(distribution) = compute_distribution(&samples) else {
            return;
        };

        let threshold = self.retry_threshold.unwrap_or(0.0);
        let screened = screen_deviations(&samples, &distribution, threshold);

        for ((index, _), verdict) in measured.iter().zip(screened) {
            self.iterations[*index].apply_review(
                verdict.z_value,
                verdict.deviation,
                verdict.rejected,
            );
            if verdict.rejected {
                self.rejects.push(*index);
            }
        }
        self.stats = Some(distribution);
    }

    /// Distribution of per-revolution times from the last `compute_stats`
    pub fn stats(&self) -> Result<&Distribution, ModelError> {
        if self.error_stack.is_some() {
            return Err(ModelError::StatsWithErrorStack);
        }
        self.stats.as_ref().ok_or(ModelError::StatsNotComputed)
    }

    /// Indices of iterations rejected by the last rejection pass
    pub fn rejects(&self) -> &[usize] {
        &self.rejects
    }

    /// Number of iterations rejected by the last rejection pass
    pub fn reject_count(&self) -> usize {
        self.rejects.len()
    }

    /// Values of `field` of result `kind` over the measured iterations
    pub fn metric_values(&self, kind: ResultKind, field: &str) -> Result<Vec<f64>, ModelError> {
        self.iterations
            .iter()
            .filter(|iteration| iteration.is_measured())
            .map(|iteration| Ok(iteration.results().get(kind)?.field(field)?.as_f64()))
            .collect()
    }

    /// Like [`Variant::metric_values`], divided by revolutions
    pub fn metric_values_by_rev(
        &self,
        kind: ResultKind,
        field: &str,
    ) -> Result<Vec<f64>, ModelError> {
        let revolutions = f64::from(self.revolutions);
        Ok(self
            .metric_values(kind, field)?
            .into_iter()
            .map(|value| value / revolutions)
            .collect())
    }

    /// Terminate the variant with an error.
    ///
    /// Iterations and statistics are discarded; a variant takes one error stack at most.
    pub fn set_error_stack(&mut self, stack: ErrorStack) -> Result<(), ModelError> {
        if self.error_stack.is_some() {
            return Err(ModelError::ErrorStackAlreadySet);
        }
        self.iterations.clear();
        self.stats = None;
        self.rejects.clear();
        self.error_stack = Some(stack);
        Ok(())
    }

    /// The error stack, when the measurement failed
    pub fn error_stack(&self) -> Option<&ErrorStack> {
        self.error_stack.as_ref()
    }

    /// Whether the measurement failed
    pub fn has_error_stack(&self) -> bool {
        self.error_stack.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_stack::ErrorRecord;
    use crate::result::{ComputedResult, MemoryResult, MetricResult, TimeResult};

    fn variant(revolutions: u32, threshold: Option<f64>) -> Variant {
        Variant::new(
            VariantId {
                benchmark: 0,
                subject: 0,
                variant: 0,
            },
            ParameterSet::new(0),
            revolutions,
            0,
            threshold,
        )
        .unwrap()
    }

    fn measured(time: u64) -> ResultCollection {
        ResultCollection::from_results([
            MetricResult::from(TimeResult::new(time)),
            MetricResult::from(MemoryResult::new(100)),
        ])
        .unwrap()
    }

    fn reference_variant() -> Variant {
        let mut variant = variant(1, Some(10.0));
        for time in [4, 8, 4, 16] {
            variant.create_iteration(measured(time)).unwrap();
        }
        variant
    }

    #[test]
    fn test_reference_sample() {
        let mut variant = reference_variant();
        variant.compute_stats();

        let stats = variant.stats().unwrap();
        assert!((stats.mean - 8.0).abs() < 1e-12);
        assert!((stats.stdev - 4.898979).abs() < 1e-6);

        let deviations: Vec<f64> = variant
            .iterations()
            .iter()
            .map(|it| it.deviation().unwrap())
            .collect();
        assert_eq!(deviations, vec![-50.0, 0.0, -50.0, 100.0]);

        let z_values: Vec<f64> = variant
            .iterations()
            .iter()
            .map(|it| it.z_value().unwrap())
            .collect();
        for (actual, expected) in z_values.iter().zip([-0.8165, 0.0, -0.8165, 1.6330]) {
            assert!((actual - expected).abs() < 1e-4);
        }

        assert_eq!(variant.rejects(), &[0, 2, 3]);
        let counts: Vec<u32> = variant
            .iterations()
            .iter()
            .map(|it| it.rejection_count())
            .collect();
        assert_eq!(counts, vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut variant = reference_variant();
        variant.compute_stats();
        let first: Vec<ComputedResult> = variant
            .iterations()
            .iter()
            .map(|it| *it.results().get_as::<ComputedResult>().unwrap())
            .collect();

        variant.compute_stats();
        let second: Vec<ComputedResult> = variant
            .iterations()
            .iter()
            .map(|it| *it.results().get_as::<ComputedResult>().unwrap())
            .collect();

        assert_eq!(first, second);
        assert_eq!(variant.reject_count(), 3);
    }

    #[test]
    fn test_zero_iterations_is_noop() {
        let mut variant = variant(1, Some(10.0));
        variant.compute_stats();

        assert!(variant.iterations().is_empty());
        assert_eq!(variant.stats(), Err(ModelError::StatsNotComputed));
    }

    #[test]
    fn test_emptied_sample_drops_stale_stats() {
        let mut variant = variant(1, Some(10.0));
        for time in [10, 30] {
            variant.create_iteration(measured(time)).unwrap();
        }
        variant.compute_stats();
        assert_eq!(variant.rejects(), &[0, 1]);

        for index in 0..2 {
            variant.iteration_mut(index).unwrap().reset();
        }
        variant.compute_stats();

        assert_eq!(variant.stats(), Err(ModelError::StatsNotComputed));
        assert!(variant.rejects().is_empty());
    }

    #[test]
    fn test_every_reject_is_counted_after_a_retry() {
        let mut variant = variant(1, Some(50.0));
        for time in [10, 10, 10, 30] {
            variant.create_iteration(measured(time)).unwrap();
        }
        variant.compute_stats();
        assert_eq!(variant.rejects(), &[3]);

        // the re-measured outlier drags the mean away from the others
        let retried = variant.iteration_mut(3).unwrap();
        retried.reset();
        retried.record_results(measured(100)).unwrap();
        variant.compute_stats();
        variant.compute_stats();

        assert_eq!(variant.rejects(), &[0, 1, 2, 3]);
        let counts: Vec<u32> = variant
            .iterations()
            .iter()
            .map(|it| it.rejection_count())
            .collect();
        assert_eq!(counts, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_disabled_threshold_rejects_nothing() {
        let mut variant = variant(1, None);
        for time in [4, 8, 4, 16] {
            variant.create_iteration(measured(time)).unwrap();
        }
        variant.compute_stats();
        assert!(variant.rejects().is_empty());
    }

    #[test]
    fn test_error_stack_blocks_stats() {
        let mut variant = reference_variant();
        variant.compute_stats();
        assert!(variant.stats().is_ok());

        variant
            .set_error_stack(ErrorRecord::new("Panic", "boom").into())
            .unwrap();

        assert_eq!(variant.stats(), Err(ModelError::StatsWithErrorStack));
        assert!(variant.iterations().is_empty());

        variant.compute_stats();
        assert_eq!(variant.stats(), Err(ModelError::StatsWithErrorStack));
        assert_eq!(
            variant.set_error_stack(ErrorRecord::new("Panic", "again").into()),
            Err(ModelError::ErrorStackAlreadySet)
        );
    }

    #[test]
    fn test_failed_iterations_are_left_out() {
        let mut variant = variant(2, Some(10.0));
        variant.spawn_iterations(3);
        for (index, time) in [(0, 20), (2, 20)] {
            let it = variant.iteration_mut(index).unwrap();
            it.begin_launch().unwrap();
            it.record_results(measured(time)).unwrap();
        }
        let it = variant.iteration_mut(1).unwrap();
        it.begin_launch().unwrap();
        it.fail(ErrorRecord::new("Aborted", "timeout"));

        variant.compute_stats();

        let stats = variant.stats().unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.mean - 10.0).abs() < 1e-12);
        assert!(!variant.iteration(1).unwrap().results().has(ResultKind::Computed));
    }

    #[test]
    fn test_metric_values() {
        let variant = {
            let mut variant = variant(4, None);
            variant.create_iteration(measured(40)).unwrap();
            variant.create_iteration(measured(80)).unwrap();
            variant
        };

        assert_eq!(
            variant
                .metric_values(ResultKind::Time, TimeResult::NET_TIME)
                .unwrap(),
            vec![40.0, 80.0]
        );
        assert_eq!(
            variant
                .metric_values_by_rev(ResultKind::Time, TimeResult::NET_TIME)
                .unwrap(),
            vec![10.0, 20.0]
        );
        assert!(variant
            .metric_values(ResultKind::FunctionCalls, "function-calls")
            .is_err());
    }

    #[test]
    fn test_zero_revolutions_rejected() {
        let err = Variant::new(
            VariantId {
                benchmark: 0,
                subject: 0,
                variant: 0,
            },
            ParameterSet::new(0),
            0,
            0,
            None,
        )
        .unwrap_err();
        assert_eq!(err, ModelError::InvalidRevolutions);
    }
}
