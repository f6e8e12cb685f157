//! Iteration
//!
//! One measured execution attempt within a variant. Time, memory and per-revolution
//! time are read from the result collection on demand and never stored twice.

use crate::collection::ResultCollection;
use crate::error::ModelError;
use crate::error_stack::ErrorRecord;
use crate::result::{ComputedResult, MemoryResult, ResultKind, TimeResult};
use serde::{Deserialize, Serialize};

/// Execution state of an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IterationState {
    /// Not launched yet
    Pending,
    /// Handed to an executor, awaiting the isolated run
    Launched,
    /// Results attached
    Succeeded,
    /// The run failed; no results attached
    Failed,
}

/// Stable address of a variant inside its suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariantId {
    /// Index of the benchmark in the suite
    pub benchmark: usize,
    /// Index of the subject in the benchmark
    pub subject: usize,
    /// Index of the variant in the subject
    pub variant: usize,
}

/// One measured execution attempt
#[derive(Debug, Clone)]
pub struct Iteration {
    index: usize,
    variant: VariantId,
    revolutions: u32,
    results: ResultCollection,
    state: IterationState,
    rejection_count: u32,
    // the current raw results were already counted as rejected
    rejection_counted: bool,
    failure: Option<ErrorRecord>,
}

impl Iteration {
    pub(crate) fn new(index: usize, variant: VariantId, revolutions: u32) -> Self {
        Self {
            index,
            variant,
            revolutions,
            results: ResultCollection::new(),
            state: IterationState::Pending,
            rejection_count: 0,
            rejection_counted: false,
            failure: None,
        }
    }

    /// Zero-based index within the variant
    pub fn index(&self) -> usize {
        self.index
    }

    /// The variant this iteration belongs to
    pub fn variant(&self) -> VariantId {
        self.variant
    }

    /// Revolutions of the owning variant
    pub fn revolutions(&self) -> u32 {
        self.revolutions
    }

    /// Current execution state
    pub fn state(&self) -> IterationState {
        self.state
    }

    /// Attached results
    pub fn results(&self) -> &ResultCollection {
        &self.results
    }

    /// Failure recorded for this iteration, if it failed
    pub fn failure(&self) -> Option<&ErrorRecord> {
        self.failure.as_ref()
    }

    /// Whether the iteration holds a measured time
    pub fn is_measured(&self) -> bool {
        self.state == IterationState::Succeeded && self.results.has(ResultKind::Time)
    }

    /// Move to `Launched`.
    ///
    /// An iteration that already holds results cannot be launched again: the first
    /// present kind is reported as a duplicate.
    pub fn begin_launch(&mut self) -> Result<(), ModelError> {
        if let Some(kind) = self.results.kinds().next() {
            return Err(ModelError::ResultAlreadySet { kind });
        }
        if self.state == IterationState::Launched {
            return Err(ModelError::InvalidTransition {
                index: self.index,
                state: self.state,
            });
        }
        self.state = IterationState::Launched;
        self.failure = None;
        Ok(())
    }

    /// Attach the results of a run, all or nothing, and move to `Succeeded`.
    pub fn record_results(&mut self, results: ResultCollection) -> Result<(), ModelError> {
        let computed = results.find::<ComputedResult>().copied();
        self.results.absorb(results)?;

        // a stored Computed result carries the authoritative count for these results
        match computed {
            Some(computed) => {
                self.rejection_count = computed.rejection_count();
                self.rejection_counted = true;
            }
            None => self.rejection_counted = false,
        }
        self.state = IterationState::Succeeded;
        self.failure = None;
        Ok(())
    }

    /// Mark the run as failed. Results are left untouched (a failed run attaches none).
    pub fn fail(&mut self, error: ErrorRecord) {
        self.state = IterationState::Failed;
        self.failure = Some(error);
    }

    /// Drop results and return to `Pending` so the iteration can be measured again.
    /// The rejection count survives.
    pub fn reset(&mut self) {
        self.results.clear();
        self.state = IterationState::Pending;
        self.failure = None;
        self.rejection_counted = false;
    }

    /// Net time in microseconds
    pub fn time(&self) -> Result<u64, ModelError> {
        Ok(self.results.get_as::<TimeResult>()?.net_time())
    }

    /// Memory in bytes
    pub fn memory(&self) -> Result<u64, ModelError> {
        Ok(self.results.get_as::<MemoryResult>()?.memory())
    }

    /// Time per revolution: `time / revolutions`
    pub fn rev_time(&self) -> Result<f64, ModelError> {
        Ok(self.results.get_as::<TimeResult>()?.rev_time(self.revolutions))
    }

    /// Deviation from the variant mean, in percent
    pub fn deviation(&self) -> Result<f64, ModelError> {
        Ok(self.results.get_as::<ComputedResult>()?.deviation())
    }

    /// Standard score against the variant sample
    pub fn z_value(&self) -> Result<f64, ModelError> {
        Ok(self.results.get_as::<ComputedResult>()?.z_value())
    }

    /// Number of times this iteration was rejected
    pub fn rejection_count(&self) -> u32 {
        self.rejection_count
    }

    /// Apply one rejection pass verdict and refresh the computed result.
    ///
    /// The counter moves the first time the current raw results are rejected, in
    /// whichever pass that happens, and at most once per write of raw results.
    pub(crate) fn apply_review(&mut self, z_value: f64, deviation: f64, rejected: bool) {
        if rejected && !self.rejection_counted {
            self.rejection_count += 1;
            self.rejection_counted = true;
        }
        self.results
            .replace(ComputedResult::new(z_value, deviation, self.rejection_count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::MetricResult;

    fn iteration(revolutions: u32) -> Iteration {
        Iteration::new(
            0,
            VariantId {
                benchmark: 0,
                subject: 0,
                variant: 0,
            },
            revolutions,
        )
    }

    fn measured(time: u64, memory: u64) -> ResultCollection {
        ResultCollection::from_results([
            MetricResult::from(TimeResult::new(time)),
            MetricResult::from(MemoryResult::new(memory)),
        ])
        .unwrap()
    }

    #[test]
    fn test_rev_time_divides_by_revolutions() {
        for revolutions in [1, 3, 7, 1000] {
            let mut it = iteration(revolutions);
            it.record_results(measured(21_000, 0)).unwrap();
            assert_eq!(it.rev_time().unwrap(), 21_000.0 / f64::from(revolutions));
        }
    }

    #[test]
    fn test_state_machine() {
        let mut it = iteration(1);
        assert_eq!(it.state(), IterationState::Pending);

        it.begin_launch().unwrap();
        assert_eq!(it.state(), IterationState::Launched);
        assert!(it.begin_launch().is_err());

        it.record_results(measured(10, 20)).unwrap();
        assert_eq!(it.state(), IterationState::Succeeded);
        assert_eq!(it.time().unwrap(), 10);
        assert_eq!(it.memory().unwrap(), 20);
    }

    #[test]
    fn test_second_launch_with_results_fails() {
        let mut it = iteration(1);
        it.begin_launch().unwrap();
        it.record_results(measured(10, 20)).unwrap();

        assert_eq!(
            it.begin_launch(),
            Err(ModelError::ResultAlreadySet { kind: ResultKind::Time })
        );
    }

    #[test]
    fn test_failure_keeps_results_empty() {
        let mut it = iteration(1);
        it.begin_launch().unwrap();
        it.fail(ErrorRecord::new("NoiseDetected", "hello"));

        assert_eq!(it.state(), IterationState::Failed);
        assert!(it.results().is_empty());
        assert!(!it.is_measured());
        assert_eq!(it.failure().unwrap().message, "hello");
    }

    #[test]
    fn test_reset_keeps_rejection_count() {
        let mut it = iteration(1);
        it.record_results(measured(10, 0)).unwrap();
        it.apply_review(2.0, 50.0, true);
        assert_eq!(it.rejection_count(), 1);

        it.reset();
        assert!(it.results().is_empty());
        assert_eq!(it.state(), IterationState::Pending);
        assert_eq!(it.rejection_count(), 1);
    }

    #[test]
    fn test_review_counts_once_per_write() {
        let mut it = iteration(1);
        it.record_results(measured(10, 0)).unwrap();

        it.apply_review(2.0, 50.0, true);
        it.apply_review(2.0, 50.0, true);
        assert_eq!(it.rejection_count(), 1);

        it.reset();
        it.record_results(measured(12, 0)).unwrap();
        it.apply_review(2.0, 50.0, true);
        assert_eq!(it.rejection_count(), 2);
        assert_eq!(
            it.results().get_as::<ComputedResult>().unwrap().rejection_count(),
            2
        );
    }

    #[test]
    fn test_late_rejection_still_counts() {
        let mut it = iteration(1);
        it.record_results(measured(10, 0)).unwrap();

        it.apply_review(0.1, 5.0, false);
        assert_eq!(it.rejection_count(), 0);

        // the sample around it moved; same raw results are now rejected
        it.apply_review(-1.2, -69.0, true);
        it.apply_review(-1.2, -69.0, true);
        assert_eq!(it.rejection_count(), 1);
    }

    #[test]
    fn test_missing_time_is_an_error() {
        let it = iteration(1);
        assert_eq!(
            it.time(),
            Err(ModelError::ResultNotSet { kind: ResultKind::Time })
        );
    }
}
