//! Run Driver
//!
//! Walks every variant of a suite, launches its pending iterations through an
//! [`Executor`], computes statistics and re-measures rejected iterations.
//!
//! An executor error stops the affected variant only: its error is recorded as the
//! variant's error stack and the driver moves on. Configuration and model errors
//! abort the whole run.

use crate::executor::{Executor, ExecutorConfig, ExecutorError, LaunchTarget};
use indicatif::{ProgressBar, ProgressStyle};
use revbench_model::{ErrorStack, IterationState, Suite, Variant, VariantId};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Driver settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Rounds of re-measuring rejected iterations
    pub max_retries: u32,
    /// Show a progress bar
    pub progress: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_retries: 10,
            progress: false,
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Variants visited
    pub variants: usize,
    /// Variants that ended with an error stack
    pub failed_variants: usize,
    /// Iterations launched, retries included
    pub launches: usize,
    /// Iterations re-measured after rejection
    pub retries: usize,
}

/// Measures suites with one executor
pub struct Runner {
    executor: Box<dyn Executor>,
    config: ExecutorConfig,
    options: RunnerOptions,
}

impl Runner {
    /// Validate `config` against the executor and build a driver
    pub fn new(
        executor: Box<dyn Executor>,
        config: ExecutorConfig,
        options: RunnerOptions,
    ) -> Result<Self, ExecutorError> {
        executor.validate(&config)?;
        Ok(Self {
            executor,
            config,
            options,
        })
    }

    /// Measure every pending iteration of `suite`
    pub fn run(&self, suite: &mut Suite) -> Result<RunSummary, ExecutorError> {
        let ids = suite.variant_ids();
        let total: usize = suite.variants().map(|v| v.iterations().len()).sum();

        let pb = if self.options.progress {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut summary = RunSummary::default();
        for id in ids {
            let (target, sleep) = launch_target(suite, id)?;
            pb.set_message(format!("{}::{}", target.benchmark, target.subject));

            let variant = suite
                .variant_mut(id)
                .ok_or_else(|| ExecutorError::Configuration(format!("variant {id:?} vanished")))?;
            summary.variants += 1;

            if let Err(err) = self.measure(&target, variant, sleep, &pb, &mut summary) {
                if err.is_fatal() {
                    pb.abandon();
                    return Err(err);
                }
                warn!(
                    subject = %format!("{}::{}", target.benchmark, target.subject),
                    variant = id.variant,
                    error = %err,
                    "variant failed"
                );
                variant.set_error_stack(ErrorStack::from(err.to_record()))?;
                summary.failed_variants += 1;
            }
        }

        pb.finish_with_message("Complete");
        info!(
            variants = summary.variants,
            failed = summary.failed_variants,
            launches = summary.launches,
            retries = summary.retries,
            "run complete"
        );
        Ok(summary)
    }

    fn measure(
        &self,
        target: &LaunchTarget,
        variant: &mut Variant,
        sleep: Option<Duration>,
        pb: &ProgressBar,
        summary: &mut RunSummary,
    ) -> Result<(), ExecutorError> {
        if variant.has_error_stack() {
            return Ok(());
        }

        for index in 0..variant.iterations().len() {
            let iteration = variant.iteration_mut(index)?;
            if iteration.state() != IterationState::Pending {
                continue;
            }
            self.launch(target, variant, index, sleep, summary)?;
            pb.inc(1);
        }
        variant.compute_stats();

        for round in 1..=self.options.max_retries {
            let rejects = variant.rejects().to_vec();
            if rejects.is_empty() {
                break;
            }
            debug!(
                subject = %target.subject,
                round,
                rejected = rejects.len(),
                "re-measuring rejected iterations"
            );
            for index in rejects {
                variant.iteration_mut(index)?.reset();
                self.launch(target, variant, index, sleep, summary)?;
                summary.retries += 1;
            }
            variant.compute_stats();
        }
        Ok(())
    }

    fn launch(
        &self,
        target: &LaunchTarget,
        variant: &mut Variant,
        index: usize,
        sleep: Option<Duration>,
        summary: &mut RunSummary,
    ) -> Result<(), ExecutorError> {
        summary.launches += 1;
        self.executor
            .launch(target, variant.iteration_mut(index)?, &self.config)?;
        if let Some(sleep) = sleep {
            std::thread::sleep(sleep);
        }
        Ok(())
    }
}

fn launch_target(
    suite: &Suite,
    id: VariantId,
) -> Result<(LaunchTarget, Option<Duration>), ExecutorError> {
    let missing = || ExecutorError::Configuration(format!("variant {id:?} is not in the suite"));
    let benchmark = suite.benchmarks().get(id.benchmark).ok_or_else(missing)?;
    let subject = suite.subject(id).ok_or_else(missing)?;
    let variant = suite.variant(id).ok_or_else(missing)?;

    let mut target = LaunchTarget::new(
        benchmark.class(),
        subject.name(),
        variant.parameter_set(),
        variant.warmup(),
    )?;
    target.before = subject.options().before.clone();
    target.after = subject.options().after.clone();

    let sleep_us = subject.options().sleep_us;
    let sleep = (sleep_us > 0).then(|| Duration::from_micros(sleep_us));
    Ok((target, sleep))
}
