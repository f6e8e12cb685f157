//! Run Planner
//!
//! Selects registered subjects and lays out the suite they will be measured into.
//!
//! Filtering options:
//! - Regex pattern matching on `benchmark::subject`
//! - Group filtering
//!
//! Ordering: subjects are sorted by qualified name for deterministic execution.

use revbench_core::SubjectDef;
use revbench_model::{ModelError, Suite, SubjectOptions};

/// Settings that replace the registered values of every subject
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Overrides {
    /// Iterations per variant
    pub iterations: Option<u32>,
    /// Measured revolutions
    pub revs: Option<u32>,
    /// Warmup revolutions
    pub warmup: Option<u32>,
    /// Rejection threshold, in percent
    pub retry_threshold: Option<f64>,
}

/// Subjects selected for a run
pub struct ExecutionPlan {
    /// Ordered list of subjects to run
    pub subjects: Vec<&'static SubjectDef>,
}

/// Build execution plan from registered subjects
pub fn build_plan(
    subjects: impl IntoIterator<Item = &'static SubjectDef>,
    filter: Option<&regex::Regex>,
    group: Option<&str>,
) -> ExecutionPlan {
    let mut selected: Vec<_> = subjects
        .into_iter()
        .filter(|s| filter.map_or(true, |re| re.is_match(&s.qualified_name())))
        .filter(|s| group.map_or(true, |g| s.groups.contains(&g)))
        .collect();

    selected.sort_by_key(|s| s.qualified_name());

    ExecutionPlan { subjects: selected }
}

fn subject_options(def: &SubjectDef, overrides: &Overrides) -> SubjectOptions {
    SubjectOptions {
        groups: def.groups.iter().map(|g| g.to_string()).collect(),
        sleep_us: def.sleep_us,
        output_time_unit: def.output_time_unit.map(str::to_string),
        output_time_precision: def.output_time_precision,
        output_mode: def.output_mode.map(str::to_string),
        retry_threshold: overrides.retry_threshold.or(def.retry_threshold),
        before: def.before.iter().map(|h| h.to_string()).collect(),
        after: def.after.iter().map(|h| h.to_string()).collect(),
    }
}

impl ExecutionPlan {
    /// Number of selected subjects
    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    /// Whether nothing was selected
    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    /// Add one benchmark per distinct benchmark name, one subject per definition and
    /// one variant per parameter set, each with its iterations spawned.
    pub fn populate(&self, suite: &mut Suite, overrides: &Overrides) -> Result<(), ModelError> {
        for def in &self.subjects {
            let position = suite
                .benchmarks()
                .iter()
                .position(|b| b.class() == def.benchmark);
            let benchmark = match position {
                Some(position) => &mut suite.benchmarks_mut()[position],
                None => suite.create_benchmark(def.benchmark),
            };

            let subject = benchmark.create_subject(def.name, subject_options(def, overrides));
            let revs = overrides.revs.unwrap_or(def.revs);
            let warmup = overrides.warmup.unwrap_or(def.warmup);
            let iterations = overrides.iterations.unwrap_or(def.iterations) as usize;

            for params in (def.params)() {
                subject
                    .create_variant(params, revs, warmup)?
                    .spawn_iterations(iterations);
            }
        }
        Ok(())
    }
}
