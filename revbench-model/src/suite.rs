//! Suite Hierarchy
//!
//! Suite → Benchmark → Subject → Variant. Each container owns its children and
//! hands out [`VariantId`]s so iterations can point back at their variant without
//! borrowing it.

use crate::environment::Information;
use crate::error::ModelError;
use crate::iteration::VariantId;
use crate::parameters::ParameterSet;
use crate::variant::Variant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Settings a subject hands down to its variants, plus reporting metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubjectOptions {
    /// Groups the subject belongs to
    pub groups: Vec<String>,
    /// Pause between iterations, in microseconds
    pub sleep_us: u64,
    /// Preferred time unit for reports
    pub output_time_unit: Option<String>,
    /// Preferred number of decimals for reports
    pub output_time_precision: Option<u32>,
    /// Preferred report mode (e.g. `time`, `throughput`)
    pub output_mode: Option<String>,
    /// Rejection threshold in percent
    pub retry_threshold: Option<f64>,
    /// Hooks run before each iteration
    #[serde(skip)]
    pub before: Vec<String>,
    /// Hooks run after each iteration
    #[serde(skip)]
    pub after: Vec<String>,
}

/// A unit of code under measurement
#[derive(Debug, Clone)]
pub struct Subject {
    benchmark: usize,
    index: usize,
    name: String,
    options: SubjectOptions,
    variants: Vec<Variant>,
}

impl Subject {
    /// Subject name, unique within its benchmark
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position within the benchmark
    pub fn index(&self) -> usize {
        self.index
    }

    /// Inherited settings and metadata
    pub fn options(&self) -> &SubjectOptions {
        &self.options
    }

    /// Mutable settings and metadata
    pub fn options_mut(&mut self) -> &mut SubjectOptions {
        &mut self.options
    }

    /// Whether the subject belongs to `group`
    pub fn in_group(&self, group: &str) -> bool {
        self.options.groups.iter().any(|g| g == group)
    }

    /// Append a variant inheriting this subject's retry threshold
    pub fn create_variant(
        &mut self,
        parameter_set: ParameterSet,
        revolutions: u32,
        warmup: u32,
    ) -> Result<&mut Variant, ModelError> {
        let id = VariantId {
            benchmark: self.benchmark,
            subject: self.index,
            variant: self.variants.len(),
        };
        let variant = Variant::new(
            id,
            parameter_set,
            revolutions,
            warmup,
            self.options.retry_threshold.filter(|threshold| *threshold > 0.0),
        )?;
        self.variants.push(variant);
        let last = self.variants.len() - 1;
        Ok(&mut self.variants[last])
    }

    /// Variants in creation order
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }
}

/// A group of subjects, typically one source module
#[derive(Debug, Clone)]
pub struct Benchmark {
    index: usize,
    class: String,
    subjects: Vec<Subject>,
}

impl Benchmark {
    /// Benchmark identifier
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Position within the suite
    pub fn index(&self) -> usize {
        self.index
    }

    /// Append a subject
    pub fn create_subject(&mut self, name: impl Into<String>, options: SubjectOptions) -> &mut Subject {
        let index = self.subjects.len();
        self.subjects.push(Subject {
            benchmark: self.index,
            index,
            name: name.into(),
            options,
            variants: Vec::new(),
        });
        &mut self.subjects[index]
    }

    /// Subjects in creation order
    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }
}

/// One benchmarking run and its provenance
#[derive(Debug, Clone)]
pub struct Suite {
    context: Option<String>,
    date: DateTime<Utc>,
    config_path: Option<PathBuf>,
    uuid: Uuid,
    env: Vec<Information>,
    benchmarks: Vec<Benchmark>,
}

impl Suite {
    /// Start a new run, stamped now with a fresh UUID
    pub fn new(context: Option<String>, config_path: Option<PathBuf>) -> Self {
        Self::with_provenance(context, Utc::now(), config_path, Uuid::new_v4())
    }

    /// Rebuild a suite with known provenance
    pub fn with_provenance(
        context: Option<String>,
        date: DateTime<Utc>,
        config_path: Option<PathBuf>,
        uuid: Uuid,
    ) -> Self {
        Self {
            context,
            date,
            config_path,
            uuid,
            env: Vec::new(),
            benchmarks: Vec::new(),
        }
    }

    /// User-supplied label for the run
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Start time of the run
    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    /// Configuration file the run used
    pub fn config_path(&self) -> Option<&std::path::Path> {
        self.config_path.as_deref()
    }

    /// Run identifier
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Environment snapshot
    pub fn env(&self) -> &[Information] {
        &self.env
    }

    /// Record an environment block
    pub fn add_information(&mut self, information: Information) {
        self.env.push(information);
    }

    /// Append a benchmark
    pub fn create_benchmark(&mut self, class: impl Into<String>) -> &mut Benchmark {
        let index = self.benchmarks.len();
        self.benchmarks.push(Benchmark {
            index,
            class: class.into(),
            subjects: Vec::new(),
        });
        &mut self.benchmarks[index]
    }

    /// Benchmarks in creation order
    pub fn benchmarks(&self) -> &[Benchmark] {
        &self.benchmarks
    }

    /// Mutable benchmarks
    pub fn benchmarks_mut(&mut self) -> &mut [Benchmark] {
        &mut self.benchmarks
    }

    /// Every variant of the suite, depth first
    pub fn variants(&self) -> impl Iterator<Item = &Variant> {
        self.benchmarks
            .iter()
            .flat_map(|benchmark| benchmark.subjects.iter())
            .flat_map(|subject| subject.variants.iter())
    }

    /// Variant at `id`
    pub fn variant(&self, id: VariantId) -> Option<&Variant> {
        self.benchmarks
            .get(id.benchmark)?
            .subjects
            .get(id.subject)?
            .variants
            .get(id.variant)
    }

    /// Mutable variant at `id`
    pub fn variant_mut(&mut self, id: VariantId) -> Option<&mut Variant> {
        self.benchmarks
            .get_mut(id.benchmark)?
            .subjects
            .get_mut(id.subject)?
            .variants
            .get_mut(id.variant)
    }

    /// Subject owning the variant at `id`
    pub fn subject(&self, id: VariantId) -> Option<&Subject> {
        self.benchmarks.get(id.benchmark)?.subjects.get(id.subject)
    }

    /// Addresses of every variant, depth first
    pub fn variant_ids(&self) -> Vec<VariantId> {
        self.variants().map(Variant::id).collect()
    }
}

/// Several suites, e.g. a series of historical runs loaded for comparison
#[derive(Debug, Clone, Default)]
pub struct SuiteCollection {
    suites: Vec<Suite>,
}

impl SuiteCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a suite
    pub fn push(&mut self, suite: Suite) {
        self.suites.push(suite);
    }

    /// Move all suites of `other` to the end of this collection
    pub fn merge(&mut self, other: SuiteCollection) {
        self.suites.extend(other.suites);
    }

    /// Suites in insertion order
    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// Number of suites
    pub fn len(&self) -> usize {
        self.suites.len()
    }

    /// Whether the collection holds no suites
    pub fn is_empty(&self) -> bool {
        self.suites.is_empty()
    }
}

impl From<Vec<Suite>> for SuiteCollection {
    fn from(suites: Vec<Suite>) -> Self {
        Self { suites }
    }
}

impl IntoIterator for SuiteCollection {
    type Item = Suite;
    type IntoIter = std::vec::IntoIter<Suite>;

    fn into_iter(self) -> Self::IntoIter {
        self.suites.into_iter()
    }
}
