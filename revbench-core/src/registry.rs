//! Subject Registry
//!
//! Subjects and hooks are declared as `const` definitions and collected by
//! `inventory`, so the harness and its worker (the same binary) see the same set.

use revbench_model::ParameterSet;

/// Body of a subject: one call is one revolution
pub type SubjectFn = fn(&ParameterSet);

/// Outcome of a hook
pub type HookResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Body of a before/after hook
pub type HookFn = fn(&ParameterSet) -> HookResult;

/// Subject definition registered via [`register_subject!`](crate::register_subject)
#[derive(Debug, Clone)]
pub struct SubjectDef {
    /// Benchmark the subject belongs to
    pub benchmark: &'static str,
    /// Subject name, unique within its benchmark
    pub name: &'static str,
    /// Function measured once per revolution
    pub subject_fn: SubjectFn,
    /// Measured revolutions per iteration
    pub revs: u32,
    /// Iterations per variant
    pub iterations: u32,
    /// Unmeasured revolutions per iteration
    pub warmup: u32,
    /// Pause between iterations, in microseconds
    pub sleep_us: u64,
    /// Rejection threshold in percent
    pub retry_threshold: Option<f64>,
    /// Hook names run before each iteration
    pub before: &'static [&'static str],
    /// Hook names run after each iteration
    pub after: &'static [&'static str],
    /// Groups for filtering
    pub groups: &'static [&'static str],
    /// Parameter sets, one variant each
    pub params: fn() -> Vec<ParameterSet>,
    /// Preferred report time unit
    pub output_time_unit: Option<&'static str>,
    /// Preferred report precision
    pub output_time_precision: Option<u32>,
    /// Preferred report mode
    pub output_mode: Option<&'static str>,
}

/// A single empty parameter set
pub fn default_parameters() -> Vec<ParameterSet> {
    vec![ParameterSet::new(0)]
}

impl SubjectDef {
    /// Subject with one revolution, one iteration and no warmup
    pub const fn new(benchmark: &'static str, name: &'static str, subject_fn: SubjectFn) -> Self {
        Self {
            benchmark,
            name,
            subject_fn,
            revs: 1,
            iterations: 1,
            warmup: 0,
            sleep_us: 0,
            retry_threshold: None,
            before: &[],
            after: &[],
            groups: &[],
            params: default_parameters,
            output_time_unit: None,
            output_time_precision: None,
            output_mode: None,
        }
    }

    /// Set measured revolutions
    pub const fn revs(mut self, revs: u32) -> Self {
        self.revs = revs;
        self
    }

    /// Set iterations per variant
    pub const fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set warmup revolutions
    pub const fn warmup(mut self, warmup: u32) -> Self {
        self.warmup = warmup;
        self
    }

    /// Set the pause between iterations
    pub const fn sleep_us(mut self, sleep_us: u64) -> Self {
        self.sleep_us = sleep_us;
        self
    }

    /// Set the rejection threshold
    pub const fn retry_threshold(mut self, percent: f64) -> Self {
        self.retry_threshold = Some(percent);
        self
    }

    /// Set hooks run before each iteration
    pub const fn before(mut self, hooks: &'static [&'static str]) -> Self {
        self.before = hooks;
        self
    }

    /// Set hooks run after each iteration
    pub const fn after(mut self, hooks: &'static [&'static str]) -> Self {
        self.after = hooks;
        self
    }

    /// Set groups
    pub const fn groups(mut self, groups: &'static [&'static str]) -> Self {
        self.groups = groups;
        self
    }

    /// Set the parameter provider
    pub const fn params(mut self, params: fn() -> Vec<ParameterSet>) -> Self {
        self.params = params;
        self
    }

    /// Set the preferred report time unit
    pub const fn output_time_unit(mut self, unit: &'static str) -> Self {
        self.output_time_unit = Some(unit);
        self
    }

    /// Set the preferred report precision
    pub const fn output_time_precision(mut self, precision: u32) -> Self {
        self.output_time_precision = Some(precision);
        self
    }

    /// Set the preferred report mode
    pub const fn output_mode(mut self, mode: &'static str) -> Self {
        self.output_mode = Some(mode);
        self
    }

    /// `benchmark::name`, the string filters match against
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.benchmark, self.name)
    }
}

/// Hook definition registered via [`register_hook!`](crate::register_hook)
#[derive(Debug, Clone)]
pub struct HookDef {
    /// Benchmark the hook belongs to
    pub benchmark: &'static str,
    /// Hook name referenced by subjects
    pub name: &'static str,
    /// Hook body
    pub hook_fn: HookFn,
}

impl HookDef {
    /// Create a hook definition
    pub const fn new(benchmark: &'static str, name: &'static str, hook_fn: HookFn) -> Self {
        Self {
            benchmark,
            name,
            hook_fn,
        }
    }
}

inventory::collect!(SubjectDef);
inventory::collect!(HookDef);

/// Anchor to prevent LTO from stripping inventory entries
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<SubjectDef> {}
    for _ in inventory::iter::<HookDef> {}
};

/// Every registered subject, ordered by benchmark then name
pub fn subjects() -> Vec<&'static SubjectDef> {
    let mut subjects: Vec<_> = inventory::iter::<SubjectDef>.into_iter().collect();
    subjects.sort_by(|a, b| (a.benchmark, a.name).cmp(&(b.benchmark, b.name)));
    subjects
}

/// Look up a subject
pub fn find_subject(benchmark: &str, name: &str) -> Option<&'static SubjectDef> {
    inventory::iter::<SubjectDef>
        .into_iter()
        .find(|def| def.benchmark == benchmark && def.name == name)
}

/// Look up a hook
pub fn find_hook(benchmark: &str, name: &str) -> Option<&'static HookDef> {
    inventory::iter::<HookDef>
        .into_iter()
        .find(|def| def.benchmark == benchmark && def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &ParameterSet) {}

    fn ok_hook(_: &ParameterSet) -> HookResult {
        Ok(())
    }

    inventory::submit! {
        SubjectDef::new("registry_test", "configured", noop)
            .revs(10)
            .warmup(2)
            .iterations(3)
            .groups(&["fast"])
            .before(&["prepare"])
    }

    inventory::submit! {
        HookDef::new("registry_test", "prepare", ok_hook)
    }

    #[test]
    fn test_builder_defaults() {
        const DEF: SubjectDef = SubjectDef::new("b", "s", noop);
        assert_eq!(DEF.revs, 1);
        assert_eq!(DEF.iterations, 1);
        assert_eq!(DEF.retry_threshold, None);
        assert_eq!((DEF.params)().len(), 1);
        assert_eq!(DEF.qualified_name(), "b::s");
    }

    #[test]
    fn test_lookup() {
        let def = find_subject("registry_test", "configured").unwrap();
        assert_eq!(def.revs, 10);
        assert_eq!(def.warmup, 2);
        assert_eq!(def.groups, &["fast"]);

        assert!(find_hook("registry_test", "prepare").is_some());
        assert!(find_hook("other", "prepare").is_none());
        assert!(find_subject("registry_test", "missing").is_none());
    }

    #[test]
    fn test_subjects_sorted() {
        let all = subjects();
        assert!(all.windows(2).all(|w| (w[0].benchmark, w[0].name) <= (w[1].benchmark, w[1].name)));
    }
}
