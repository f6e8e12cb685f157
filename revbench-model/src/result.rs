//! Result Kinds
//!
//! Every measurement attached to an iteration is a [`MetricResult`]. The set of kinds
//! is closed in [`ResultKind`], and each kind declares in one place:
//! - a short stable key
//! - its flat field names (unique across all kinds)
//! - the mapping to and from those fields
//!
//! Because field names never overlap, the results of a whole iteration flatten into a
//! single attribute set without collisions.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a measurement result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultKind {
    /// Elapsed time of the isolated run
    Time,
    /// Memory delta of the isolated run
    Memory,
    /// Statistics computed by the variant's reduction pass
    Computed,
    /// Standalone rejection count
    RejectionCount,
    /// Number of subject calls seen by a tracing backend
    FunctionCalls,
}

impl ResultKind {
    /// Every registered kind, in serialization order
    pub const ALL: [ResultKind; 5] = [
        ResultKind::Time,
        ResultKind::Memory,
        ResultKind::Computed,
        ResultKind::RejectionCount,
        ResultKind::FunctionCalls,
    ];

    /// Short stable key
    pub fn key(self) -> &'static str {
        match self {
            ResultKind::Time => "time",
            ResultKind::Memory => "mem",
            ResultKind::Computed => "comp",
            ResultKind::RejectionCount => "reject",
            ResultKind::FunctionCalls => "calls",
        }
    }

    /// Flat field names of this kind
    pub fn field_names(self) -> &'static [&'static str] {
        match self {
            ResultKind::Time => &[TimeResult::NET_TIME],
            ResultKind::Memory => &[MemoryResult::MEMORY],
            ResultKind::Computed => &[
                ComputedResult::Z_VALUE,
                ComputedResult::DEVIATION,
                ComputedResult::REJECTION_COUNT,
            ],
            ResultKind::RejectionCount => &[RejectionCountResult::REJECTIONS],
            ResultKind::FunctionCalls => &[FunctionCallsResult::CALLS],
        }
    }

    /// Look a kind up by its key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Scalar value of a result field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    /// Unsigned integer (microseconds, bytes, counts)
    Integer(u64),
    /// Floating point (ratios, percentages)
    Float(f64),
}

impl FieldValue {
    /// Value as `f64`
    pub fn as_f64(self) -> f64 {
        match self {
            FieldValue::Integer(v) => v as f64,
            FieldValue::Float(v) => v,
        }
    }
}

impl fmt::Display for FieldValue {
    /// Floats print in their shortest round-trip form, so parsing the text
    /// yields the identical value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Time taken by the isolated run, in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeResult {
    net_time: u64,
}

impl TimeResult {
    /// Field name of the net time
    pub const NET_TIME: &'static str = "net-time";

    /// Create a time result from microseconds
    pub fn new(net_time: u64) -> Self {
        Self { net_time }
    }

    /// Net time in microseconds
    pub fn net_time(&self) -> u64 {
        self.net_time
    }

    /// Time per revolution
    pub fn rev_time(&self, revolutions: u32) -> f64 {
        self.net_time as f64 / f64::from(revolutions)
    }
}

/// Memory used by the isolated run, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryResult {
    memory: u64,
}

impl MemoryResult {
    /// Field name of the memory
    pub const MEMORY: &'static str = "memory";

    /// Create a memory result from bytes
    pub fn new(memory: u64) -> Self {
        Self { memory }
    }

    /// Memory in bytes
    pub fn memory(&self) -> u64 {
        self.memory
    }
}

/// Per-iteration statistics computed against the variant's sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComputedResult {
    z_value: f64,
    deviation: f64,
    rejection_count: u32,
}

impl ComputedResult {
    /// Field name of the z-value
    pub const Z_VALUE: &'static str = "z-value";
    /// Field name of the deviation percentage
    pub const DEVIATION: &'static str = "deviation";
    /// Field name of the rejection count
    pub const REJECTION_COUNT: &'static str = "rejection-count";

    /// Create a computed result
    pub fn new(z_value: f64, deviation: f64, rejection_count: u32) -> Self {
        Self {
            z_value,
            deviation,
            rejection_count,
        }
    }

    /// Standard score of the iteration's per-revolution time
    pub fn z_value(&self) -> f64 {
        self.z_value
    }

    /// Signed deviation from the mean, in percent
    pub fn deviation(&self) -> f64 {
        self.deviation
    }

    /// Number of times the iteration was rejected
    pub fn rejection_count(&self) -> u32 {
        self.rejection_count
    }
}

/// Number of times an iteration has been rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCountResult {
    rejections: u32,
}

impl RejectionCountResult {
    /// Field name of the rejection count
    pub const REJECTIONS: &'static str = "rejections";

    /// Create a rejection count result
    pub fn new(rejections: u32) -> Self {
        Self { rejections }
    }

    /// Rejection count
    pub fn rejections(&self) -> u32 {
        self.rejections
    }
}

/// Subject calls observed by a tracing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCallsResult {
    calls: u64,
}

impl FunctionCallsResult {
    /// Field name of the call count
    pub const CALLS: &'static str = "function-calls";

    /// Create a function call result
    pub fn new(calls: u64) -> Self {
        Self { calls }
    }

    /// Number of calls
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

/// A typed, self-describing measurement value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MetricResult {
    /// See [`TimeResult`]
    Time(TimeResult),
    /// See [`MemoryResult`]
    Memory(MemoryResult),
    /// See [`ComputedResult`]
    Computed(ComputedResult),
    /// See [`RejectionCountResult`]
    RejectionCount(RejectionCountResult),
    /// See [`FunctionCallsResult`]
    FunctionCalls(FunctionCallsResult),
}

impl MetricResult {
    /// Kind of this result
    pub fn kind(&self) -> ResultKind {
        match self {
            MetricResult::Time(_) => ResultKind::Time,
            MetricResult::Memory(_) => ResultKind::Memory,
            MetricResult::Computed(_) => ResultKind::Computed,
            MetricResult::RejectionCount(_) => ResultKind::RejectionCount,
            MetricResult::FunctionCalls(_) => ResultKind::FunctionCalls,
        }
    }

    /// Flat field mapping, in the order of [`ResultKind::field_names`]
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        match self {
            MetricResult::Time(r) => vec![(TimeResult::NET_TIME, FieldValue::Integer(r.net_time))],
            MetricResult::Memory(r) => vec![(MemoryResult::MEMORY, FieldValue::Integer(r.memory))],
            MetricResult::Computed(r) => vec![
                (ComputedResult::Z_VALUE, FieldValue::Float(r.z_value)),
                (ComputedResult::DEVIATION, FieldValue::Float(r.deviation)),
                (
                    ComputedResult::REJECTION_COUNT,
                    FieldValue::Integer(u64::from(r.rejection_count)),
                ),
            ],
            MetricResult::RejectionCount(r) => vec![(
                RejectionCountResult::REJECTIONS,
                FieldValue::Integer(u64::from(r.rejections)),
            )],
            MetricResult::FunctionCalls(r) => {
                vec![(FunctionCallsResult::CALLS, FieldValue::Integer(r.calls))]
            }
        }
    }

    /// Value of one named field
    pub fn field(&self, name: &str) -> Result<FieldValue, ModelError> {
        self.fields()
            .into_iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
            .ok_or_else(|| ModelError::UnknownField {
                kind: self.kind(),
                field: name.to_string(),
            })
    }

    /// Rebuild a result of `kind` from its textual fields.
    ///
    /// `lookup` resolves a field name to its raw value, e.g. an element attribute.
    pub fn from_fields<'a, F>(kind: ResultKind, lookup: F) -> Result<Self, ModelError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let field = |name: &'static str| -> Result<&'a str, ModelError> {
            lookup(name).ok_or(ModelError::MissingField { kind, field: name })
        };

        let result = match kind {
            ResultKind::Time => MetricResult::Time(TimeResult::new(parse_field(
                kind,
                TimeResult::NET_TIME,
                field(TimeResult::NET_TIME)?,
            )?)),
            ResultKind::Memory => MetricResult::Memory(MemoryResult::new(parse_field(
                kind,
                MemoryResult::MEMORY,
                field(MemoryResult::MEMORY)?,
            )?)),
            ResultKind::Computed => MetricResult::Computed(ComputedResult::new(
                parse_field(kind, ComputedResult::Z_VALUE, field(ComputedResult::Z_VALUE)?)?,
                parse_field(
                    kind,
                    ComputedResult::DEVIATION,
                    field(ComputedResult::DEVIATION)?,
                )?,
                parse_field(
                    kind,
                    ComputedResult::REJECTION_COUNT,
                    field(ComputedResult::REJECTION_COUNT)?,
                )?,
            )),
            ResultKind::RejectionCount => {
                MetricResult::RejectionCount(RejectionCountResult::new(parse_field(
                    kind,
                    RejectionCountResult::REJECTIONS,
                    field(RejectionCountResult::REJECTIONS)?,
                )?))
            }
            ResultKind::FunctionCalls => {
                MetricResult::FunctionCalls(FunctionCallsResult::new(parse_field(
                    kind,
                    FunctionCallsResult::CALLS,
                    field(FunctionCallsResult::CALLS)?,
                )?))
            }
        };

        Ok(result)
    }
}

fn parse_field<T: std::str::FromStr>(
    kind: ResultKind,
    field: &'static str,
    raw: &str,
) -> Result<T, ModelError> {
    raw.trim().parse().map_err(|_| ModelError::InvalidField {
        kind,
        field,
        value: raw.to_string(),
    })
}

/// Typed access to one variant of [`MetricResult`]
pub trait TypedResult: Sized {
    /// Kind this type is stored under
    const KIND: ResultKind;

    /// Borrow the typed result out of the tagged union
    fn from_metric(result: &MetricResult) -> Option<&Self>;
}

macro_rules! typed_result {
    ($ty:ty, $variant:ident) => {
        impl TypedResult for $ty {
            const KIND: ResultKind = ResultKind::$variant;

            fn from_metric(result: &MetricResult) -> Option<&Self> {
                match result {
                    MetricResult::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$ty> for MetricResult {
            fn from(result: $ty) -> Self {
                MetricResult::$variant(result)
            }
        }
    };
}

typed_result!(TimeResult, Time);
typed_result!(MemoryResult, Memory);
typed_result!(ComputedResult, Computed);
typed_result!(RejectionCountResult, RejectionCount);
typed_result!(FunctionCallsResult, FunctionCalls);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn roundtrip(result: MetricResult) -> MetricResult {
        let fields: HashMap<&str, String> = result
            .fields()
            .into_iter()
            .map(|(name, value)| (name, value.to_string()))
            .collect();
        MetricResult::from_fields(result.kind(), |name| fields.get(name).map(String::as_str))
            .unwrap()
    }

    #[test]
    fn test_every_kind_roundtrips() {
        let samples = [
            MetricResult::from(TimeResult::new(1_234_567)),
            MetricResult::from(MemoryResult::new(4096)),
            MetricResult::from(ComputedResult::new(-0.816496580927726, -50.0, 2)),
            MetricResult::from(RejectionCountResult::new(3)),
            MetricResult::from(FunctionCallsResult::new(11)),
        ];

        for result in samples {
            assert_eq!(roundtrip(result), result);
        }
    }

    #[test]
    fn test_field_names_do_not_overlap() {
        let mut seen = std::collections::HashSet::new();
        for kind in ResultKind::ALL {
            for name in kind.field_names() {
                assert!(seen.insert(*name), "field {name} declared twice");
            }
        }
    }

    #[test]
    fn test_fields_follow_declared_names() {
        let result = MetricResult::from(ComputedResult::new(1.0, 2.0, 3));
        let names: Vec<&str> = result.fields().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ResultKind::Computed.field_names());
    }

    #[test]
    fn test_missing_field() {
        let err = MetricResult::from_fields(ResultKind::Time, |_| None).unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingField {
                kind: ResultKind::Time,
                field: "net-time"
            }
        );
    }

    #[test]
    fn test_invalid_field() {
        let err = MetricResult::from_fields(ResultKind::Memory, |_| Some("lots")).unwrap_err();
        assert!(matches!(err, ModelError::InvalidField { .. }));
    }

    #[test]
    fn test_key_lookup() {
        for kind in ResultKind::ALL {
            assert_eq!(ResultKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(ResultKind::from_key("nope"), None);
    }

    #[test]
    fn test_rev_time() {
        assert_eq!(TimeResult::new(100).rev_time(4), 25.0);
    }

    proptest::proptest! {
        #[test]
        fn test_computed_fields_survive_text(
            z in -1.0e6f64..1.0e6,
            deviation in -1.0e4f64..1.0e4,
            count in 0u32..1000,
        ) {
            let result = MetricResult::from(ComputedResult::new(z, deviation, count));
            proptest::prop_assert_eq!(roundtrip(result), result);
        }

        #[test]
        fn test_time_fields_survive_text(net_time in proptest::num::u64::ANY) {
            let result = MetricResult::from(TimeResult::new(net_time));
            proptest::prop_assert_eq!(roundtrip(result), result);
        }
    }
}
