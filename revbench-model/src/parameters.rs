//! Parameter Sets
//!
//! Named parameters handed to a subject for one variant. Values are strings or
//! nested collections; subjects parse what they need.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A parameter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    /// Scalar value
    Scalar(String),
    /// Nested named parameters
    Collection(BTreeMap<String, ParameterValue>),
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Scalar(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::Scalar(value)
    }
}

/// Parameters of one variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    index: usize,
    values: BTreeMap<String, ParameterValue>,
}

impl ParameterSet {
    /// Create an empty parameter set with the given index
    pub fn new(index: usize) -> Self {
        Self {
            index,
            values: BTreeMap::new(),
        }
    }

    /// Create a parameter set from values
    pub fn from_values(index: usize, values: BTreeMap<String, ParameterValue>) -> Self {
        Self { index, values }
    }

    /// Add a parameter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Position of this set among its subject's parameter sets
    pub fn index(&self) -> usize {
        self.index
    }

    /// Raw value of a parameter
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// Scalar value of a parameter
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParameterValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    /// Scalar value parsed into `T`
    pub fn parse<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get_str(name).and_then(|value| value.parse().ok())
    }

    /// Parameters ordered by name
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Number of top-level parameters
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no parameters
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode as JSON for handing to an isolated process
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from [`ParameterSet::to_json`] output
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
