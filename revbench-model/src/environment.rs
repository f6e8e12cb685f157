//! Environment information captured alongside a suite

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named block of environment facts (e.g. `uname`, `vcs`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Information {
    name: String,
    entries: BTreeMap<String, String>,
}

impl Information {
    /// Create a block from its entries
    pub fn new(name: impl Into<String>, entries: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Block name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of one entry
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Entries ordered by key
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the block has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
