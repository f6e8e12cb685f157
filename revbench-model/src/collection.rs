//! Result Collection
//!
//! At most one result per kind. `add` refuses a second result of a kind that is
//! already present; `replace` overwrites and is reserved for derived results that
//! get recomputed.

use crate::error::ModelError;
use crate::result::{MetricResult, ResultKind, TypedResult};
use std::collections::BTreeMap;

/// Heterogeneous registry of results keyed by kind
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultCollection {
    results: BTreeMap<ResultKind, MetricResult>,
}

impl ResultCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, failing on the first duplicate kind
    pub fn from_results<I, R>(results: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = R>,
        R: Into<MetricResult>,
    {
        let mut collection = Self::new();
        for result in results {
            collection.add(result)?;
        }
        Ok(collection)
    }

    /// Insert a result, failing if its kind is already set
    pub fn add(&mut self, result: impl Into<MetricResult>) -> Result<&MetricResult, ModelError> {
        let result = result.into();
        let kind = result.kind();
        if self.results.contains_key(&kind) {
            return Err(ModelError::ResultAlreadySet { kind });
        }
        Ok(self.results.entry(kind).or_insert(result))
    }

    /// Insert a result, replacing any previous result of the same kind
    pub fn replace(&mut self, result: impl Into<MetricResult>) -> Option<MetricResult> {
        let result = result.into();
        self.results.insert(result.kind(), result)
    }

    /// Move every result of `other` into this collection.
    ///
    /// Either all results are inserted or, on the first conflicting kind, none are.
    pub fn absorb(&mut self, other: ResultCollection) -> Result<(), ModelError> {
        if let Some(kind) = other.kinds().find(|kind| self.has(*kind)) {
            return Err(ModelError::ResultAlreadySet { kind });
        }
        self.results.extend(other.results);
        Ok(())
    }

    /// Whether a result of `kind` is present
    pub fn has(&self, kind: ResultKind) -> bool {
        self.results.contains_key(&kind)
    }

    /// Result of `kind`, failing if absent
    pub fn get(&self, kind: ResultKind) -> Result<&MetricResult, ModelError> {
        self.results
            .get(&kind)
            .ok_or(ModelError::ResultNotSet { kind })
    }

    /// Typed result, failing if absent
    pub fn get_as<T: TypedResult>(&self) -> Result<&T, ModelError> {
        self.find::<T>()
            .ok_or(ModelError::ResultNotSet { kind: T::KIND })
    }

    /// Typed result, if present
    pub fn find<T: TypedResult>(&self) -> Option<&T> {
        self.results.get(&T::KIND).and_then(T::from_metric)
    }

    /// Results ordered by kind
    pub fn iter(&self) -> impl Iterator<Item = &MetricResult> {
        self.results.values()
    }

    /// Kinds present, in order
    pub fn kinds(&self) -> impl Iterator<Item = ResultKind> + '_ {
        self.results.keys().copied()
    }

    /// Number of results
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the collection holds no results
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.results.clear();
    }
}

impl<'a> IntoIterator for &'a ResultCollection {
    type Item = &'a MetricResult;
    type IntoIter = std::collections::btree_map::Values<'a, ResultKind, MetricResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{ComputedResult, MemoryResult, TimeResult};

    #[test]
    fn test_add_and_get() {
        let mut collection = ResultCollection::new();
        collection.add(TimeResult::new(10)).unwrap();

        assert_eq!(collection.get_as::<TimeResult>().unwrap().net_time(), 10);
        assert_eq!(
            collection.get(ResultKind::Time).unwrap(),
            &MetricResult::Time(TimeResult::new(10))
        );
    }

    #[test]
    fn test_add_same_kind_twice_fails() {
        let mut collection = ResultCollection::new();
        collection.add(TimeResult::new(1)).unwrap();

        let err = collection.add(TimeResult::new(2)).unwrap_err();
        assert_eq!(err, ModelError::ResultAlreadySet { kind: ResultKind::Time });
        assert_eq!(err.to_string(), "result of kind \"time\" has already been set");
        assert_eq!(collection.get_as::<TimeResult>().unwrap().net_time(), 1);
    }

    #[test]
    fn test_get_missing_fails_and_has_does_not() {
        let collection = ResultCollection::new();

        assert!(!collection.has(ResultKind::Memory));
        assert_eq!(
            collection.get(ResultKind::Memory).unwrap_err(),
            ModelError::ResultNotSet { kind: ResultKind::Memory }
        );
        assert!(collection.find::<MemoryResult>().is_none());
    }

    #[test]
    fn test_replace_bypasses_duplicate_check() {
        let mut collection = ResultCollection::new();
        collection.add(ComputedResult::new(0.0, 0.0, 0)).unwrap();

        let previous = collection.replace(ComputedResult::new(1.0, 5.0, 1));
        assert_eq!(previous, Some(MetricResult::Computed(ComputedResult::new(0.0, 0.0, 0))));
        assert_eq!(collection.get_as::<ComputedResult>().unwrap().deviation(), 5.0);
    }

    #[test]
    fn test_from_results_rejects_duplicates() {
        let result = ResultCollection::from_results([
            MetricResult::from(TimeResult::new(1)),
            MetricResult::from(TimeResult::new(2)),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_absorb_is_all_or_nothing() {
        let mut target = ResultCollection::from_results([TimeResult::new(5)]).unwrap();
        let incoming = ResultCollection::from_results([
            MetricResult::from(MemoryResult::new(64)),
            MetricResult::from(TimeResult::new(6)),
        ])
        .unwrap();

        assert!(target.absorb(incoming).is_err());
        assert_eq!(target.len(), 1);
        assert!(!target.has(ResultKind::Memory));
    }

    #[test]
    fn test_iteration_is_ordered_by_kind() {
        let collection = ResultCollection::from_results([
            MetricResult::from(ComputedResult::new(0.0, 0.0, 0)),
            MetricResult::from(MemoryResult::new(1)),
            MetricResult::from(TimeResult::new(1)),
        ])
        .unwrap();

        let kinds: Vec<ResultKind> = collection.iter().map(MetricResult::kind).collect();
        assert_eq!(
            kinds,
            vec![ResultKind::Time, ResultKind::Memory, ResultKind::Computed]
        );
    }
}
