//! Result mapping produced by the engine and the reference aggregator.

use crate::function::{AggregateFunction, AggregateState, FunctionError};
use std::collections::BTreeMap;

///
/// ResultMapping
///
/// Key bytes to aggregate state. Iteration is in ascending key-byte order so
/// result output is stable across runs and lane counts.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResultMapping {
    entries: BTreeMap<Box<[u8]>, AggregateState>,
}

impl ResultMapping {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Extract the final scalar for every key, in key order.
    pub fn results(
        &self,
        function: AggregateFunction,
    ) -> impl Iterator<Item = Result<(&[u8], u64), FunctionError>> + '_ {
        self.entries
            .iter()
            .map(move |(key, state)| Ok((&**key, function.result(state)?)))
    }
}

impl FromIterator<(Box<[u8]>, AggregateState)> for ResultMapping {
    fn from_iter<I: IntoIterator<Item = (Box<[u8]>, AggregateState)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_iterate_in_key_order() {
        let mapping: ResultMapping = [
            (Box::from(b"b".as_slice()), AggregateState::Count(2)),
            (Box::from(b"a".as_slice()), AggregateState::Count(5)),
        ]
        .into_iter()
        .collect();

        let rows = mapping
            .results(AggregateFunction::Count)
            .collect::<Result<Vec<_>, _>>()
            .expect("results");

        assert_eq!(rows, vec![(b"a".as_slice(), 5), (b"b".as_slice(), 2)]);
    }

    #[test]
    fn results_surface_state_mismatch() {
        let mapping: ResultMapping = [(Box::from(b"a".as_slice()), AggregateState::Count(1))]
            .into_iter()
            .collect();

        let first = mapping
            .results(AggregateFunction::UniqHll12)
            .next()
            .expect("one row");
        assert!(first.is_err());
    }
}
