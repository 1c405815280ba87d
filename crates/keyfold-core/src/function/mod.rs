//! Module: function
//! Responsibility: per-key aggregate functions and their accumulator states.
//! Does not own: key lookup, table capacity, or batch iteration.
//! Boundary: the engine, the reference aggregator, and the comparator all
//! fold through this one contract.

mod hll;

pub use hll::{HLL_PRECISION, HLL_REGISTERS, HllSketch};

use crate::error::{Error, ErrorKind, ErrorOrigin};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error as ThisError;

///
/// FunctionError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum FunctionError {
    #[error("unknown aggregate function: {0} (expected COUNT or uniqHLL12)")]
    UnknownFunction(String),

    #[error("aggregate state does not belong to function {function}")]
    StateMismatch { function: AggregateFunction },
}

impl From<FunctionError> for Error {
    fn from(err: FunctionError) -> Self {
        match err {
            FunctionError::UnknownFunction(_) => {
                Self::config(ErrorOrigin::Function, err.to_string())
            }
            FunctionError::StateMismatch { .. } => {
                Self::new(ErrorKind::Internal, ErrorOrigin::Function, err.to_string())
            }
        }
    }
}

///
/// AggregateFunction
///
/// Resolved once from its name at configuration time. Every variant folds
/// associatively and commutatively, so batches and lanes may merge in any
/// order.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum AggregateFunction {
    /// Exact row count per key; values are ignored.
    #[display("COUNT")]
    Count,

    /// Approximate distinct-value count per key (HyperLogLog, precision 12).
    #[display("uniqHLL12")]
    UniqHll12,
}

impl AggregateFunction {
    /// Resolve a function from its external name.
    pub fn from_name(name: &str) -> Result<Self, FunctionError> {
        match name {
            "COUNT" => Ok(Self::Count),
            "uniqHLL12" => Ok(Self::UniqHll12),
            other => Err(FunctionError::UnknownFunction(other.to_string())),
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::UniqHll12 => "uniqHLL12",
        }
    }

    /// Build the accumulator identity.
    #[must_use]
    pub fn init_state(self) -> AggregateState {
        match self {
            Self::Count => AggregateState::Count(0),
            Self::UniqHll12 => AggregateState::Distinct(Box::default()),
        }
    }

    /// Fold one value into a state.
    pub fn add(self, state: &mut AggregateState, value: &[u8]) -> Result<(), FunctionError> {
        match (self, state) {
            (Self::Count, AggregateState::Count(count)) => {
                *count = count.saturating_add(1);
                Ok(())
            }
            (Self::UniqHll12, AggregateState::Distinct(sketch)) => {
                sketch.insert(value);
                Ok(())
            }
            _ => Err(FunctionError::StateMismatch { function: self }),
        }
    }

    /// Fold a whole partial state into `state`.
    pub fn merge(
        self,
        state: &mut AggregateState,
        other: &AggregateState,
    ) -> Result<(), FunctionError> {
        match (self, state, other) {
            (Self::Count, AggregateState::Count(count), AggregateState::Count(other)) => {
                *count = count.saturating_add(*other);
                Ok(())
            }
            (
                Self::UniqHll12,
                AggregateState::Distinct(sketch),
                AggregateState::Distinct(other),
            ) => {
                sketch.merge(other);
                Ok(())
            }
            _ => Err(FunctionError::StateMismatch { function: self }),
        }
    }

    /// Extract the final scalar.
    pub fn result(self, state: &AggregateState) -> Result<u64, FunctionError> {
        match (self, state) {
            (Self::Count, AggregateState::Count(count)) => Ok(*count),
            (Self::UniqHll12, AggregateState::Distinct(sketch)) => Ok(sketch.cardinality()),
            _ => Err(FunctionError::StateMismatch { function: self }),
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = FunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s)
    }
}

///
/// AggregateState
///
/// Per-key accumulator, owned by the table or mapping entry holding it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AggregateState {
    Count(u64),
    Distinct(Box<HllSketch>),
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_name_resolves_known_functions() {
        assert_eq!(
            AggregateFunction::from_name("COUNT"),
            Ok(AggregateFunction::Count)
        );
        assert_eq!(
            "uniqHLL12".parse::<AggregateFunction>(),
            Ok(AggregateFunction::UniqHll12)
        );
    }

    #[test]
    fn from_name_is_case_sensitive_and_rejects_unknown() {
        for name in ["FOO", "count", "uniqhll12", ""] {
            let err = AggregateFunction::from_name(name).expect_err("unknown name must fail");
            assert_eq!(err, FunctionError::UnknownFunction(name.to_string()));
        }
    }

    #[test]
    fn unknown_function_maps_to_config_error() {
        let err: Error = AggregateFunction::from_name("FOO")
            .expect_err("unknown")
            .into();

        assert_eq!(err.kind, ErrorKind::Config);
        assert_eq!(err.origin, ErrorOrigin::Function);
    }

    #[test]
    fn display_matches_external_names() {
        for function in [AggregateFunction::Count, AggregateFunction::UniqHll12] {
            assert_eq!(function.to_string(), function.name());
        }
    }

    #[test]
    fn count_ignores_values_and_merges_by_sum() {
        let function = AggregateFunction::Count;
        let mut left = function.init_state();
        let mut right = function.init_state();
        for value in [b"x".as_slice(), b"x", b"y"] {
            function.add(&mut left, value).expect("add");
        }
        function.add(&mut right, b"z").expect("add");
        function.merge(&mut left, &right).expect("merge");

        assert_eq!(function.result(&left), Ok(4));
    }

    #[test]
    fn distinct_counts_values_not_rows() {
        let function = AggregateFunction::UniqHll12;
        let mut state = function.init_state();
        for value in [b"x".as_slice(), b"x", b"y", b"y", b"z"] {
            function.add(&mut state, value).expect("add");
        }

        assert_eq!(function.result(&state), Ok(3));
    }

    #[test]
    fn distinct_merge_is_union() {
        let function = AggregateFunction::UniqHll12;
        let mut left = function.init_state();
        let mut right = function.init_state();
        function.add(&mut left, b"a").expect("add");
        function.add(&mut left, b"b").expect("add");
        function.add(&mut right, b"b").expect("add");
        function.add(&mut right, b"c").expect("add");
        function.merge(&mut left, &right).expect("merge");

        assert_eq!(function.result(&left), Ok(3));
    }

    #[test]
    fn mismatched_state_is_rejected() {
        let mut state = AggregateFunction::Count.init_state();
        let err = AggregateFunction::UniqHll12
            .add(&mut state, b"x")
            .expect_err("state mismatch must fail");

        assert_eq!(
            err,
            FunctionError::StateMismatch {
                function: AggregateFunction::UniqHll12
            }
        );
        assert!(AggregateFunction::Count
            .result(&AggregateFunction::UniqHll12.init_state())
            .is_err());
    }
}
