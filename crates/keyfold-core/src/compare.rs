//! Module: compare
//! Responsibility: structural equality of two result mappings.
//! Does not own: producing either mapping.
//! Boundary: verification compares reference output (expected) with engine
//! output (actual).

use crate::{
    function::{AggregateFunction, FunctionError},
    obs::sink::{self, MetricsEvent},
    result::ResultMapping,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};
use tracing::warn;

///
/// Side
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum Side {
    #[display("expected")]
    Expected,
    #[display("actual")]
    Actual,
}

///
/// Comparison
///
/// Outcome of `compare`; mismatches carry the first differing key in
/// ascending key order.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum Comparison {
    Equal,
    MissingKey {
        key: Vec<u8>,
        missing_from: Side,
    },
    ValueMismatch {
        key: Vec<u8>,
        expected: u64,
        actual: u64,
    },
}

impl Comparison {
    #[must_use]
    pub const fn is_equal(&self) -> bool {
        matches!(self, Self::Equal)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equal => f.write_str("results match"),
            Self::MissingKey { key, missing_from } => write!(
                f,
                "key '{}' missing from {missing_from} results",
                String::from_utf8_lossy(key)
            ),
            Self::ValueMismatch {
                key,
                expected,
                actual,
            } => write!(
                f,
                "key '{}' expected {expected}, got {actual}",
                String::from_utf8_lossy(key)
            ),
        }
    }
}

/// Compare two mappings key by key under `function`.
pub fn compare(
    expected: &ResultMapping,
    actual: &ResultMapping,
    function: AggregateFunction,
) -> Result<Comparison, FunctionError> {
    let comparison = first_difference(expected, actual, function)?;
    let equal = comparison.is_equal();
    sink::record(MetricsEvent::Verification { equal });
    if !equal {
        warn!(
            expected_keys = expected.len(),
            actual_keys = actual.len(),
            mismatch = %comparison,
            "verification failed"
        );
    }

    Ok(comparison)
}

fn first_difference(
    expected: &ResultMapping,
    actual: &ResultMapping,
    function: AggregateFunction,
) -> Result<Comparison, FunctionError> {
    let mut left = expected.results(function);
    let mut right = actual.results(function);

    // Both sides iterate in ascending key order; stop at the first divergence.
    loop {
        let missing = |key: &[u8], missing_from| {
            Ok(Comparison::MissingKey {
                key: key.to_vec(),
                missing_from,
            })
        };

        match (left.next().transpose()?, right.next().transpose()?) {
            (None, None) => return Ok(Comparison::Equal),
            (Some((key, _)), None) => return missing(key, Side::Actual),
            (None, Some((key, _))) => return missing(key, Side::Expected),
            (Some((exp_key, exp_value)), Some((act_key, act_value))) => {
                match exp_key.cmp(act_key) {
                    Ordering::Less => return missing(exp_key, Side::Actual),
                    Ordering::Greater => return missing(act_key, Side::Expected),
                    Ordering::Equal if exp_value != act_value => {
                        return Ok(Comparison::ValueMismatch {
                            key: exp_key.to_vec(),
                            expected: exp_value,
                            actual: act_value,
                        });
                    }
                    Ordering::Equal => {}
                }
            }
        }
    }
}

///
/// TESTS
///
