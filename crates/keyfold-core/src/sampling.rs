//! Module: sampling
//! Responsibility: resolve which row ranges participate in a run.
//! Does not own: batch slicing inside a range.
//! Boundary: consumed by the batch planner and the reference aggregator.

use crate::error::{Error, ErrorOrigin};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// SamplingError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SamplingError {
    #[error("sampling range [{start}, {end}] is inverted")]
    InvertedRange { start: usize, end: usize },

    #[error("sampling range [{start}, {end}] exceeds record count {rows}")]
    OutOfBounds {
        start: usize,
        end: usize,
        rows: usize,
    },
}

impl From<SamplingError> for Error {
    fn from(err: SamplingError) -> Self {
        Self::malformed_input(ErrorOrigin::Sampling, err.to_string())
    }
}

///
/// SamplingRange
///
/// Inclusive `[start, end]` row interval.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SamplingRange {
    start: usize,
    end: usize,
}

impl SamplingRange {
    /// Build a range without validation; `SamplingPlan::resolve` checks bounds.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn start(self) -> usize {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> usize {
        self.end
    }

    /// One past the last row.
    #[must_use]
    pub const fn end_exclusive(self) -> usize {
        self.end + 1
    }

    /// Number of rows covered.
    #[must_use]
    pub const fn row_count(self) -> usize {
        self.end - self.start + 1
    }
}

///
/// SamplingPlan
///
/// Ordered ranges; insertion order is processing order.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SamplingPlan {
    ranges: Vec<SamplingRange>,
}

impl SamplingPlan {
    /// Resolve explicit ranges, or every row when none are supplied.
    ///
    /// An empty record store with no explicit ranges resolves to an empty plan.
    pub fn resolve(explicit: Option<&[SamplingRange]>, rows: usize) -> Result<Self, SamplingError> {
        let ranges = match explicit {
            Some(ranges) if !ranges.is_empty() => {
                for range in ranges {
                    validate_range(*range, rows)?;
                }
                ranges.to_vec()
            }
            _ if rows == 0 => Vec::new(),
            _ => vec![SamplingRange::new(0, rows - 1)],
        };

        Ok(Self { ranges })
    }

    #[must_use]
    pub fn ranges(&self) -> &[SamplingRange] {
        &self.ranges
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Rows visited across all ranges; overlapping ranges count twice.
    #[must_use]
    pub fn total_row_count(&self) -> usize {
        self.ranges.iter().map(|range| range.row_count()).sum()
    }
}

const fn validate_range(range: SamplingRange, rows: usize) -> Result<(), SamplingError> {
    if range.start > range.end {
        return Err(SamplingError::InvertedRange {
            start: range.start,
            end: range.end,
        });
    }
    if range.end >= rows {
        return Err(SamplingError::OutOfBounds {
            start: range.start,
            end: range.end,
            rows,
        });
    }

    Ok(())
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_without_ranges_covers_every_row() {
        let plan = SamplingPlan::resolve(None, 5).expect("full plan");

        assert_eq!(plan.ranges(), &[SamplingRange::new(0, 4)]);
        assert_eq!(plan.total_row_count(), 5);
    }

    #[test]
    fn resolve_with_empty_ranges_covers_every_row() {
        let plan = SamplingPlan::resolve(Some(&[]), 3).expect("full plan");

        assert_eq!(plan.ranges(), &[SamplingRange::new(0, 2)]);
    }

    #[test]
    fn resolve_empty_store_yields_empty_plan() {
        let plan = SamplingPlan::resolve(None, 0).expect("empty plan");

        assert!(plan.is_empty());
        assert_eq!(plan.total_row_count(), 0);
    }

    #[test]
    fn resolve_keeps_explicit_order_and_overlap() {
        let ranges = [
            SamplingRange::new(4, 7),
            SamplingRange::new(0, 1),
            SamplingRange::new(5, 5),
        ];
        let plan = SamplingPlan::resolve(Some(&ranges), 8).expect("explicit plan");

        assert_eq!(plan.ranges(), &ranges);
        assert_eq!(plan.total_row_count(), 4 + 2 + 1);
    }

    #[test]
    fn resolve_rejects_inverted_range() {
        let err = SamplingPlan::resolve(Some(&[SamplingRange::new(3, 2)]), 8)
            .expect_err("inverted range must fail");

        assert_eq!(err, SamplingError::InvertedRange { start: 3, end: 2 });
    }

    #[test]
    fn resolve_rejects_range_past_last_row() {
        let err = SamplingPlan::resolve(Some(&[SamplingRange::new(0, 8)]), 8)
            .expect_err("out-of-bounds range must fail");

        assert_eq!(
            err,
            SamplingError::OutOfBounds {
                start: 0,
                end: 8,
                rows: 8
            }
        );
    }

    #[test]
    fn explicit_ranges_on_empty_store_are_out_of_bounds() {
        assert!(SamplingPlan::resolve(Some(&[SamplingRange::new(0, 0)]), 0).is_err());
    }
}
