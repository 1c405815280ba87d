//! Module: batch
//! Responsibility: slice sampling ranges into bounded batches with re-based
//! offset tables.
//! Does not own: staging copies or engine submission.
//! Boundary: batches borrow the record set; the driver consumes them in
//! emission order.


use crate::{
    error::{Error, ErrorOrigin},
    index::{RecordIndex, RecordSet},
    sampling::{SamplingPlan, SamplingRange},
};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error as ThisError;
use tracing::debug;

/// Default divisor applied to the row budget and the range length.
///
/// Tracks the per-batch lane split of the accelerator kernels. It is a
/// throughput heuristic; any positive factor yields the same results.
pub const DEFAULT_SUBDIVISION_FACTOR: usize = 8;

///
/// BatchError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum BatchError {
    #[error("batch budget field {field} must be greater than zero")]
    ZeroBudget { field: &'static str },
}

impl From<BatchError> for Error {
    fn from(err: BatchError) -> Self {
        Self::config(ErrorOrigin::Batch, err.to_string())
    }
}

///
/// BatchBudget
///
/// Row budget is primary; the byte budget is advisory and only flags
/// oversized batches.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BatchBudget {
    max_rows_per_batch: usize,
    max_bytes_per_batch: usize,
    subdivision_factor: usize,
}

impl BatchBudget {
    #[must_use]
    pub const fn new(max_rows_per_batch: usize, max_bytes_per_batch: usize) -> Self {
        Self {
            max_rows_per_batch,
            max_bytes_per_batch,
            subdivision_factor: DEFAULT_SUBDIVISION_FACTOR,
        }
    }

    #[must_use]
    pub const fn with_subdivision_factor(mut self, subdivision_factor: usize) -> Self {
        self.subdivision_factor = subdivision_factor;
        self
    }

    #[must_use]
    pub const fn max_rows_per_batch(&self) -> usize {
        self.max_rows_per_batch
    }

    #[must_use]
    pub const fn max_bytes_per_batch(&self) -> usize {
        self.max_bytes_per_batch
    }

    #[must_use]
    pub const fn subdivision_factor(&self) -> usize {
        self.subdivision_factor
    }

    pub const fn validate(&self) -> Result<(), BatchError> {
        if self.max_rows_per_batch == 0 {
            return Err(BatchError::ZeroBudget {
                field: "max_rows_per_batch",
            });
        }
        if self.max_bytes_per_batch == 0 {
            return Err(BatchError::ZeroBudget {
                field: "max_bytes_per_batch",
            });
        }
        if self.subdivision_factor == 0 {
            return Err(BatchError::ZeroBudget {
                field: "subdivision_factor",
            });
        }

        Ok(())
    }
}

///
/// Batch
///
/// Rows `[start, end)` of one sampling range. The byte spans borrow the
/// record blocks; the offset tables are re-based so entry 0 is always zero
/// and the trailing sentinel equals the span length.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Batch<'a> {
    rows: Range<usize>,
    keys: &'a [u8],
    values: &'a [u8],
    key_offsets: Vec<u64>,
    value_offsets: Vec<u64>,
    oversized: bool,
}

impl<'a> Batch<'a> {
    fn slice(records: &'a RecordSet, rows: Range<usize>, max_bytes: usize) -> Self {
        let keys = &records.keys()[records.key_index().span(rows.clone())];
        let values = &records.values()[records.value_index().span(rows.clone())];
        let oversized = keys.len() > max_bytes || values.len() > max_bytes;

        Self {
            key_offsets: rebase(records.key_index(), rows.clone()),
            value_offsets: rebase(records.value_index(), rows.clone()),
            rows,
            keys,
            values,
            oversized,
        }
    }

    /// Absolute row range in the record set.
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.rows.end - self.rows.start
    }

    #[must_use]
    pub const fn keys(&self) -> &'a [u8] {
        self.keys
    }

    #[must_use]
    pub const fn values(&self) -> &'a [u8] {
        self.values
    }

    /// Re-based key offsets, `row_count + 1` entries.
    #[must_use]
    pub fn key_offsets(&self) -> &[u64] {
        &self.key_offsets
    }

    /// Re-based value offsets, `row_count + 1` entries.
    #[must_use]
    pub fn value_offsets(&self) -> &[u64] {
        &self.value_offsets
    }

    /// True when either span exceeds the advisory byte budget.
    #[must_use]
    pub const fn is_oversized(&self) -> bool {
        self.oversized
    }

    /// Key payload for a batch-local row.
    #[must_use]
    pub fn key(&self, local_row: usize) -> &'a [u8] {
        local_payload(self.keys, &self.key_offsets, local_row)
    }

    /// Value payload for a batch-local row.
    #[must_use]
    pub fn value(&self, local_row: usize) -> &'a [u8] {
        local_payload(self.values, &self.value_offsets, local_row)
    }

    /// Give up the offset tables, keys first.
    #[must_use]
    pub fn into_offsets(self) -> (Vec<u64>, Vec<u64>) {
        (self.key_offsets, self.value_offsets)
    }
}

fn rebase(index: &RecordIndex, rows: Range<usize>) -> Vec<u64> {
    let offsets = &index.offsets()[rows.start..=rows.end];
    let base = offsets[0];

    offsets.iter().map(|offset| offset - base).collect()
}

pub(crate) fn local_payload<'a>(span: &'a [u8], offsets: &[u64], local_row: usize) -> &'a [u8] {
    let start = crate::index::to_usize(offsets[local_row]);
    let end = crate::index::to_usize(offsets[local_row + 1]);

    &span[start..end - 1]
}

///
/// BatchPlanner
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BatchPlanner {
    budget: BatchBudget,
}

impl BatchPlanner {
    pub const fn new(budget: BatchBudget) -> Result<Self, BatchError> {
        match budget.validate() {
            Ok(()) => Ok(Self { budget }),
            Err(err) => Err(err),
        }
    }

    #[must_use]
    pub const fn budget(&self) -> &BatchBudget {
        &self.budget
    }

    /// Rows per batch for one range:
    /// `max(1, min(max_rows / factor, range_rows / factor))`.
    #[must_use]
    pub fn block_row_count(&self, range: SamplingRange) -> usize {
        let factor = self.budget.subdivision_factor;
        let by_budget = self.budget.max_rows_per_batch / factor;
        let by_range = range.row_count() / factor;

        by_budget.min(by_range).max(1)
    }

    /// Lazily slice one range. The range must come from a plan resolved
    /// against `records`.
    #[must_use]
    pub fn plan_range<'a>(&self, records: &'a RecordSet, range: SamplingRange) -> RangeBatches<'a> {
        debug_assert!(range.end() < records.len(), "range outside record set");
        let stride = self.block_row_count(range);
        debug!(
            start = range.start(),
            end = range.end(),
            stride,
            "planning sampling range"
        );

        RangeBatches {
            records,
            next: range.start(),
            end: range.end_exclusive(),
            stride,
            max_bytes: self.budget.max_bytes_per_batch,
        }
    }

    /// Lazily slice every range of a plan, in plan order.
    pub fn plan<'a>(
        &self,
        records: &'a RecordSet,
        plan: &'a SamplingPlan,
    ) -> impl Iterator<Item = Batch<'a>> + 'a {
        let planner = *self;

        plan.ranges()
            .iter()
            .flat_map(move |range| planner.plan_range(records, *range))
    }
}

///
/// RangeBatches
///

#[derive(Clone, Debug)]
pub struct RangeBatches<'a> {
    records: &'a RecordSet,
    next: usize,
    end: usize,
    stride: usize,
    max_bytes: usize,
}

impl RangeBatches<'_> {
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }
}

impl<'a> Iterator for RangeBatches<'a> {
    type Item = Batch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }

        let stop = (self.next + self.stride).min(self.end);
        let batch = Batch::slice(self.records, self.next..stop, self.max_bytes);
        self.next = stop;

        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end.saturating_sub(self.next).div_ceil(self.stride);

        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RangeBatches<'_> {}
