use crate::batch::{Batch, local_payload};
use keyfold_utils::copy::parallel_to_vec;

///
/// StagedBatch
///
/// Engine-owned copy of one batch: the transfer-buffer image the engine
/// reads after `enqueue` returns. Offsets stay batch-relative.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagedBatch {
    rows: usize,
    keys: Vec<u8>,
    key_offsets: Vec<u64>,
    values: Vec<u8>,
    value_offsets: Vec<u64>,
}

impl StagedBatch {
    /// Copy the batch spans using up to `copy_threads` workers and take
    /// ownership of its re-based offset tables.
    #[must_use]
    pub fn stage(batch: Batch<'_>, copy_threads: usize) -> Self {
        let rows = batch.row_count();
        let keys = parallel_to_vec(batch.keys(), copy_threads);
        let values = parallel_to_vec(batch.values(), copy_threads);
        let (key_offsets, value_offsets) = batch.into_offsets();

        Self {
            rows,
            keys,
            key_offsets,
            values,
            value_offsets,
        }
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn key_bytes(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn value_bytes(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn key(&self, local_row: usize) -> &[u8] {
        local_payload(&self.keys, &self.key_offsets, local_row)
    }

    #[must_use]
    pub fn value(&self, local_row: usize) -> &[u8] {
        local_payload(&self.values, &self.value_offsets, local_row)
    }
}
