//! Module: engine::table
//! Responsibility: capacity-bounded key -> state tables.
//! Does not own: lane scheduling or batch staging.
//! Boundary: lanes fold staged batches into tables; drain merges them.

use crate::{
    engine::{EngineError, StagedBatch},
    function::{AggregateFunction, AggregateState},
    result::ResultMapping,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

///
/// TableCapacity
///
/// Hard limits of the engine hash table. Key bytes are counted as stored,
/// i.e. payload plus terminator.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableCapacity {
    max_keys: u64,
    max_key_bytes: u64,
}

impl TableCapacity {
    #[must_use]
    pub const fn with_hard_limits(max_keys: u64, max_key_bytes: u64) -> Self {
        Self {
            max_keys,
            max_key_bytes,
        }
    }

    /// No limits; used by verification paths and tests.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self::with_hard_limits(u64::MAX, u64::MAX)
    }

    #[must_use]
    pub const fn max_keys(&self) -> u64 {
        self.max_keys
    }

    #[must_use]
    pub const fn max_key_bytes(&self) -> u64 {
        self.max_key_bytes
    }
}

///
/// TableBudget
///
/// Running usage counters checked against a `TableCapacity`.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TableBudget {
    keys: u64,
    key_bytes: u64,
}

impl TableBudget {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keys: 0,
            key_bytes: 0,
        }
    }

    #[must_use]
    pub const fn keys(&self) -> u64 {
        self.keys
    }

    #[must_use]
    pub const fn key_bytes(&self) -> u64 {
        self.key_bytes
    }

    fn record_new_key(
        &mut self,
        capacity: &TableCapacity,
        payload_len: usize,
    ) -> Result<(), EngineError> {
        let next_keys = self.keys.saturating_add(1);
        if next_keys > capacity.max_keys() {
            return Err(EngineError::CapacityExceeded {
                resource: "keys",
                attempted: next_keys,
                limit: capacity.max_keys(),
            });
        }

        let stored_len = (payload_len as u64).saturating_add(1);
        let next_bytes = self.key_bytes.saturating_add(stored_len);
        if next_bytes > capacity.max_key_bytes() {
            return Err(EngineError::CapacityExceeded {
                resource: "key_bytes",
                attempted: next_bytes,
                limit: capacity.max_key_bytes(),
            });
        }

        self.keys = next_keys;
        self.key_bytes = next_bytes;

        Ok(())
    }
}

///
/// AggregateTable
///

#[derive(Debug)]
pub struct AggregateTable {
    function: AggregateFunction,
    capacity: TableCapacity,
    budget: TableBudget,
    entries: HashMap<Box<[u8]>, AggregateState>,
}

impl AggregateTable {
    #[must_use]
    pub fn new(function: AggregateFunction, capacity: TableCapacity) -> Self {
        Self {
            function,
            capacity,
            budget: TableBudget::new(),
            entries: HashMap::new(),
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

    #[must_use]
    pub const fn budget(&self) -> &TableBudget {
        &self.budget
    }

    /// Fold one key/value occurrence.
    pub fn fold(&mut self, key: &[u8], value: &[u8]) -> Result<(), EngineError> {
        if let Some(state) = self.entries.get_mut(key) {
            self.function.add(state, value)?;
            return Ok(());
        }

        self.budget.record_new_key(&self.capacity, key.len())?;
        let mut state = self.function.init_state();
        self.function.add(&mut state, value)?;
        self.entries.insert(Box::from(key), state);

        Ok(())
    }

    /// Fold every row of a staged batch.
    pub fn fold_batch(&mut self, batch: &StagedBatch) -> Result<(), EngineError> {
        for row in 0..batch.rows() {
            self.fold(batch.key(row), batch.value(row))?;
        }

        Ok(())
    }

    /// Merge another table's partial states into this one.
    pub fn merge(&mut self, other: Self) -> Result<(), EngineError> {
        for (key, state) in other.entries {
            if let Some(existing) = self.entries.get_mut(&key) {
                self.function.merge(existing, &state)?;
                continue;
            }

            self.budget.record_new_key(&self.capacity, key.len())?;
            self.entries.insert(key, state);
        }

        Ok(())
    }

    #[must_use]
    pub fn into_mapping(self) -> ResultMapping {
        self.entries.into_iter().collect()
    }
}
