//! Module: store
//! Responsibility: the flat record-store file and its owned string blocks.
//! Does not own: record offset tables or sampling-range validation.
//! Boundary: produces owned blocks + raw sampling ranges for the indexer.

mod block;
mod codec;


pub use block::{RECORD_TERMINATOR, StringBlock};
pub use codec::{STORE_MAGIC, STORE_VERSION};

use crate::{
    error::{Error, ErrorOrigin},
    sampling::SamplingRange,
};
use std::{fs, path::Path};
use thiserror::Error as ThisError;

///
/// StoreError
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("record store truncated in {section}: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        section: &'static str,
        needed: u64,
        remaining: usize,
    },

    #[error("record store magic mismatch: expected {expected:?}, found {found:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported record store version {0}")]
    UnsupportedVersion(u32),

    #[error("record store has {0} trailing bytes after the sampling header")]
    TrailingBytes(usize),

    #[error("sampling header value does not fit in memory: {field}={value}")]
    ValueOverflow { field: &'static str, value: u64 },

    #[error("record payload contains an embedded terminator at byte {position}")]
    EmbeddedTerminator { position: usize },

    #[error("record store I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::Io(source) => Self::io(ErrorOrigin::Store, source),
            _ => Self::malformed_input(ErrorOrigin::Store, err.to_string()),
        }
    }
}

///
/// RecordStore
///
/// One run's input: a keys block, a values block with the same record count
/// in matching order, and the sampling ranges carried by the file header.
/// Ranges are stored as written; validation against the record count happens
/// when the sampling plan is resolved.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RecordStore {
    keys: StringBlock,
    values: StringBlock,
    ranges: Vec<SamplingRange>,
}

impl RecordStore {
    #[must_use]
    pub const fn new(keys: StringBlock, values: StringBlock, ranges: Vec<SamplingRange>) -> Self {
        Self {
            keys,
            values,
            ranges,
        }
    }

    /// Build a store from key/value pairs with no sampling header.
    pub fn from_records<I, K, V>(records: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut keys = StringBlock::new();
        let mut values = StringBlock::new();
        for (key, value) in records {
            keys.push_record(key.as_ref())?;
            values.push_record(value.as_ref())?;
        }

        Ok(Self::new(keys, values, Vec::new()))
    }

    /// Replace the sampling header.
    #[must_use]
    pub fn with_ranges(mut self, ranges: Vec<SamplingRange>) -> Self {
        self.ranges = ranges;
        self
    }

    #[must_use]
    pub const fn keys(&self) -> &StringBlock {
        &self.keys
    }

    #[must_use]
    pub const fn values(&self) -> &StringBlock {
        &self.values
    }

    #[must_use]
    pub fn ranges(&self) -> &[SamplingRange] {
        &self.ranges
    }

    #[must_use]
    pub fn into_parts(self) -> (StringBlock, StringBlock, Vec<SamplingRange>) {
        (self.keys, self.values, self.ranges)
    }

    /// Decode a store from its on-disk byte layout.
    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        codec::decode(bytes)
    }

    /// Encode this store into its on-disk byte layout.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        codec::encode(self)
    }

    /// Read and decode a store file.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let bytes = fs::read(path)?;

        Self::decode(&bytes)
    }

    /// Encode and write this store to a file, replacing any existing file.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        fs::write(path, self.encode())?;

        Ok(())
    }
}
