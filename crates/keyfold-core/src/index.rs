//! Module: index
//! Responsibility: scan terminator-delimited blocks into offset tables.
//! Does not own: the store file layout or batch slicing.
//! Boundary: `RecordSet` is the read-only record source for planners and
//! the reference aggregator.

use crate::{
    error::{Error, ErrorOrigin},
    store::{RECORD_TERMINATOR, StringBlock},
};
use derive_more::Display;
use std::ops::Range;
use thiserror::Error as ThisError;

///
/// BlockKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum BlockKind {
    #[display("keys")]
    Keys,
    #[display("values")]
    Values,
}

///
/// IndexError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum IndexError {
    #[error("record count mismatch: keys block holds {keys} records, values block holds {values}")]
    RecordCountMismatch { keys: usize, values: usize },

    #[error("{block} block has an unterminated record at byte {offset}")]
    UnterminatedRecord { block: BlockKind, offset: usize },
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        Self::malformed_input(ErrorOrigin::Index, err.to_string())
    }
}

///
/// RecordIndex
///
/// Sentinel offset table for one block: `offsets[i]` is where record `i`
/// starts and `offsets[len]` equals the block length. Record lengths include
/// the terminator.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordIndex {
    offsets: Vec<u64>,
}

impl RecordIndex {
    /// Scan one block on its own.
    pub fn scan(block: &[u8], kind: BlockKind) -> Result<Self, IndexError> {
        let mut cursor = BlockCursor::new(block, kind);
        let mut offsets = vec![0];
        while let Some(next) = cursor.advance()? {
            offsets.push(next as u64);
        }

        Ok(Self { offsets })
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full offset table including the trailing sentinel.
    #[must_use]
    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    #[must_use]
    pub fn offset(&self, row: usize) -> u64 {
        self.offsets[row]
    }

    /// Record length in bytes, terminator included.
    #[must_use]
    pub fn length(&self, row: usize) -> u64 {
        self.offsets[row + 1] - self.offsets[row]
    }

    /// Block length (the sentinel offset).
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.offsets[self.len()]
    }

    /// Byte span covering rows `[rows.start, rows.end)`.
    #[must_use]
    pub fn span(&self, rows: Range<usize>) -> Range<usize> {
        to_usize(self.offsets[rows.start])..to_usize(self.offsets[rows.end])
    }

    /// Payload of one record (terminator stripped).
    #[must_use]
    pub fn payload<'a>(&self, block: &'a [u8], row: usize) -> &'a [u8] {
        let span = self.span(row..row + 1);

        &block[span.start..span.end - 1]
    }
}

///
/// RecordSet
///
/// Owned keys/values blocks plus their lockstep offset tables.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordSet {
    keys: StringBlock,
    values: StringBlock,
    key_index: RecordIndex,
    value_index: RecordIndex,
}

impl RecordSet {
    /// Scan both blocks in lockstep and check they hold the same record count.
    pub fn index(keys: StringBlock, values: StringBlock) -> Result<Self, IndexError> {
        let mut key_cursor = BlockCursor::new(&keys, BlockKind::Keys);
        let mut value_cursor = BlockCursor::new(&values, BlockKind::Values);
        let mut key_offsets = vec![0];
        let mut value_offsets = vec![0];

        loop {
            match (key_cursor.advance()?, value_cursor.advance()?) {
                (Some(key_end), Some(value_end)) => {
                    key_offsets.push(key_end as u64);
                    value_offsets.push(value_end as u64);
                }
                (None, None) => break,
                (Some(_), None) => {
                    let keys = key_offsets.len() + key_cursor.count_remaining()?;
                    return Err(IndexError::RecordCountMismatch {
                        keys,
                        values: value_offsets.len() - 1,
                    });
                }
                (None, Some(_)) => {
                    let values = value_offsets.len() + value_cursor.count_remaining()?;
                    return Err(IndexError::RecordCountMismatch {
                        keys: key_offsets.len() - 1,
                        values,
                    });
                }
            }
        }

        Ok(Self {
            keys,
            values,
            key_index: RecordIndex {
                offsets: key_offsets,
            },
            value_index: RecordIndex {
                offsets: value_offsets,
            },
        })
    }

    /// Number of records.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.key_index.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
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
    pub const fn key_index(&self) -> &RecordIndex {
        &self.key_index
    }

    #[must_use]
    pub const fn value_index(&self) -> &RecordIndex {
        &self.value_index
    }

    #[must_use]
    pub fn key(&self, row: usize) -> &[u8] {
        self.key_index.payload(&self.keys, row)
    }

    #[must_use]
    pub fn value(&self, row: usize) -> &[u8] {
        self.value_index.payload(&self.values, row)
    }
}

// Offsets never exceed an in-memory block length.
#[allow(clippy::cast_possible_truncation)]
pub(crate) const fn to_usize(offset: u64) -> usize {
    offset as usize
}

///
/// BlockCursor
///

struct BlockCursor<'a> {
    block: &'a [u8],
    kind: BlockKind,
    pos: usize,
}

impl<'a> BlockCursor<'a> {
    const fn new(block: &'a [u8], kind: BlockKind) -> Self {
        Self {
            block,
            kind,
            pos: 0,
        }
    }

    /// Step past the next record and return the offset just after its terminator.
    fn advance(&mut self) -> Result<Option<usize>, IndexError> {
        if self.pos == self.block.len() {
            return Ok(None);
        }

        let rest = &self.block[self.pos..];
        let Some(len) = rest.iter().position(|b| *b == RECORD_TERMINATOR) else {
            return Err(IndexError::UnterminatedRecord {
                block: self.kind,
                offset: self.pos,
            });
        };
        self.pos += len + 1;

        Ok(Some(self.pos))
    }

    fn count_remaining(&mut self) -> Result<usize, IndexError> {
        let mut count = 0;
        while self.advance()?.is_some() {
            count += 1;
        }

        Ok(count)
    }
}

///
/// TESTS
///
