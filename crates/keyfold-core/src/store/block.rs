use crate::store::StoreError;
use derive_more::Deref;

/// Byte that terminates every record in a string block.
pub const RECORD_TERMINATOR: u8 = 0;

///
/// StringBlock
///
/// Owned contiguous buffer of terminator-delimited records.
/// Blocks built through `push_record` never contain an embedded terminator;
/// blocks adopted through `from_bytes` are checked by the indexer.
///

#[derive(Clone, Debug, Default, Deref, Eq, PartialEq)]
pub struct StringBlock(Vec<u8>);

impl StringBlock {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Adopt a raw buffer as-is.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Build a block from record payloads.
    pub fn from_records<I, R>(records: I) -> Result<Self, StoreError>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[u8]>,
    {
        let mut block = Self::new();
        for record in records {
            block.push_record(record.as_ref())?;
        }

        Ok(block)
    }

    /// Append one payload followed by the terminator.
    pub fn push_record(&mut self, payload: &[u8]) -> Result<(), StoreError> {
        if let Some(position) = payload.iter().position(|b| *b == RECORD_TERMINATOR) {
            return Err(StoreError::EmbeddedTerminator { position });
        }

        self.0.extend_from_slice(payload);
        self.0.push(RECORD_TERMINATOR);

        Ok(())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}
