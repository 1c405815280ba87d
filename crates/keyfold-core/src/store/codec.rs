//! Module: store::codec
//! Responsibility: byte layout of the record-store file.
//! Does not own: record indexing or range validation.
//! Boundary: `RecordStore::{decode, encode}` delegate here.
//!
//! Layout (integers little-endian):
//! magic[4] | version:u32 | keys_len:u64 | keys | values_len:u64 | values |
//! range_count:u64 | (start:u64, end:u64) * range_count

use crate::{
    sampling::SamplingRange,
    store::{RecordStore, StoreError, StringBlock},
};

pub const STORE_MAGIC: [u8; 4] = *b"KFRS";
pub const STORE_VERSION: u32 = 1;

const RANGE_PAIR_BYTES: u64 = 16;

pub(super) fn encode(store: &RecordStore) -> Vec<u8> {
    let keys = store.keys().as_bytes();
    let values = store.values().as_bytes();
    let mut out = Vec::with_capacity(
        4 + 4 + 8 * 3 + keys.len() + values.len() + store.ranges().len() * 16,
    );

    out.extend_from_slice(&STORE_MAGIC);
    out.extend_from_slice(&STORE_VERSION.to_le_bytes());
    write_block(&mut out, keys);
    write_block(&mut out, values);
    out.extend_from_slice(&(store.ranges().len() as u64).to_le_bytes());
    for range in store.ranges() {
        out.extend_from_slice(&(range.start() as u64).to_le_bytes());
        out.extend_from_slice(&(range.end() as u64).to_le_bytes());
    }

    out
}

fn write_block(out: &mut Vec<u8>, block: &[u8]) {
    out.extend_from_slice(&(block.len() as u64).to_le_bytes());
    out.extend_from_slice(block);
}

pub(super) fn decode(bytes: &[u8]) -> Result<RecordStore, StoreError> {
    let mut cursor = Cursor::new(bytes);

    let magic = cursor.take_array::<4>("magic")?;
    if magic != STORE_MAGIC {
        return Err(StoreError::BadMagic {
            expected: STORE_MAGIC,
            found: magic,
        });
    }
    let version = u32::from_le_bytes(cursor.take_array::<4>("version")?);
    if version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion(version));
    }

    let keys = cursor.take_block("keys block")?;
    let values = cursor.take_block("values block")?;

    let range_count = cursor.take_u64("sampling header")?;
    cursor.ensure(range_count.saturating_mul(RANGE_PAIR_BYTES), "sampling ranges")?;
    let mut ranges = Vec::with_capacity(to_usize(range_count, "range_count")?);
    for _ in 0..range_count {
        let start = to_usize(cursor.take_u64("sampling ranges")?, "range start")?;
        let end = to_usize(cursor.take_u64("sampling ranges")?, "range end")?;
        ranges.push(SamplingRange::new(start, end));
    }

    if cursor.remaining() > 0 {
        return Err(StoreError::TrailingBytes(cursor.remaining()));
    }

    Ok(RecordStore::new(keys, values, ranges))
}

fn to_usize(value: u64, field: &'static str) -> Result<usize, StoreError> {
    usize::try_from(value).map_err(|_| StoreError::ValueOverflow { field, value })
}

///
/// Cursor
///

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn ensure(&self, needed: u64, section: &'static str) -> Result<usize, StoreError> {
        let remaining = self.remaining();
        match usize::try_from(needed) {
            Ok(n) if n <= remaining => Ok(n),
            _ => Err(StoreError::Truncated {
                section,
                needed,
                remaining,
            }),
        }
    }

    fn take(&mut self, needed: u64, section: &'static str) -> Result<&'a [u8], StoreError> {
        let n = self.ensure(needed, section)?;
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;

        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, section: &'static str) -> Result<[u8; N], StoreError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(N as u64, section)?);

        Ok(out)
    }

    fn take_u64(&mut self, section: &'static str) -> Result<u64, StoreError> {
        Ok(u64::from_le_bytes(self.take_array::<8>(section)?))
    }

    fn take_block(&mut self, section: &'static str) -> Result<StringBlock, StoreError> {
        let len = self.take_u64(section)?;
        let bytes = self.take(len, section)?;

        Ok(StringBlock::from_bytes(bytes.to_vec()))
    }
}
