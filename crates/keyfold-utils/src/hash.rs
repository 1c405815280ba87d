//! Stable 64-bit hashing for record payloads.
//!
//! Sketch registers depend on these values, so the seed and algorithm are
//! part of the result contract and must not change between releases.

use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Seed used for every payload hash.
pub const PAYLOAD_HASH_SEED: u64 = 0x6b65_7966_6f6c_6431;

/// Hash one payload with the stable payload seed.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxh3_64_with_seed(bytes, PAYLOAD_HASH_SEED)
}

///
/// TESTS
///
