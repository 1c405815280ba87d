//! Fan-out copies over disjoint byte ranges.
//!
//! Workers only share the read-only source and write into non-overlapping
//! destination chunks, so no synchronization beyond the scope join is needed.

use std::thread;

/// Below this size a single `copy_from_slice` beats spawning workers.
pub const MIN_PARALLEL_COPY_BYTES: usize = 64 * 1024;

/// Copy `src` into `dst` using up to `threads` scoped workers.
///
/// Panics if the slices differ in length.
pub fn parallel_copy(dst: &mut [u8], src: &[u8], threads: usize) {
    assert_eq!(
        dst.len(),
        src.len(),
        "parallel copy requires equally sized source and destination",
    );

    if threads <= 1 || src.len() < MIN_PARALLEL_COPY_BYTES {
        dst.copy_from_slice(src);
        return;
    }

    let chunk = src.len().div_ceil(threads);
    thread::scope(|scope| {
        for (dst_chunk, src_chunk) in dst.chunks_mut(chunk).zip(src.chunks(chunk)) {
            scope.spawn(move || dst_chunk.copy_from_slice(src_chunk));
        }
    });
}

/// Copy `src` into a freshly allocated buffer using up to `threads` workers.
#[must_use]
pub fn parallel_to_vec(src: &[u8], threads: usize) -> Vec<u8> {
    let mut dst = vec![0; src.len()];
    parallel_copy(&mut dst, src, threads);

    dst
}

///
/// TESTS
///
