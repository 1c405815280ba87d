//! Small shared helpers for Keyfold crates: stable byte hashing and
//! fan-out memory copies used when staging batches.

pub mod copy;
pub mod hash;
