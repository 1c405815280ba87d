//! HyperLogLog sketch with fixed precision 12 (4096 registers).
//!
//! Relative standard error is about 1.04 / sqrt(4096), roughly 1.6%.

use keyfold_utils::hash::hash_bytes;

/// Number of hash bits used to select a register.
pub const HLL_PRECISION: u32 = 12;

/// Register count (`2^HLL_PRECISION`).
pub const HLL_REGISTERS: usize = 1 << HLL_PRECISION;

///
/// HllSketch
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HllSketch {
    registers: Vec<u8>,
}

impl HllSketch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: vec![0; HLL_REGISTERS],
        }
    }

    /// Fold one payload into the sketch.
    pub fn insert(&mut self, value: &[u8]) {
        self.insert_hash(hash_bytes(value));
    }

    /// Fold one pre-computed 64-bit hash into the sketch.
    #[allow(clippy::cast_possible_truncation)]
    pub fn insert_hash(&mut self, hash: u64) {
        let index = (hash >> (64 - HLL_PRECISION)) as usize;
        // guard bit caps the rank at 64 - precision + 1
        let rest = (hash << HLL_PRECISION) | (1 << (HLL_PRECISION - 1));
        let rank = rest.leading_zeros() as u8 + 1;

        let register = &mut self.registers[index];
        if rank > *register {
            *register = rank;
        }
    }

    /// Register-wise maximum with another sketch.
    pub fn merge(&mut self, other: &Self) {
        for (register, other) in self.registers.iter_mut().zip(&other.registers) {
            *register = (*register).max(*other);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|r| *r == 0)
    }

    /// Raw cardinality estimate with linear-counting small-range correction.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn estimate(&self) -> f64 {
        let m = HLL_REGISTERS as f64;
        let alpha = 0.7213 / (1.0 + 1.079 / m);
        let mut sum = 0.0;
        let mut zeros = 0usize;
        for register in &self.registers {
            sum += (-f64::from(*register)).exp2();
            if *register == 0 {
                zeros += 1;
            }
        }

        let raw = alpha * m * m / sum;
        if raw <= 2.5 * m && zeros > 0 {
            m * (m / zeros as f64).ln()
        } else {
            raw
        }
    }

    /// Estimate rounded to the nearest whole count.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn cardinality(&self) -> u64 {
        self.estimate().round() as u64
    }
}

impl Default for HllSketch {
    fn default() -> Self {
        Self::new()
    }
}

///
/// TESTS
///
