//! Deterministic random number generation for synthetic inputs.
//!
//! RULE: Generated logs never touch a platform RNG.
//! Every stream is derived from one master seed and a stable stream index,
//! so adding a stream never changes what the existing ones produce.

use rand::{seq::SliceRandom, Rng, RngCore, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A deterministic RNG for one generation stream.
pub struct DeterministicRng {
    inner: Pcg64Mcg,
}

impl DeterministicRng {
    /// Seed a stream from the master seed and its stable index.
    pub fn for_stream(master_seed: u64, stream: RngStream) -> Self {
        let derived_seed = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self { inner: Pcg64Mcg::seed_from_u64(derived_seed) }
    }

    /// Uniform draw from `[0, n)`.
    pub fn below(&mut self, n: u64) -> u64 {
        self.inner.gen_range(0..n)
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.inner.gen_bool(p.clamp(0.0, 1.0))
    }

    pub fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.inner);
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    Players = 0,
    Activity = 1,
    Attribution = 2,
    Corruption = 3,
    Shuffle = 4,
}
