//! Deterministic utilities for reproducible splits and training
//!
//! A seeded linear congruential generator drives every shuffle, and split
//! ties are broken by a total order, so runs are repeatable across
//! platforms.

/// 64-bit linear congruential generator (Knuth's MMIX constants) with an
/// xor-shift output step.
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: u64,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6_364_136_223_846_793_005;
    const INCREMENT: u64 = 1_442_695_040_888_963_407;

    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: seed };
        // Mix once so small seeds do not start from a near-zero state.
        rng.next_u64();
        rng
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        let x = self.state;
        x ^ (x >> 33)
    }

    /// Value in `[0, bound)`; 0 when `bound` is 0.
    pub fn next_below(&mut self, bound: u64) -> u64 {
        ((self.next_u64() as u128 * bound as u128) >> 64) as u64
    }
}

/// Fisher–Yates permutation of `0..n` driven by `seed`.
pub fn shuffled_indices(n: usize, seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = LcgRng::new(seed);
    for i in (1..n).rev() {
        let j = rng.next_below(i as u64 + 1) as usize;
        indices.swap(i, j);
    }
    indices
}

/// Total order used to pick between equal-gain split candidates.
/// Lower feature index wins, then lower threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: i64) -> Self {
        Self {
            feature_idx,
            threshold,
        }
    }
}
