//! Seeded pseudo-random numbers.
//!
//! Every random draw made during generation goes through [`WorldRng`], so a
//! world seed fully determines the permutation tables and the per-cell
//! decoration rolls.

use terra_common::RegionCoord;

/// Mixes a seed with a salt (SplitMix64 finalizer).
///
/// Used to derive independent streams from one world seed.
#[must_use]
pub const fn mix_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed ^ salt.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Deterministic random number generator.
#[derive(Debug, Clone)]
pub struct WorldRng {
    rng: fastrand::Rng,
}

impl WorldRng {
    /// Creates a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Creates the stream used for one region's random grid.
    #[must_use]
    pub fn for_region(seed: u64, region: RegionCoord) -> Self {
        let salt = (u64::from(region.x as u32) << 32) | u64::from(region.y as u32);
        Self::new(mix_seed(seed, salt))
    }

    /// Uniform `u32`.
    pub fn next_u32(&mut self) -> u32 {
        self.rng.u32(..)
    }

    /// Uniform float in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.rng.f32()
    }

    /// Uniform index in `[0, bound]`.
    pub fn index_inclusive(&mut self, bound: usize) -> usize {
        self.rng.usize(..=bound)
    }

    /// Fisher-Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index_inclusive(i);
            items.swap(i, j);
        }
    }
}
