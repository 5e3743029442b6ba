//! Kernel-owned randomness: every random choice in the core draws from here.
//!
//! The simulation never reads wall-clock entropy; `KernelRng` is seeded from
//! the scenario so that two runs with the same inputs replay identically.

use bevy_ecs::prelude::Resource;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Resource)]
pub struct KernelRng {
    rng: StdRng,
}

impl KernelRng {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniform index into a candidate list of `len` elements.
    ///
    /// The RNG state advances exactly once per call, including for `len == 1`,
    /// so strategy choices consume entropy deterministically regardless of
    /// how many candidates happen to be available.
    pub fn pick_index(&mut self, len: usize) -> usize {
        assert!(len > 0, "pick_index called with an empty candidate set");
        self.rng.gen_range(0..len)
    }
}
