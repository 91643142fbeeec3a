// ============================================================
// Layer 3 — Seed Sequence
// ============================================================
// Every random consumer in a run (data split, synthetic puzzle
// generator, loader shuffling, input noise, Gumbel sampling)
// draws its own seed from one master seed. Re-running with the
// same master seed replays the same run.

use rand::{rngs::StdRng, Rng, SeedableRng};

pub struct SeedSequence {
    rng: StdRng,
}

impl SeedSequence {
    pub fn new(master_seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(master_seed) }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.gen()
    }
}
