// ============================================================
// Layer 5 — Noise Source
// ============================================================
// Host-side random tensors drawn from a seeded StdRng.
//
// The backend's global RNG is shared by everything running on
// it, so two passes seeded the same way could still diverge.
// Drawing from our own StdRng and uploading with from_data makes
// a pass depend only on the seed it was handed.
//
// Used for:
//   - denoising input noise  N(0, σ²), added to both frames
//   - Gumbel sampling        U[0, 1)

use burn::{
    prelude::*,
    tensor::{Distribution, TensorData},
};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::batcher::FrameBatch;

pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    pub fn seeded(seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed) }
    }

    fn sample<B: Backend, const D: usize>(
        &mut self,
        dims:         [usize; D],
        distribution: Distribution,
        device:       &B::Device,
    ) -> Tensor<B, D> {
        let data = TensorData::random::<f32, _, _>(dims.to_vec(), distribution, &mut self.rng);
        Tensor::from_data(data, device)
    }

    /// Uniform [0, 1) tensor of the given shape.
    pub fn uniform<B: Backend, const D: usize>(
        &mut self,
        dims:   [usize; D],
        device: &B::Device,
    ) -> Tensor<B, D> {
        self.sample(dims, Distribution::Uniform(0.0, 1.0), device)
    }

    /// `x + N(0, std²)`, elementwise and independent.
    pub fn gaussian_like<B: Backend, const D: usize>(
        &mut self,
        x:   Tensor<B, D>,
        std: f64,
    ) -> Tensor<B, D> {
        let noise = self.sample(x.dims(), Distribution::Normal(0.0, std), &x.device());
        x + noise
    }

    /// Corrupt both frames of a batch. `None` leaves the batch untouched.
    pub fn perturb<B: Backend>(&mut self, batch: &FrameBatch<B>, std: Option<f64>) -> FrameBatch<B> {
        let Some(std) = std else {
            return batch.clone();
        };
        FrameBatch {
            images: self.gaussian_like(batch.images.clone(), std),
            next:   batch.next.clone().map(|n| self.gaussian_like(n, std)),
        }
    }
}
