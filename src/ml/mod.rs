// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn specific training code.
// The domain layer stays backend-free; everything that touches a
// Tensor lives here (plus the data batcher that builds them).
//
// What's in this layer:
//
//   model.rs     — The two model families and the Gumbel-softmax
//                  relaxation they share:
//                  • GumbelVae: categorical latent, single frames
//                  • CubeSae:   binary latent + action model over
//                               (state, successor) frame pairs
//
//   loss.rs      — LossStrategy per model family: the optimised
//                  objective, named diagnostic terms, preview panels
//
//   noise.rs     — Seeded host-side noise (input corruption and
//                  Gumbel sampling)
//
//   preview.rs   — Tensor → PreviewPanel conversion
//
//   epoch.rs     — One train or eval pass over a data loader
//
//   trainer.rs   — The epoch loop: schedules, passes, checkpoint
//                  selection, metrics
//
//   evaluator.rs — Loads a checkpoint and scores it once
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Jang et al. (2017) Categorical Reparameterization
//            with Gumbel-Softmax

/// Model architectures and the PuzzleModel trait
pub mod model;

/// Loss strategies and per-term helpers
pub mod loss;

/// Seeded noise source
pub mod noise;

/// Preview panel extraction
pub mod preview;

/// Single-pass train / eval runner
pub mod epoch;

/// Full training loop with evaluation and checkpointing
pub mod trainer;

/// Checkpoint evaluation
pub mod evaluator;
