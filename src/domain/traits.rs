// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between the training loop and its collaborators.
//
//   SampleSource    — anything that produces frame samples
//                     (PNG directory, synthetic puzzle generator)
//   CheckpointSink  — anything that can persist a model
//                     (CheckpointManager on disk, a recorder in tests)
//   PreviewSink     — anything that can show the first evaluation
//                     batch of an epoch (PNG grid writer)
//
// The loop is written against these traits so that none of the
// collaborators need a GPU, a filesystem, or each other to be tested.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::frame::{FrameSample, FrameShape, PreviewPanel};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Produces every sample of one dataset together with the frame shape.
///
/// Implementations:
///   - PngFrameLoader → a directory of .png files
///   - SlidingPuzzle  → generated 3x3 sliding-tile boards
pub trait SampleSource {
    fn load_all(&self) -> Result<(FrameShape, Vec<FrameSample>)>;
}

// ─── CheckpointSink ───────────────────────────────────────────────────────────
/// Persists the full parameter state of a model.
/// Each call replaces whatever the previous call wrote.
pub trait CheckpointSink<M> {
    fn save(&self, model: &M) -> Result<()>;
}

// ─── PreviewSink ──────────────────────────────────────────────────────────────
/// Receives the panels of the first evaluation batch of an epoch.
/// Purely observational: nothing is read back.
pub trait PreviewSink {
    fn show(&self, epoch: usize, panels: &[PreviewPanel]) -> Result<()>;
}
