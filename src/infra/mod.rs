// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything the training loop writes to disk:
//
//   checkpoint.rs  — Model weights and the TrainConfig that built
//                    them, plus the CheckpointSelector that decides
//                    when a new best model gets written.
//
//   metrics.rs     — One CSV row per epoch (temperatures, learning
//                    rate, losses, diagnostic terms).
//
//   visualizer.rs  — Grayscale PNG grid of the first evaluation
//                    batch of every epoch.
//
// Each writer sits behind a trait from the domain layer
// (CheckpointSink, PreviewSink) or is optional, so the loop can
// be tested with in-memory stand-ins.
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving, loading and best-model selection
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Diagnostic preview grid
pub mod visualizer;
