// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that define the training loop's
// vocabulary: schedules, loss bookkeeping, best-loss tracking,
// seeds, frames, and the collaborator traits.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything here is unit-testable without a tensor backend.

/// Frame samples, frame shapes, and preview panels
pub mod frame;

/// Temperature and learning-rate schedules
pub mod schedule;

/// Per-pass loss accumulation and epoch reports
pub mod losses;

/// Strict-improvement tracking of the held-out loss
pub mod best_loss;

/// Master-seed driven seed sequence
pub mod random;

/// Core abstractions (traits) that other layers implement
pub mod traits;
