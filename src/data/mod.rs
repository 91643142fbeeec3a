// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from frames on disk (or generated in memory) to
// tensor batches.
//
//   PngFrameLoader / SlidingPuzzle   → Vec<FrameSample>
//       │
//       ▼
//   split_train_test                 → train / test samples
//       │
//       ▼
//   PuzzleDataset                    → implements Burn's Dataset
//       │
//       ▼
//   FrameBatcher                     → stacks samples into tensors
//       │
//       ▼
//   DataLoader                       → feeds batches to the epoch runner
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Loads .png frames (single or state/successor pairs)
pub mod loader;

/// Generates sliding-puzzle frames in memory
pub mod synthetic;

/// Implements Burn's Dataset trait for frame samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Shuffles and splits samples into train/test sets
pub mod splitter;
