// ============================================================
// Layer 3 — Frame Domain Types
// ============================================================
// A puzzle observation is a small image stored as a flat
// channel-major Vec<f32> with values in [0, 1].
//
// Two kinds of samples exist:
//   - single  : one image                 (Gumbel VAE)
//   - paired  : image + successor image   (Cube Sae)
//     the successor is the same puzzle after one legal move
//
// Preview panels are the backend-free form of tensors that the
// diagnostic grid writer draws, one panel per grid row.

use serde::{Deserialize, Serialize};

/// Channel / height / width of every frame in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameShape {
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

impl FrameShape {
    pub fn new(channels: usize, height: usize, width: usize) -> Self {
        Self { channels, height, width }
    }

    /// Number of f32 values in one frame
    pub fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }
}

/// One dataset item: a frame and, for paired data, its successor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSample {
    pub image: Vec<f32>,
    pub next:  Option<Vec<f32>>,
}

impl FrameSample {
    pub fn single(image: Vec<f32>) -> Self {
        Self { image, next: None }
    }

    pub fn paired(image: Vec<f32>, next: Vec<f32>) -> Self {
        Self { image, next: Some(next) }
    }

    pub fn is_paired(&self) -> bool {
        self.next.is_some()
    }
}

/// One row of the diagnostic grid: `count` grayscale tiles of
/// `height` x `width`, row-major, values nominally in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPanel {
    pub label:  &'static str,
    pub count:  usize,
    pub height: usize,
    pub width:  usize,
    pub pixels: Vec<f32>,
}

impl PreviewPanel {
    /// Pixels of tile `i`
    pub fn tile(&self, i: usize) -> &[f32] {
        let n = self.height * self.width;
        &self.pixels[i * n..(i + 1) * n]
    }
}
