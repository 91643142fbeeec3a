use burn::data::dataset::Dataset;

use crate::domain::frame::{FrameSample, FrameShape};

/// In-memory frames, all sharing one shape.
/// Either every sample is paired or none is.
#[derive(Debug, Clone)]
pub struct PuzzleDataset {
    shape:   FrameShape,
    samples: Vec<FrameSample>,
}

impl PuzzleDataset {
    pub fn new(shape: FrameShape, samples: Vec<FrameSample>) -> Self {
        Self { shape, samples }
    }

    pub fn shape(&self) -> FrameShape { self.shape }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    pub fn is_paired(&self) -> bool {
        self.samples.first().map_or(false, FrameSample::is_paired)
    }
}

impl Dataset<FrameSample> for PuzzleDataset {
    fn get(&self, index: usize) -> Option<FrameSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
