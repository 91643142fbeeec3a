// ============================================================
// Layer 4 — Frame Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<FrameSample>
// into a FrameBatch of 4-D tensors.
//
// How batching works here:
//   Input:  Vec of N samples, each a flat [C*H*W] Vec<f32>
//   Output: images [N, C, H, W]  (+ next [N, C, H, W] if paired)
//
//   All frames are flattened into one Vec in sample order and
//   handed to TensorData with the final 4-D shape, so no reshape
//   is needed on the device.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::frame::{FrameSample, FrameShape};

// ─── FrameBatch ───────────────────────────────────────────────────────────────
/// One minibatch: the frames and, for paired data, their successors.
/// Both tensors are [batch, channels, height, width].
#[derive(Debug, Clone)]
pub struct FrameBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub next:   Option<Tensor<B, 4>>,
}

impl<B: Backend> FrameBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.images.dims()[0]
    }
}

// ─── FrameBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct FrameBatcher<B: Backend> {
    shape:  FrameShape,
    device: B::Device,
}

impl<B: Backend> FrameBatcher<B> {
    pub fn new(shape: FrameShape, device: B::Device) -> Self {
        Self { shape, device }
    }

    fn stack<'a>(&self, frames: impl Iterator<Item = &'a [f32]>, n: usize) -> Tensor<B, 4> {
        let [c, h, w] = self.shape.dims();
        let flat: Vec<f32> = frames.flat_map(|f| f.iter().copied()).collect();
        Tensor::from_data(TensorData::new(flat, [n, c, h, w]), &self.device)
    }
}

impl<B: Backend> Batcher<FrameSample, FrameBatch<B>> for FrameBatcher<B> {
    /// Panics when the batch mixes paired and single samples — that is a
    /// broken dataset, not something to recover from mid-epoch.
    fn batch(&self, items: Vec<FrameSample>) -> FrameBatch<B> {
        let n      = items.len();
        let paired = items.first().map_or(false, FrameSample::is_paired);
        assert!(
            items.iter().all(|s| s.is_paired() == paired),
            "batch mixes paired and single frame samples"
        );

        let images = self.stack(items.iter().map(|s| s.image.as_slice()), n);
        let next   = paired.then(|| {
            self.stack(items.iter().filter_map(|s| s.next.as_deref()), n)
        });

        FrameBatch { images, next }
    }
}
