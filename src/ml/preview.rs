// ============================================================
// Layer 5 — Preview Panels
// ============================================================
// Pulls the first few samples of a tensor back to the host as a
// PreviewPanel for the diagnostic grid.
//
//   image tensors  [n, c, h, w] → channel mean, one h x w tile each
//   vector tensors [n, len]     → zero-padded to the next square,
//                                 one ⌈√len⌉ x ⌈√len⌉ tile each

use anyhow::Result;
use burn::prelude::*;

use crate::domain::frame::PreviewPanel;

fn to_host<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read tensor back to host: {e:?}"))
}

pub fn image_panel<B: Backend>(
    label:  &'static str,
    images: Tensor<B, 4>,
    count:  usize,
) -> Result<PreviewPanel> {
    let [n, _, h, w] = images.dims();
    let count  = count.min(n);
    let pixels = to_host(images.slice([0..count]).mean_dim(1))?;
    Ok(PreviewPanel { label, count, height: h, width: w, pixels })
}

pub fn vector_panel<B: Backend>(
    label:   &'static str,
    vectors: Tensor<B, 2>,
    count:   usize,
) -> Result<PreviewPanel> {
    let [n, len] = vectors.dims();
    let count = count.min(n);
    let side  = (len as f64).sqrt().ceil() as usize;
    let flat  = to_host(vectors.slice([0..count]))?;

    let mut pixels = vec![0.0f32; count * side * side];
    for (i, row) in flat.chunks(len.max(1)).enumerate() {
        pixels[i * side * side..i * side * side + row.len()].copy_from_slice(row);
    }
    Ok(PreviewPanel { label, count, height: side, width: side, pixels })
}
