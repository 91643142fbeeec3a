// ============================================================
// Layer 6 — Diagnostic Grid Writer
// ============================================================
// Renders the preview panels of one evaluation pass into a
// single grayscale PNG:
//
//   {image_dir}/{epoch}.png
//
//   row 0   input           ▢ ▢ ▢ ▢ ▢ ▢ ▢ ▢
//   row 1   reconstruction  ▢ ▢ ▢ ▢ ▢ ▢ ▢ ▢
//   row 2   latent          ▢ ▢ ▢ ▢ ▢ ▢ ▢ ▢
//   ...
//
// Panels have different tile sizes (a 6x6 latent next to a
// 24x24 frame), so every tile is scaled with nearest-neighbour
// sampling to the largest tile in the grid. Values are clamped
// to [0, 1] before quantising to 8 bits.

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use std::{fs, path::PathBuf};

use crate::domain::frame::PreviewPanel;
use crate::domain::traits::PreviewSink;

/// Pixels of background between cells.
const GAP: u32 = 1;

pub struct GridWriter {
    dir:     PathBuf,
    columns: usize,
}

impl GridWriter {
    pub fn new(dir: impl Into<PathBuf>, columns: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create image directory '{}'", dir.display()))?;
        Ok(Self { dir, columns: columns.max(1) })
    }

    pub fn path_for(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("{epoch}.png"))
    }

    pub fn render(&self, panels: &[PreviewPanel]) -> GrayImage {
        let cell_h = panels.iter().map(|p| p.height).max().unwrap_or(0).max(1) as u32;
        let cell_w = panels.iter().map(|p| p.width).max().unwrap_or(0).max(1) as u32;
        let cols   = self.columns as u32;
        let rows   = panels.len().max(1) as u32;

        let mut img = GrayImage::from_pixel(
            cols * (cell_w + GAP) + GAP,
            rows * (cell_h + GAP) + GAP,
            Luma([0u8]),
        );

        for (row, panel) in panels.iter().enumerate() {
            for col in 0..panel.count.min(self.columns) {
                let tile = panel.tile(col);
                let x0   = GAP + col as u32 * (cell_w + GAP);
                let y0   = GAP + row as u32 * (cell_h + GAP);

                for y in 0..cell_h {
                    let sy = (y as usize * panel.height) / cell_h as usize;
                    for x in 0..cell_w {
                        let sx    = (x as usize * panel.width) / cell_w as usize;
                        let value = tile.get(sy * panel.width + sx).copied().unwrap_or(0.0);
                        img.put_pixel(x0 + x, y0 + y, Luma([quantise(value)]));
                    }
                }
            }
        }
        img
    }
}

fn quantise(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl PreviewSink for GridWriter {
    fn show(&self, epoch: usize, panels: &[PreviewPanel]) -> Result<()> {
        let path = self.path_for(epoch);
        self.render(panels)
            .save(&path)
            .with_context(|| format!("Cannot write preview image '{}'", path.display()))?;

        let labels: Vec<&str> = panels.iter().map(|p| p.label).collect();
        tracing::debug!("Wrote preview '{}' ({})", path.display(), labels.join(", "));
        Ok(())
    }
}
