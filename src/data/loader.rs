// ============================================================
// Layer 4 — PNG Frame Loader
// ============================================================
// Loads puzzle frames from .png files using the image crate.
//
// Directory layouts:
//
//   single frames                paired frames
//   data/                        data/
//     0001.png                     pre/0001.png   ← state
//     0002.png                     suc/0001.png   ← state after one move
//     ...                          ...
//
// Paired files are matched by file name; a successor with no
// matching state (or the reverse) is skipped with a warning.
//
// Every image is converted to 8-bit grayscale and scaled to
// [0, 1]. All frames must share one size — a dataset mixing
// sizes is rejected, since it cannot be batched.
//
// A missing directory is an error here; falling back to generated
// puzzles is decided by the caller (prepare_datasets).
//
// Reference: image crate documentation
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use crate::domain::frame::{FrameSample, FrameShape};
use crate::domain::traits::SampleSource;

pub struct PngFrameLoader {
    dir:    PathBuf,
    paired: bool,
}

impl PngFrameLoader {
    pub fn new(dir: impl Into<PathBuf>, paired: bool) -> Self {
        Self { dir: dir.into(), paired }
    }

    fn load_single(&self) -> Result<(FrameShape, Vec<FrameSample>)> {
        let mut shape   = None;
        let mut samples = Vec::new();
        for (_, path) in list_pngs(&self.dir)? {
            let frame = read_frame(&path, &mut shape)?;
            samples.push(FrameSample::single(frame));
        }
        Ok((shape.unwrap_or(FrameShape::new(1, 0, 0)), samples))
    }

    fn load_paired(&self) -> Result<(FrameShape, Vec<FrameSample>)> {
        let pre = list_pngs(&self.dir.join("pre"))?;
        let mut suc = list_pngs(&self.dir.join("suc"))?;

        let mut shape   = None;
        let mut samples = Vec::new();
        for (name, pre_path) in pre {
            let Some(suc_path) = suc.remove(&name) else {
                tracing::warn!("No successor for '{}', skipping", pre_path.display());
                continue;
            };
            let image = read_frame(&pre_path, &mut shape)?;
            let next  = read_frame(&suc_path, &mut shape)?;
            samples.push(FrameSample::paired(image, next));
        }
        for (_, orphan) in suc {
            tracing::warn!("No state for successor '{}', skipping", orphan.display());
        }
        Ok((shape.unwrap_or(FrameShape::new(1, 0, 0)), samples))
    }
}

impl SampleSource for PngFrameLoader {
    fn load_all(&self) -> Result<(FrameShape, Vec<FrameSample>)> {
        let (shape, samples) = if self.paired {
            self.load_paired()?
        } else {
            self.load_single()?
        };
        tracing::info!(
            "Loaded {} {} samples of {}x{} from '{}'",
            samples.len(),
            if self.paired { "paired" } else { "single" },
            shape.height,
            shape.width,
            self.dir.display()
        );
        Ok((shape, samples))
    }
}

/// Sorted `file name → path` of every .png directly inside `dir`.
fn list_pngs(dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("png") {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.insert(name.to_string(), path.clone());
        }
    }
    Ok(files)
}

/// Decode one PNG as grayscale in [0, 1], checking it against the
/// shape of the frames read before it.
fn read_frame(path: &Path, shape: &mut Option<FrameShape>) -> Result<Vec<f32>> {
    let img = image::open(path)
        .with_context(|| format!("Cannot decode '{}'", path.display()))?
        .to_luma8();
    let this = FrameShape::new(1, img.height() as usize, img.width() as usize);

    match shape {
        Some(expected) if *expected != this => bail!(
            "'{}' is {}x{}, expected {}x{}",
            path.display(),
            this.height,
            this.width,
            expected.height,
            expected.width
        ),
        Some(_) => {}
        None    => *shape = Some(this),
    }

    Ok(img.into_raw().into_iter().map(|p| p as f32 / 255.0).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn write_png(path: &Path, w: u32, h: u32, value: u8) {
        GrayImage::from_pixel(w, h, Luma([value])).save(path).unwrap();
    }

    #[test]
    fn test_missing_dir_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let loader = PngFrameLoader::new(dir.path().join("absent"), false);
        let err    = loader.load_all().unwrap_err();
        assert!(err.to_string().contains("Cannot read directory"));
    }

    #[test]
    fn test_single_frames_scaled_to_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 4, 3, 255);
        write_png(&dir.path().join("b.png"), 4, 3, 0);
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let (shape, samples) = PngFrameLoader::new(dir.path(), false).load_all().unwrap();
        assert_eq!(shape, FrameShape::new(1, 3, 4));
        assert_eq!(samples.len(), 2);
        assert!(samples[0].image.iter().all(|&p| p == 1.0));
        assert!(samples[1].image.iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_pairs_matched_by_name() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("pre")).unwrap();
        fs::create_dir(dir.path().join("suc")).unwrap();
        write_png(&dir.path().join("pre/0.png"), 2, 2, 0);
        write_png(&dir.path().join("suc/0.png"), 2, 2, 255);
        write_png(&dir.path().join("pre/1.png"), 2, 2, 0); // no successor

        let (_, samples) = PngFrameLoader::new(dir.path(), true).load_all().unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].next.as_deref(), Some(&[1.0f32; 4][..]));
    }

    #[test]
    fn test_mixed_sizes_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("a.png"), 4, 4, 0);
        write_png(&dir.path().join("b.png"), 5, 4, 0);
        assert!(PngFrameLoader::new(dir.path(), false).load_all().is_err());
    }
}
