// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights, and decides when to save.
//
// What gets written per model family:
//   {model_dir}/
//     {name}.mpk.gz        ← best weights so far, overwritten in place
//     {name}_config.json   ← the TrainConfig that built the model
//
// Why save the config separately?
//   `evaluate` and `--resume` have to rebuild the exact
//   architecture (hidden width, latent size, ...) before the
//   weights can be loaded into it.
//
// Recorder: NamedMpkGzFileRecorder<FullPrecisionSettings>
//   - MessagePack + gzip, like CompactRecorder
//   - but keeps f32 parameters as f32, so a save/load round trip
//     is bitwise exact
//
// CheckpointSelector
//   Wraps a BestLossTracker and a CheckpointSink. Each epoch the
//   test loss is offered; the sink is called only on a strict
//   improvement. A failed save ends the run.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};

use crate::domain::best_loss::BestLossTracker;
use crate::domain::traits::CheckpointSink;
use crate::ml::model::{CubeSae, GumbelVae};

type WeightsRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Manages the checkpoint files of one model family.
pub struct CheckpointManager {
    dir:  PathBuf,
    /// File stem shared by the weights and the config
    name: String,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, name: name.into() })
    }

    /// Path without extension; the recorder appends `.mpk.gz`.
    fn weights_stem(&self) -> PathBuf {
        self.dir.join(&self.name)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(format!("{}.mpk.gz", self.name))
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(format!("{}_config.json", self.name))
    }

    pub fn has_checkpoint(&self) -> bool {
        self.weights_path().exists()
    }

    /// Serialise the full parameter state, replacing any previous file.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M) -> Result<()> {
        let path = self.weights_stem();
        WeightsRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved checkpoint '{}'", self.weights_path().display());
        Ok(())
    }

    /// Load saved weights into `model`, which must have the same architecture.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let path   = self.weights_stem();
        let record = WeightsRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Have you trained the model first?",
                    self.weights_path().display()
                )
            })?;

        tracing::info!("Loaded checkpoint '{}'", self.weights_path().display());
        Ok(model.load_record(record))
    }

    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<T: DeserializeOwned>(&self) -> Result<T> {
        let path = self.config_path();
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' before 'evaluate'.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }
}

impl<B: Backend> CheckpointSink<GumbelVae<B>> for CheckpointManager {
    fn save(&self, model: &GumbelVae<B>) -> Result<()> {
        self.save_model::<B, _>(model)
    }
}

impl<B: Backend> CheckpointSink<CubeSae<B>> for CheckpointManager {
    fn save(&self, model: &CubeSae<B>) -> Result<()> {
        self.save_model::<B, _>(model)
    }
}

// ─── CheckpointSelector ───────────────────────────────────────────────────────
/// Saves through `sink` whenever a strictly better loss is offered.
pub struct CheckpointSelector<'a, M> {
    tracker: BestLossTracker,
    sink:    &'a dyn CheckpointSink<M>,
}

impl<'a, M> CheckpointSelector<'a, M> {
    pub fn new(sink: &'a dyn CheckpointSink<M>) -> Self {
        Self { tracker: BestLossTracker::new(), sink }
    }

    /// Returns Ok(true) when the model was saved.
    pub fn consider(&mut self, model: &M, loss: f64) -> Result<bool> {
        if !self.tracker.observe(loss) {
            return Ok(false);
        }
        self.sink.save(model)?;
        Ok(true)
    }

    pub fn best(&self) -> f64 {
        self.tracker.best()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use std::cell::RefCell;

    use crate::domain::frame::FrameShape;
    use crate::ml::model::GumbelVaeConfig;

    type TestBackend = NdArray;

    struct Recording(RefCell<Vec<f64>>);

    impl CheckpointSink<f64> for Recording {
        fn save(&self, model: &f64) -> Result<()> {
            self.0.borrow_mut().push(*model);
            Ok(())
        }
    }

    #[test]
    fn test_saves_only_on_strict_improvement() {
        let sink = Recording(RefCell::new(Vec::new()));
        let mut selector: CheckpointSelector<f64> = CheckpointSelector::new(&sink);

        let saved: Vec<bool> = [10.0, 8.0, 8.0, 9.0, 5.0]
            .iter()
            .map(|&loss| selector.consider(&loss, loss).unwrap())
            .collect();

        assert_eq!(saved, vec![true, true, false, false, true]);
        assert_eq!(selector.best(), 5.0);
        assert_eq!(*sink.0.borrow(), vec![10.0, 8.0, 5.0]);
    }

    struct Failing;

    impl CheckpointSink<f64> for Failing {
        fn save(&self, _model: &f64) -> Result<()> {
            anyhow::bail!("disk full")
        }
    }

    #[test]
    fn test_failed_save_is_an_error() {
        let mut selector: CheckpointSelector<f64> = CheckpointSelector::new(&Failing);
        assert!(selector.consider(&1.0, 1.0).is_err());
    }

    fn weights(model: &GumbelVae<TestBackend>) -> Vec<f32> {
        let mut all = model.enc1.weight.val().into_data().to_vec::<f32>().unwrap();
        all.extend(model.dec3.weight.val().into_data().to_vec::<f32>().unwrap());
        all
    }

    #[test]
    fn test_round_trip_is_bitwise() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let config = GumbelVaeConfig::new(FrameShape::new(1, 3, 3))
            .with_latent_slots(2)
            .with_hidden(8);

        let saved: GumbelVae<TestBackend> = config.init(&device);
        let ckpt = CheckpointManager::new(dir.path(), "gumbel_vae").unwrap();
        ckpt.save_model::<TestBackend, _>(&saved).unwrap();
        assert!(ckpt.has_checkpoint());

        let fresh: GumbelVae<TestBackend> = config.init(&device);
        let loaded = ckpt.load_model::<TestBackend, _>(fresh, &device).unwrap();

        let (a, b) = (weights(&saved), weights(&loaded));
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let ckpt   = CheckpointManager::new(dir.path(), "cube_sae").unwrap();
        let model: GumbelVae<TestBackend> = GumbelVaeConfig::new(FrameShape::new(1, 2, 2))
            .with_hidden(4)
            .init(&device);
        assert!(!ckpt.has_checkpoint());
        assert!(ckpt.load_model::<TestBackend, _>(model, &device).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path(), "gumbel_vae").unwrap();
        ckpt.save_config(&vec![1u32, 2, 3]).unwrap();
        let back: Vec<u32> = ckpt.load_config().unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }
}
