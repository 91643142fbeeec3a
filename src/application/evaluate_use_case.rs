// ============================================================
// Layer 2 — Evaluate Use Case
// ============================================================
// Scores the best checkpoint of a finished (or interrupted) run:
//
//   1. Read {name}_config.json from the model directory
//   2. Rebuild the same test split (same seed, same source)
//   3. Load {name}.mpk.gz and run one evaluation pass
//
// The data directory may be overridden, e.g. to score a model on
// frames it never saw during training.

use anyhow::Result;
use burn::backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu};

use crate::application::train_use_case::{prepare_datasets, BackendKind, ModelVariant, TrainConfig};
use crate::domain::losses::EpochReport;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::evaluator::evaluate_checkpoint;

pub struct EvaluateUseCase {
    config: TrainConfig,
    ckpt:   CheckpointManager,
}

impl EvaluateUseCase {
    pub fn new(variant: ModelVariant, model_dir: &str, data_dir: Option<String>) -> Result<Self> {
        let ckpt = CheckpointManager::new(model_dir, variant.checkpoint_name())?;
        let mut config: TrainConfig = ckpt.load_config()?;
        if data_dir.is_some() {
            config.data_dir = data_dir;
        }
        Ok(Self { config, ckpt })
    }

    pub fn evaluate(&self) -> Result<EpochReport> {
        let cfg = &self.config;
        let (_, test) = prepare_datasets(cfg)?;
        tracing::info!("Evaluating {} on {} test samples", cfg.variant, test.sample_count());

        match cfg.backend {
            BackendKind::Wgpu => {
                evaluate_checkpoint::<Wgpu>(cfg, &self.ckpt, test, &WgpuDevice::default())
            }
            BackendKind::NdArray => {
                evaluate_checkpoint::<NdArray>(cfg, &self.ckpt, test, &NdArrayDevice::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = dir.path().display().to_string();
        assert!(EvaluateUseCase::new(ModelVariant::Gumbel, &model_dir, None).is_err());
    }
}
