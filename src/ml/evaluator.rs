// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Rebuilds a trained model from its saved config, loads the best
// checkpoint into it and runs one evaluation pass over a dataset.
//
// Runs on a plain (non-autodiff) backend: nothing is trained, so
// no graph is recorded and dropout is a no-op.

use anyhow::Result;
use burn::{data::dataloader::DataLoaderBuilder, prelude::*};

use crate::application::train_use_case::{ModelVariant, TrainConfig};
use crate::data::{batcher::FrameBatcher, dataset::PuzzleDataset};
use crate::domain::losses::EpochReport;
use crate::domain::schedule::Temperature;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::epoch::{eval_epoch, PassSettings};
use crate::ml::loss::GumbelVaeLoss;
use crate::ml::model::{CubeSae, GumbelVae, PuzzleModel};
use crate::ml::noise::NoiseSource;

/// Temperature the trained model is scored at: the schedule floor, or
/// the value of the epoch that produced the checkpoint. Configs written
/// before training finished carry no best epoch and fall back to the
/// last scheduled epoch.
pub fn final_temperature(cfg: &TrainConfig) -> Temperature {
    if cfg.eval_at_floor {
        return cfg.temperatures.floor();
    }
    let epoch = cfg.best_epoch.unwrap_or(cfg.epochs.saturating_sub(1));
    cfg.temperatures.at(epoch)
}

/// Load the checkpoint named after `cfg.variant` and score it on `test`.
pub fn evaluate_checkpoint<B: Backend>(
    cfg:    &TrainConfig,
    ckpt:   &CheckpointManager,
    test:   PuzzleDataset,
    device: &B::Device,
) -> Result<EpochReport> {
    let shape = test.shape();
    match cfg.variant {
        ModelVariant::Gumbel => {
            let model: GumbelVae<B> = cfg.gumbel_model(shape).init(device);
            let model = ckpt.load_model::<B, _>(model, device)?;
            score(cfg, &model, &GumbelVaeLoss::new(cfg.categorical_dim), test, device)
        }
        ModelVariant::Cube => {
            let model: CubeSae<B> = cfg.cube_model(shape).init(device);
            let model = ckpt.load_model::<B, _>(model, device)?;
            score(cfg, &model, &cfg.cube_loss(), test, device)
        }
    }
}

fn score<B: Backend, M: PuzzleModel<B>>(
    cfg:      &TrainConfig,
    model:    &M,
    strategy: &M::Strategy,
    test:     PuzzleDataset,
    device:   &B::Device,
) -> Result<EpochReport> {
    let loader = DataLoaderBuilder::new(FrameBatcher::<B>::new(test.shape(), device.clone()))
        .batch_size(cfg.test_batch_size)
        .num_workers(cfg.num_workers)
        .build(test);

    let pass = PassSettings { temperature: final_temperature(cfg), noise_std: cfg.noise_std };
    let mut noise = NoiseSource::seeded(cfg.seed);
    eval_epoch(model, loader.as_ref(), strategy, pass, &mut noise, None)
}
