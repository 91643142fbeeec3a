// ============================================================
// Layer 5 — Training Orchestrator
// ============================================================
// Drives N epochs for either model family:
//
//   for epoch in 0..N:
//     temperature = schedule(epoch)
//     lr          = base_lr * lr_schedule(step)
//     train pass  (autodiff backend, Adam step per batch)
//     eval pass   (model.valid(), no gradients)
//     checkpoint  when the test loss strictly improves
//     metrics row, then step += 1
//
// The model family only changes what flows through the loop:
// the temperature schedule, the noise level, the loss strategy
// and its normalisation. The loop itself is shared.
//
// Key Burn insight:
//   - Training uses B (Autodiff<..>) for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - The test batcher must therefore build inner-backend tensors
//
// Reference: Burn Book §5 (Custom Training Loop), Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::AdamConfig,
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::FrameBatcher, dataset::PuzzleDataset};
use crate::domain::losses::EpochReport;
use crate::domain::random::SeedSequence;
use crate::domain::schedule::Temperature;
use crate::domain::traits::{CheckpointSink, PreviewSink};
use crate::infra::checkpoint::CheckpointSelector;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::epoch::{eval_epoch, train_epoch, PassSettings};
use crate::ml::model::PuzzleModel;
use crate::ml::noise::NoiseSource;

/// Where the loop reports to. Only the checkpoint sink is required.
pub struct TrainingSinks<'a, M> {
    pub checkpoint: &'a dyn CheckpointSink<M>,
    pub metrics:    Option<&'a MetricsLogger>,
    pub preview:    Option<&'a dyn PreviewSink>,
}

/// Outcome of a full run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    /// Lowest test loss seen; infinite if no epoch ran or none was finite
    pub best_loss:         f64,
    /// Epochs whose test loss triggered a save
    pub saved_epochs:      Vec<usize>,
    pub train:             Vec<EpochReport>,
    pub test:              Vec<EpochReport>,
    /// Temperature each test pass ran at
    pub eval_temperatures: Vec<Temperature>,
}

pub fn run_training<B, M>(
    cfg:      &TrainConfig,
    mut model: M,
    strategy: &M::Strategy,
    train:    PuzzleDataset,
    test:     PuzzleDataset,
    sinks:    TrainingSinks<'_, M>,
    device:   &B::Device,
) -> Result<(M, TrainingSummary)>
where
    B: AutodiffBackend,
    M: PuzzleModel<B> + AutodiffModule<B>,
    <M as AutodiffModule<B>>::InnerModule:
        PuzzleModel<B::InnerBackend, Strategy = <M as PuzzleModel<B>>::Strategy>,
{
    let mut seeds = SeedSequence::new(cfg.seed);
    let shape     = train.shape();

    tracing::info!(
        "Training {} for {} epochs on {} train / {} test samples",
        cfg.variant, cfg.epochs, train.sample_count(), test.sample_count(),
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    // m = β1*m + (1-β1)*g        (mean)
    // v = β2*v + (1-β2)*g²       (variance)
    // θ = θ - lr * m / (√v + ε)  (update)
    let mut optim = AdamConfig::new().init::<B, M>();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::new(FrameBatcher::<B>::new(shape, device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(seeds.next_seed())
        .num_workers(cfg.num_workers)
        .build(train);

    let test_loader = DataLoaderBuilder::new(FrameBatcher::<B::InnerBackend>::new(shape, device.clone()))
        .batch_size(cfg.test_batch_size)
        .shuffle(seeds.next_seed())
        .num_workers(cfg.num_workers)
        .build(test);

    let mut selector = CheckpointSelector::new(sinks.checkpoint);
    let mut summary  = TrainingSummary {
        best_loss:         f64::INFINITY,
        saved_epochs:      Vec::new(),
        train:             Vec::with_capacity(cfg.epochs),
        test:              Vec::with_capacity(cfg.epochs),
        eval_temperatures: Vec::with_capacity(cfg.epochs),
    };
    let mut lr_step = 0usize;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 0..cfg.epochs {
        let temperature = cfg.temperatures.at(epoch);
        let lr          = cfg.lr * cfg.lr_schedule.factor_at(lr_step);

        // ── Training phase ────────────────────────────────────────────────────
        B::seed(seeds.next_seed());
        let mut noise = NoiseSource::seeded(seeds.next_seed());
        let pass      = PassSettings { temperature, noise_std: cfg.noise_std };

        let (trained, train_report) =
            train_epoch(model, &mut optim, train_loader.as_ref(), strategy, pass, lr, &mut noise);
        model = trained;
        println!("====> Epoch: {} Average loss: {:.4}", epoch, train_report.loss);

        // ── Evaluation phase ──────────────────────────────────────────────────
        // model.valid() → inner backend, dropout disabled
        let eval_temperature = if cfg.eval_at_floor { cfg.temperatures.floor() } else { temperature };
        let mut noise = NoiseSource::seeded(seeds.next_seed());
        let pass      = PassSettings { temperature: eval_temperature, noise_std: cfg.noise_std };

        let test_report = eval_epoch(
            &model.valid(),
            test_loader.as_ref(),
            strategy,
            pass,
            &mut noise,
            sinks.preview.map(|sink| (sink, epoch)),
        )?;
        println!("====> Epoch: {} Average loss: {:.4}", epoch, test_report.loss);

        // ── Checkpoint decision ───────────────────────────────────────────────
        let saved = selector.consider(&model, test_report.loss)?;
        if saved {
            println!("Save Model");
            summary.saved_epochs.push(epoch);
        }

        if let Some(metrics) = sinks.metrics {
            metrics.log(&EpochMetrics::new(
                epoch, temperature, lr, &train_report, &test_report, saved,
            ))?;
        }

        tracing::debug!(
            "Epoch {} | temp=({:.3}, {:.3}) | lr={:.2e} | {}",
            epoch, temperature.state, temperature.action, lr, test_report.breakdown(),
        );

        summary.train.push(train_report);
        summary.test.push(test_report);
        summary.eval_temperatures.push(eval_temperature);
        lr_step += 1;
    }

    summary.best_loss = selector.best();
    tracing::info!("Training complete, best test loss {:.4}", summary.best_loss);
    Ok((model, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use std::cell::RefCell;

    use crate::application::train_use_case::ModelVariant;
    use crate::domain::frame::{FrameSample, FrameShape};
    use crate::domain::schedule::StepLrSchedule;
    use crate::ml::loss::{CubeSaeLoss, GumbelVaeLoss};
    use crate::ml::model::{CubeSae, CubeSaeConfig, GumbelVae, GumbelVaeConfig};

    type TrainBackend = Autodiff<NdArray>;

    const SHAPE: FrameShape = FrameShape { channels: 1, height: 2, width: 2 };

    fn dataset(n: usize, paired: bool) -> PuzzleDataset {
        let samples = (0..n)
            .map(|i| {
                let v = (i % 3) as f32 / 3.0;
                if paired {
                    FrameSample::paired(vec![v; 4], vec![1.0 - v; 4])
                } else {
                    FrameSample::single(vec![v; 4])
                }
            })
            .collect();
        PuzzleDataset::new(SHAPE, samples)
    }

    fn config(variant: ModelVariant, epochs: usize) -> TrainConfig {
        let mut cfg = TrainConfig::for_variant(variant);
        cfg.epochs          = epochs;
        cfg.batch_size      = 4;
        cfg.test_batch_size = 4;
        cfg.num_workers     = 1;
        cfg
    }

    /// Counts saves without touching the filesystem.
    struct CountingSink(RefCell<usize>);

    impl<M> CheckpointSink<M> for CountingSink {
        fn save(&self, _model: &M) -> Result<()> {
            *self.0.borrow_mut() += 1;
            Ok(())
        }
    }

    #[test]
    fn test_gumbel_run_reports_every_epoch() {
        let device = Default::default();
        let cfg    = config(ModelVariant::Gumbel, 3);
        let model: GumbelVae<TrainBackend> = GumbelVaeConfig::new(SHAPE)
            .with_latent_slots(2)
            .with_hidden(8)
            .init(&device);
        let sink = CountingSink(RefCell::new(0));

        let (_, summary) = run_training(
            &cfg, model, &GumbelVaeLoss::new(2), dataset(8, false), dataset(4, false),
            TrainingSinks { checkpoint: &sink, metrics: None, preview: None },
            &device,
        ).unwrap();

        assert_eq!(summary.train.len(), 3);
        assert_eq!(summary.test.len(), 3);
        assert_eq!(summary.saved_epochs.first(), Some(&0));
        assert_eq!(*sink.0.borrow(), summary.saved_epochs.len());
        let best = summary.test.iter().map(|r| r.loss).fold(f64::INFINITY, f64::min);
        assert_eq!(summary.best_loss, best);
    }

    #[test]
    fn test_cube_run_writes_metrics() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let cfg    = config(ModelVariant::Cube, 2);
        let model: CubeSae<TrainBackend> = CubeSaeConfig::new(SHAPE)
            .with_latent_dim(4)
            .with_num_actions(3)
            .with_hidden(8)
            .init(&device);
        let sink    = CountingSink(RefCell::new(0));
        let metrics = MetricsLogger::new(dir.path(), "cube_sae", false).unwrap();

        let (_, summary) = run_training(
            &cfg, model, &CubeSaeLoss::default(), dataset(8, true), dataset(4, true),
            TrainingSinks { checkpoint: &sink, metrics: Some(&metrics), preview: None },
            &device,
        ).unwrap();

        assert_eq!(summary.test.len(), 2);
        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }

    #[test]
    fn test_zero_epochs_saves_nothing() {
        let device = Default::default();
        let cfg    = config(ModelVariant::Gumbel, 0);
        let model: GumbelVae<TrainBackend> = GumbelVaeConfig::new(SHAPE)
            .with_latent_slots(2)
            .with_hidden(8)
            .init(&device);
        let sink = CountingSink(RefCell::new(0));

        let (_, summary) = run_training(
            &cfg, model, &GumbelVaeLoss::new(2), dataset(4, false), dataset(4, false),
            TrainingSinks { checkpoint: &sink, metrics: None, preview: None },
            &device,
        ).unwrap();

        assert!(summary.best_loss.is_infinite());
        assert!(summary.saved_epochs.is_empty());
        assert_eq!(*sink.0.borrow(), 0);
    }

    fn lr_column(csv: &str) -> Vec<String> {
        csv.lines()
            .skip(1)
            .map(|line| line.split(',').nth(3).unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_lr_steps_down_after_threshold() {
        let dir    = tempfile::tempdir().unwrap();
        let device = Default::default();
        let mut cfg = config(ModelVariant::Gumbel, 3);
        cfg.lr          = 1e-3;
        cfg.lr_schedule = StepLrSchedule::new(1, 0.1);
        let model: GumbelVae<TrainBackend> = GumbelVaeConfig::new(SHAPE)
            .with_latent_slots(2)
            .with_hidden(8)
            .init(&device);
        let sink    = CountingSink(RefCell::new(0));
        let metrics = MetricsLogger::new(dir.path(), "gumbel_vae", false).unwrap();

        run_training(
            &cfg, model, &GumbelVaeLoss::new(2), dataset(8, false), dataset(4, false),
            TrainingSinks { checkpoint: &sink, metrics: Some(&metrics), preview: None },
            &device,
        ).unwrap();

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(lr_column(&csv), vec!["0.001000", "0.000100", "0.000100"]);
    }

    #[test]
    fn test_gumbel_tests_at_floor() {
        let device = Default::default();
        let cfg    = config(ModelVariant::Gumbel, 3);
        let model: GumbelVae<TrainBackend> = GumbelVaeConfig::new(SHAPE)
            .with_latent_slots(2)
            .with_hidden(8)
            .init(&device);
        let sink = CountingSink(RefCell::new(0));

        let (_, summary) = run_training(
            &cfg, model, &GumbelVaeLoss::new(2), dataset(8, false), dataset(4, false),
            TrainingSinks { checkpoint: &sink, metrics: None, preview: None },
            &device,
        ).unwrap();

        let floor = cfg.temperatures.floor();
        assert_eq!(summary.eval_temperatures, vec![floor; 3]);
        assert_ne!(cfg.temperatures.at(0), floor);
    }

    #[test]
    fn test_cube_tests_at_current_pair() {
        let device = Default::default();
        let cfg    = config(ModelVariant::Cube, 3);
        let model: CubeSae<TrainBackend> = CubeSaeConfig::new(SHAPE)
            .with_latent_dim(4)
            .with_num_actions(3)
            .with_hidden(8)
            .init(&device);
        let sink = CountingSink(RefCell::new(0));

        let (_, summary) = run_training(
            &cfg, model, &CubeSaeLoss::default(), dataset(8, true), dataset(4, true),
            TrainingSinks { checkpoint: &sink, metrics: None, preview: None },
            &device,
        ).unwrap();

        let expected: Vec<Temperature> = (0..3).map(|e| cfg.temperatures.at(e)).collect();
        assert_eq!(summary.eval_temperatures, expected);
        assert_ne!(expected[0], expected[2]);
    }
}
