// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load or generate frames     (Layer 4 - data)
//   Step 2: Split train/test            (Layer 4 - data)
//   Step 3: Check batch preconditions   (here)
//   Step 4: Save config                 (Layer 6 - infra)
//   Step 5: Pick backend + model family (here)
//   Step 6: Run the training loop       (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{bail, ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path};

use crate::data::{
    dataset::PuzzleDataset,
    loader::PngFrameLoader,
    splitter::split_train_test,
    synthetic::SlidingPuzzle,
};
use crate::domain::frame::FrameShape;
use crate::domain::random::SeedSequence;
use crate::domain::schedule::{AnnealSchedule, StepLrSchedule, TemperatureSchedule};
use crate::domain::traits::{PreviewSink, SampleSource};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger, visualizer::GridWriter};
use crate::ml::epoch::PREVIEW_COLUMNS;
use crate::ml::loss::{CubeSaeLoss, GumbelVaeLoss};
use crate::ml::model::{CubeSae, CubeSaeConfig, GumbelVae, GumbelVaeConfig};
use crate::ml::trainer::{run_training, TrainingSinks, TrainingSummary};

// ─── Model family ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Categorical VAE over single frames
    Gumbel,
    /// Dual-frame autoencoder with a latent action model
    Cube,
}

impl ModelVariant {
    /// File stem for the checkpoint, config and metrics files.
    pub fn checkpoint_name(&self) -> &'static str {
        match self {
            Self::Gumbel => "gumbel_vae",
            Self::Cube   => "cube_sae",
        }
    }

    /// Whether samples must be (state, successor) pairs.
    pub fn paired(&self) -> bool {
        matches!(self, Self::Cube)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.checkpoint_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Wgpu,
    NdArray,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved beside the checkpoint and reloaded
// by `evaluate` and `--resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub variant:           ModelVariant,
    pub epochs:            usize,
    /// PNG frames; when absent or missing, synthetic puzzles are generated
    pub data_dir:          Option<String>,
    pub model_dir:         String,
    /// Where the per-epoch preview grid goes; None disables it
    pub image_dir:         Option<String>,
    pub batch_size:        usize,
    pub test_batch_size:   usize,
    /// Number of samples held out for the test split
    pub test_size:         usize,
    pub synthetic_samples: usize,
    pub tile_size:         usize,
    pub scramble:          usize,
    pub lr:                f64,
    pub lr_schedule:       StepLrSchedule,
    pub temperatures:      TemperatureSchedule,
    /// Evaluate at the schedule floor instead of the current temperature
    pub eval_at_floor:     bool,
    pub noise_std:         Option<f64>,
    pub alpha:             f64,
    pub beta:              f64,
    pub regularize:        bool,
    pub seed:              u64,
    pub num_workers:       usize,
    pub resume:            bool,
    pub backend:           BackendKind,
    pub hidden:            usize,
    pub latent_slots:      usize,
    pub categorical_dim:   usize,
    pub latent_dim:        usize,
    pub num_actions:       usize,
    pub dropout:           f64,
    /// Epoch whose test loss produced the saved checkpoint; filled in
    /// once training finishes
    #[serde(default)]
    pub best_epoch:        Option<usize>,
}

impl TrainConfig {
    pub fn for_variant(variant: ModelVariant) -> Self {
        let common = Self {
            variant,
            epochs:            100,
            data_dir:          None,
            model_dir:         "puzzle/model".to_string(),
            image_dir:         None,
            batch_size:        100,
            test_batch_size:   500,
            test_size:         1000,
            synthetic_samples: 6000,
            tile_size:         8,
            scramble:          30,
            lr:                1e-3,
            lr_schedule:       StepLrSchedule::constant(),
            temperatures:      TemperatureSchedule::Single(AnnealSchedule::new(1.0, 0.5, 0.05)),
            eval_at_floor:     true,
            noise_std:         None,
            alpha:             crate::ml::loss::DEFAULT_ALPHA,
            beta:              crate::ml::loss::DEFAULT_BETA,
            regularize:        true,
            seed:              42,
            num_workers:       1,
            resume:            false,
            backend:           BackendKind::Wgpu,
            hidden:            512,
            latent_slots:      36,
            categorical_dim:   2,
            latent_dim:        36,
            num_actions:       24,
            dropout:           0.2,
            best_epoch:        None,
        };

        match variant {
            ModelVariant::Gumbel => common,
            ModelVariant::Cube => Self {
                image_dir:         Some("puzzle/image".to_string()),
                test_batch_size:   2000,
                test_size:         2000,
                synthetic_samples: 10000,
                lr_schedule:       StepLrSchedule::new(100, 0.1),
                temperatures:      TemperatureSchedule::Dual {
                    state:  AnnealSchedule::new(5.0, 0.7, 0.03),
                    action: AnnealSchedule::new(1.0, 0.5, 0.05),
                },
                eval_at_floor:     false,
                noise_std:         Some(0.4),
                ..common
            },
        }
    }

    pub fn gumbel_model(&self, shape: FrameShape) -> GumbelVaeConfig {
        GumbelVaeConfig::new(shape)
            .with_latent_slots(self.latent_slots)
            .with_categorical_dim(self.categorical_dim)
            .with_hidden(self.hidden)
    }

    pub fn cube_model(&self, shape: FrameShape) -> CubeSaeConfig {
        CubeSaeConfig::new(shape)
            .with_latent_dim(self.latent_dim)
            .with_num_actions(self.num_actions)
            .with_hidden(self.hidden)
            .with_dropout(self.dropout)
    }

    pub fn cube_loss(&self) -> CubeSaeLoss {
        CubeSaeLoss { alpha: self.alpha, beta: self.beta, regularize: self.regularize }
    }
}

// ─── Data preparation ─────────────────────────────────────────────────────────
/// Load (or generate) the frames of the configured variant and split them.
/// Deterministic in `cfg.seed`, so `evaluate` sees the same test split.
pub fn prepare_datasets(cfg: &TrainConfig) -> Result<(PuzzleDataset, PuzzleDataset)> {
    // Separate stream from the one the training loop draws from
    let mut seeds = SeedSequence::new(!cfg.seed);
    let paired    = cfg.variant.paired();

    let source: Box<dyn SampleSource> = match &cfg.data_dir {
        Some(dir) if Path::new(dir).exists() => {
            tracing::info!("Loading frames from '{}'", dir);
            Box::new(PngFrameLoader::new(dir, paired))
        }
        other => {
            if let Some(dir) = other {
                tracing::warn!("Data directory '{}' not found, generating puzzles instead", dir);
            }
            Box::new(SlidingPuzzle {
                tile_size: cfg.tile_size,
                samples:   cfg.synthetic_samples,
                scramble:  cfg.scramble,
                paired,
                seed:      seeds.next_seed(),
            })
        }
    };

    let (shape, samples) = source.load_all()?;
    ensure!(!samples.is_empty(), "No frames to train on");
    ensure!(
        samples.iter().all(|s| s.is_paired() == paired),
        "The {} model needs {} frames",
        cfg.variant,
        if paired { "state/successor paired" } else { "single" },
    );

    let (train, test) = split_train_test(samples, cfg.test_size, seeds.next_seed());
    tracing::info!("Split: {} train, {} test", train.len(), test.len());

    Ok((PuzzleDataset::new(shape, train), PuzzleDataset::new(shape, test)))
}

/// Both splits must be non-empty and divide evenly into batches.
pub fn check_batches(train: &PuzzleDataset, test: &PuzzleDataset, cfg: &TrainConfig) -> Result<()> {
    for (split, data, batch) in [
        ("train", train, cfg.batch_size),
        ("test",  test,  cfg.test_batch_size),
    ] {
        let n = data.sample_count();
        if n == 0 {
            bail!("The {split} split is empty");
        }
        if batch == 0 || n % batch != 0 {
            bail!("{split} batch size {batch} does not divide the {n} {split} samples");
        }
    }
    Ok(())
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainingSummary> {
        let cfg = &self.config;

        // ── Steps 1-3: data and preconditions ─────────────────────────────────
        let (train, test) = prepare_datasets(cfg)?;
        check_batches(&train, &test, cfg)?;

        // ── Step 4: save config for evaluate / resume ─────────────────────────
        let ckpt = CheckpointManager::new(&cfg.model_dir, cfg.variant.checkpoint_name())?;
        ckpt.save_config(cfg)?;

        // ── Steps 5-6: backend dispatch ───────────────────────────────────────
        let summary = match cfg.backend {
            BackendKind::Wgpu => {
                let device = WgpuDevice::default();
                tracing::info!("Using WGPU device: {:?}", device);
                self.run_on::<Autodiff<Wgpu>>(train, test, &ckpt, device)?
            }
            BackendKind::NdArray => {
                tracing::info!("Using NdArray CPU backend");
                self.run_on::<Autodiff<NdArray>>(train, test, &ckpt, NdArrayDevice::default())?
            }
        };

        // Record which epoch the saved weights come from, so `evaluate`
        // scores them at the temperature they were selected at
        if let Some(&epoch) = summary.saved_epochs.last() {
            let mut saved = cfg.clone();
            saved.best_epoch = Some(epoch);
            ckpt.save_config(&saved)?;
        }
        Ok(summary)
    }

    fn run_on<B: AutodiffBackend>(
        &self,
        train:  PuzzleDataset,
        test:   PuzzleDataset,
        ckpt:   &CheckpointManager,
        device: B::Device,
    ) -> Result<TrainingSummary> {
        let cfg     = &self.config;
        let shape   = train.shape();
        let metrics = MetricsLogger::new(&cfg.model_dir, cfg.variant.checkpoint_name(), cfg.resume)?;
        let preview = cfg
            .image_dir
            .as_ref()
            .map(|dir| GridWriter::new(dir, PREVIEW_COLUMNS))
            .transpose()?;
        let preview = preview.as_ref().map(|w| w as &dyn PreviewSink);

        match cfg.variant {
            ModelVariant::Gumbel => {
                let model: GumbelVae<B> = cfg.gumbel_model(shape).init(&device);
                let model = self.maybe_resume::<B, _>(model, ckpt, &device)?;
                let sinks: TrainingSinks<GumbelVae<B>> =
                    TrainingSinks { checkpoint: ckpt, metrics: Some(&metrics), preview };
                let strategy = GumbelVaeLoss::new(cfg.categorical_dim);
                let (_, summary) = run_training(cfg, model, &strategy, train, test, sinks, &device)?;
                Ok(summary)
            }
            ModelVariant::Cube => {
                let model: CubeSae<B> = cfg.cube_model(shape).init(&device);
                let model = self.maybe_resume::<B, _>(model, ckpt, &device)?;
                let sinks: TrainingSinks<CubeSae<B>> =
                    TrainingSinks { checkpoint: ckpt, metrics: Some(&metrics), preview };
                let (_, summary) = run_training(cfg, model, &cfg.cube_loss(), train, test, sinks, &device)?;
                Ok(summary)
            }
        }
    }

    /// Start from the saved best weights when `--resume` is set.
    fn maybe_resume<B: AutodiffBackend, M: burn::module::Module<B>>(
        &self,
        model:  M,
        ckpt:   &CheckpointManager,
        device: &B::Device,
    ) -> Result<M> {
        if !self.config.resume {
            return Ok(model);
        }
        if !ckpt.has_checkpoint() {
            tracing::warn!("--resume set but no checkpoint found, starting from scratch");
            return Ok(model);
        }
        ckpt.load_model::<B, M>(model, device)
    }
}
