// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// Every `train` flag except --variant is optional: an absent flag
// keeps the default of the chosen model family (see
// TrainConfig::for_variant), so `train --variant cube` alone
// reproduces the reference setup.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::{BackendKind, ModelVariant, TrainConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a model, checkpointing the best test loss
    Train(TrainArgs),

    /// Score the best checkpoint of a previous run
    Evaluate(EvaluateArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantArg {
    /// Categorical (Gumbel-softmax) VAE over single frames
    Gumbel,
    /// Dual-frame autoencoder with latent actions
    Cube,
}

impl From<VariantArg> for ModelVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Gumbel => ModelVariant::Gumbel,
            VariantArg::Cube   => ModelVariant::Cube,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    /// GPU through wgpu
    Wgpu,
    /// CPU through ndarray
    Ndarray,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Wgpu    => BackendKind::Wgpu,
            BackendArg::Ndarray => BackendKind::NdArray,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Model family to train
    #[arg(long, value_enum)]
    pub variant: VariantArg,

    /// Number of full passes through the training data
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Directory of .png frames (pre/ and suc/ for the cube variant).
    /// Synthetic sliding puzzles are generated when it is missing.
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Directory for checkpoints, config and metrics
    #[arg(long)]
    pub model_dir: Option<String>,

    /// Directory for per-epoch preview grids
    #[arg(long)]
    pub image_dir: Option<String>,

    /// Disable the preview grids
    #[arg(long, conflicts_with = "image_dir")]
    pub no_images: bool,

    /// Training batch size; must divide the training split
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Test batch size; must divide the test split
    #[arg(long)]
    pub test_batch_size: Option<usize>,

    /// Number of samples held out for testing
    #[arg(long)]
    pub test_size: Option<usize>,

    /// Number of synthetic samples when no data directory is used
    #[arg(long)]
    pub samples: Option<usize>,

    /// Base learning rate for Adam
    #[arg(long)]
    pub lr: Option<f64>,

    /// Master seed for shuffling, noise and synthetic data
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start from the saved best checkpoint
    #[arg(long)]
    pub resume: bool,

    #[arg(long, value_enum, default_value = "wgpu")]
    pub backend: BackendArg,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mut cfg = TrainConfig::for_variant(a.variant.into());

        if let Some(v) = a.epochs          { cfg.epochs = v; }
        if let Some(v) = a.model_dir       { cfg.model_dir = v; }
        if let Some(v) = a.batch_size      { cfg.batch_size = v; }
        if let Some(v) = a.test_batch_size { cfg.test_batch_size = v; }
        if let Some(v) = a.test_size       { cfg.test_size = v; }
        if let Some(v) = a.samples         { cfg.synthetic_samples = v; }
        if let Some(v) = a.lr              { cfg.lr = v; }
        if let Some(v) = a.seed            { cfg.seed = v; }

        cfg.data_dir = a.data_dir;
        if a.image_dir.is_some() {
            cfg.image_dir = a.image_dir;
        }
        if a.no_images {
            cfg.image_dir = None;
        }
        cfg.resume  = a.resume;
        cfg.backend = a.backend.into();
        cfg
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Model family whose checkpoint to load
    #[arg(long, value_enum)]
    pub variant: VariantArg,

    /// Directory where the checkpoint and config were saved
    #[arg(long, default_value = "puzzle/model")]
    pub model_dir: String,

    /// Score on frames from this directory instead of the training source
    #[arg(long)]
    pub data_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_config(args: &[&str]) -> TrainConfig {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        match cli.command {
            Commands::Train(a) => a.into(),
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_flags_keep_variant_defaults() {
        let cfg = train_config(&["puzzle-vae", "train", "--variant", "cube"]);
        assert_eq!(cfg.variant, ModelVariant::Cube);
        assert_eq!(cfg.test_batch_size, 2000);
        assert_eq!(cfg.image_dir.as_deref(), Some("puzzle/image"));
        assert_eq!(cfg.backend, BackendKind::Wgpu);
    }

    #[test]
    fn test_flags_override_defaults() {
        let cfg = train_config(&[
            "puzzle-vae", "train", "--variant", "gumbel", "--epochs", "3",
            "--batch-size", "50", "--backend", "ndarray", "--no-images", "--resume",
        ]);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.batch_size, 50);
        assert_eq!(cfg.backend, BackendKind::NdArray);
        assert!(cfg.image_dir.is_none());
        assert!(cfg.resume);
    }

    #[test]
    fn test_variant_is_required() {
        assert!(Cli::try_parse_from(["puzzle-vae", "train"]).is_err());
    }
}
