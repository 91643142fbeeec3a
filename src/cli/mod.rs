// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — trains a model family, saving the best checkpoint
//   2. `evaluate` — reloads that checkpoint and reports its test loss
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "puzzle-vae",
    version = "0.1.0",
    about = "Train Gumbel-softmax and cube-space autoencoders on sliding-puzzle frames."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(args.into());
    let summary  = use_case.execute()?;

    println!(
        "Training complete. Best test loss {:.4}, saved at epochs {:?}.",
        summary.best_loss, summary.saved_epochs,
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let use_case = EvaluateUseCase::new(args.variant.into(), &args.model_dir, args.data_dir)?;
    let report   = use_case.evaluate()?;

    println!("====> Test set loss: {:.4}", report.loss);
    println!("      {}", report.breakdown());
    Ok(())
}
