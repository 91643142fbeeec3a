// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per epoch so learning curves can be
// plotted after the run.
//
// Columns:
//   epoch        0-based, as printed on the console
//   temp_state   temperature of the state (or only) latent
//   temp_action  temperature of the action latent
//   lr           learning rate actually used for the epoch
//   train_loss   normalised train objective
//   test_loss    normalised test objective (drives checkpointing)
//   image, latent, sparsity, kl
//                test-pass diagnostic terms; empty when the
//                model family does not report the term
//   saved        1 when the epoch produced a new checkpoint
//
// Output file: {model_dir}/{name}_metrics.csv
//
// Example CSV output (Gumbel VAE):
//   epoch,temp_state,temp_action,lr,train_loss,test_loss,image,latent,sparsity,kl,saved
//   0,1.000000,1.000000,0.001000,4.312000,3.977000,398.1,,,0.42,1
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

use crate::domain::losses::{EpochReport, LossComponent};
use crate::domain::schedule::Temperature;

const HEADER: &str =
    "epoch,temp_state,temp_action,lr,train_loss,test_loss,image,latent,sparsity,kl,saved";

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:       usize,
    pub temperature: Temperature,
    pub lr:          f64,
    pub train_loss:  f64,
    pub test_loss:   f64,
    /// Test-pass diagnostic terms, in LossComponent::ALL order
    pub components:  [Option<f64>; 4],
    pub saved:       bool,
}

impl EpochMetrics {
    pub fn new(
        epoch:       usize,
        temperature: Temperature,
        lr:          f64,
        train:       &EpochReport,
        test:        &EpochReport,
        saved:       bool,
    ) -> Self {
        Self {
            epoch,
            temperature,
            lr,
            train_loss: train.loss,
            test_loss:  test.loss,
            components: LossComponent::ALL.map(|c| test.component(c)),
            saved,
        }
    }

    fn csv_row(&self) -> String {
        let terms: Vec<String> = self
            .components
            .iter()
            .map(|v| v.map(|v| format!("{v:.6}")).unwrap_or_default())
            .collect();
        format!(
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{},{}",
            self.epoch,
            self.temperature.state,
            self.temperature.action,
            self.lr,
            self.train_loss,
            self.test_loss,
            terms.join(","),
            u8::from(self.saved),
        )
    }
}

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// A fresh run (`append = false`) truncates any previous log and
    /// writes the header. A resumed run keeps appending to the same
    /// log and only writes the header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>, name: &str, append: bool) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;

        let csv_path = dir.join(format!("{name}_metrics.csv"));
        if !append || !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;
        writeln!(f, "{}", m.csv_row())?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, test_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.test_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
