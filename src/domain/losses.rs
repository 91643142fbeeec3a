// ============================================================
// Layer 3 — Loss Accounting
// ============================================================
// Backend-free bookkeeping for one pass over a data loader.
//
// The ML layer turns every batch into plain f64 values; this
// module only sums them and divides at the end. Each pass gets a
// fresh accumulator, so nothing leaks between epochs.
//
// Two normalisations exist because the two model families report
// on different scales:
//   PerBatch  — divide by the number of batches   (Cube Sae)
//   PerSample — divide by the number of samples   (Gumbel VAE)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Named diagnostic terms a loss strategy can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LossComponent {
    /// Image reconstruction (binary cross-entropy)
    Image,
    /// Latent-consistency between predicted and encoded successor
    Latent,
    /// Activation-sum penalty on the latent codes
    Sparsity,
    /// Divergence of the categorical posterior from a uniform prior
    Kl,
}

impl LossComponent {
    pub const ALL: [LossComponent; 4] = [
        LossComponent::Image,
        LossComponent::Latent,
        LossComponent::Sparsity,
        LossComponent::Kl,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Image    => "image",
            Self::Latent   => "latent",
            Self::Sparsity => "sparsity",
            Self::Kl       => "kl",
        }
    }
}

impl fmt::Display for LossComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Normalization {
    PerBatch,
    PerSample,
}

/// Running sums for one pass.
#[derive(Debug, Default, Clone)]
pub struct LossAccumulator {
    total:      f64,
    components: BTreeMap<LossComponent, f64>,
    batches:    usize,
    samples:    usize,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one batch: its optimised loss, its diagnostic terms and
    /// how many samples it held.
    pub fn add_batch(
        &mut self,
        loss:       f64,
        components: &[(LossComponent, f64)],
        samples:    usize,
    ) {
        self.total   += loss;
        self.batches += 1;
        self.samples += samples;
        for (component, value) in components {
            *self.components.entry(*component).or_insert(0.0) += value;
        }
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Divide every sum by the chosen count.
    ///
    /// An empty pass yields NaN, same as dividing by zero would
    /// anywhere else in the loop.
    pub fn finish(self, normalization: Normalization) -> EpochReport {
        let denom = match normalization {
            Normalization::PerBatch  => self.batches,
            Normalization::PerSample => self.samples,
        };
        let denom = if denom == 0 { f64::NAN } else { denom as f64 };

        EpochReport {
            loss:       self.total / denom,
            components: self.components
                .into_iter()
                .map(|(k, v)| (k, v / denom))
                .collect(),
            batches:    self.batches,
            samples:    self.samples,
        }
    }
}

/// Epoch-mean losses for one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochReport {
    pub loss:       f64,
    pub components: BTreeMap<LossComponent, f64>,
    pub batches:    usize,
    pub samples:    usize,
}

impl EpochReport {
    pub fn component(&self, c: LossComponent) -> Option<f64> {
        self.components.get(&c).copied()
    }

    /// `image=1.2345 sparsity=0.1000` style summary for log lines.
    pub fn breakdown(&self) -> String {
        self.components
            .iter()
            .map(|(k, v)| format!("{k}={v:.4}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
