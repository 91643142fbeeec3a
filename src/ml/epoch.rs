// ============================================================
// Layer 5 — Epoch Runner
// ============================================================
// One pass over a data loader, in one of two modes.
//
// Training  (autodiff backend, dropout active)
//   for each batch:
//     noisy  = batch + N(0, σ²)          (if the variant adds noise)
//     output = model.forward(noisy, temperature)
//     terms  = strategy.compute(output, clean batch)
//     grads  = terms.objective.backward()
//     model  = optim.step(lr, model, grads)
//
//   Burn's optimiser consumes the gradients on every step, so
//   nothing accumulates between batches and no explicit
//   zero-grad is needed.
//
// Evaluation  (model.valid(): inner backend, no graph, no dropout)
//   same forward + loss, no step; the first batch can be handed
//   to a PreviewSink for the diagnostic grid.
//
// NaN / Inf losses are not caught here: they flow into the report
// and the best-loss tracker simply never picks them.
//
// Reference: Burn Book §5 (Custom Training Loop)

use anyhow::Result;
use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::FrameBatch;
use crate::domain::losses::{EpochReport, LossAccumulator};
use crate::domain::schedule::Temperature;
use crate::domain::traits::PreviewSink;
use crate::ml::loss::LossStrategy;
use crate::ml::model::PuzzleModel;
use crate::ml::noise::NoiseSource;

/// Number of samples drawn per panel in the diagnostic grid.
pub const PREVIEW_COLUMNS: usize = 8;

/// Per-pass forward settings.
#[derive(Debug, Clone, Copy)]
pub struct PassSettings {
    pub temperature: Temperature,
    /// Standard deviation of the input corruption; None disables it
    pub noise_std:   Option<f64>,
}

/// One training pass. Returns the updated model and the epoch means.
pub fn train_epoch<B, M, O>(
    mut model: M,
    optim:     &mut O,
    loader:    &dyn DataLoader<FrameBatch<B>>,
    strategy:  &M::Strategy,
    pass:      PassSettings,
    lr:        f64,
    noise:     &mut NoiseSource,
) -> (M, EpochReport)
where
    B: AutodiffBackend,
    M: PuzzleModel<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    let mut acc = LossAccumulator::new();

    for batch in loader.iter() {
        let samples = batch.batch_size();
        let inputs  = noise.perturb(&batch, pass.noise_std);
        let output  = model.forward(inputs, pass.temperature, noise);
        let terms   = strategy.compute(&output, &batch);

        acc.add_batch(terms.objective_value(), &terms.component_values(), samples);

        let grads = terms.objective.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);
    }

    tracing::debug!("Train pass: {} batches", acc.batches());
    (model, acc.finish(strategy.normalization()))
}

/// One evaluation pass. `preview` receives the first batch's panels
/// tagged with the given epoch.
pub fn eval_epoch<B, M>(
    model:    &M,
    loader:   &dyn DataLoader<FrameBatch<B>>,
    strategy: &M::Strategy,
    pass:     PassSettings,
    noise:    &mut NoiseSource,
    preview:  Option<(&dyn PreviewSink, usize)>,
) -> Result<EpochReport>
where
    B: Backend,
    M: PuzzleModel<B>,
{
    let mut acc = LossAccumulator::new();

    for (i, batch) in loader.iter().enumerate() {
        let samples = batch.batch_size();
        let inputs  = noise.perturb(&batch, pass.noise_std);
        let output  = model.forward(inputs, pass.temperature, noise);
        let terms   = strategy.compute(&output, &batch);

        acc.add_batch(terms.objective_value(), &terms.component_values(), samples);

        if i == 0 {
            if let Some((sink, epoch)) = preview {
                let panels = strategy.preview(&output, &batch, PREVIEW_COLUMNS)?;
                sink.show(epoch, &panels)?;
            }
        }
    }

    tracing::debug!("Eval pass: {} batches", acc.batches());
    Ok(acc.finish(strategy.normalization()))
}
