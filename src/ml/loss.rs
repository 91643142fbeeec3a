// ============================================================
// Layer 5 — Loss Strategies
// ============================================================
// Turns one forward-pass output into:
//   - the scalar objective that gets back-propagated
//   - named diagnostic terms for logging
//
// Every per-term loss is SUM over all non-batch dimensions, then
// MEAN over the batch. Its magnitude therefore grows with the
// number of pixels (or latent units) per sample, which sets the
// relative weight of the terms. Do not switch to a plain mean.
//
// GumbelVaeLoss
//   recon = BCE(x̂, x), each ln term floored at −100
//   kl    = Σ_slot Σ_cat qy · (ln(qy + 1e-20) − ln(1/C))
//   loss  = recon − kl           (the KL term is maximised)
//
// CubeSaeLoss
//   image    = BCE(x̂, x) + BCE(x̂′, x′) + BCE(decode(ẑ′), x′)
//   sparsity = α · (Σ z + Σ z′)
//   latent   = β · SE(ẑ′, z′)
//   loss     = image [+ sparsity + latent when regularising]
//
// A prediction/target shape mismatch panics: it means the model
// and the data disagree, and no loss value would be meaningful.
//
// Reference: Jang et al. (2017) Gumbel-Softmax
//            Asai & Muise (2020) Learning Neural-Symbolic
//            Descriptive Planning Models via Cube-Space Priors

use anyhow::Result;
use burn::prelude::*;

use crate::data::batcher::FrameBatch;
use crate::domain::frame::PreviewPanel;
use crate::domain::losses::{LossComponent, Normalization};
use crate::ml::model::{CubeOutput, GumbelOutput};
use crate::ml::preview::{image_panel, vector_panel};

/// Lowest value of each log term in the cross-entropy, so a fully
/// wrong pixel costs 100 instead of infinity.
const LOG_FLOOR: f64 = -100.0;

/// Floor added inside the KL logarithm.
const KL_EPS: f64 = 1e-20;

pub const DEFAULT_ALPHA: f64 = 0.1;
pub const DEFAULT_BETA:  f64 = 1.0;

// ─── LossTerms ────────────────────────────────────────────────────────────────
pub struct LossTerms<B: Backend> {
    /// What gets back-propagated, shape [1]
    pub objective:  Tensor<B, 1>,
    /// Diagnostic terms, reported whether or not they are optimised
    pub components: Vec<(LossComponent, Tensor<B, 1>)>,
}

impl<B: Backend> LossTerms<B> {
    pub fn objective_value(&self) -> f64 {
        self.objective.clone().into_scalar().elem::<f64>()
    }

    pub fn component_values(&self) -> Vec<(LossComponent, f64)> {
        self.components
            .iter()
            .map(|(c, t)| (*c, t.clone().into_scalar().elem::<f64>()))
            .collect()
    }
}

// ─── LossStrategy ─────────────────────────────────────────────────────────────
/// How one model family scores its output and reports its epoch mean.
pub trait LossStrategy {
    type Output<B: Backend>;

    fn normalization(&self) -> Normalization;

    /// `target` is the clean batch, even when the model saw a noisy one.
    fn compute<B: Backend>(&self, output: &Self::Output<B>, target: &FrameBatch<B>) -> LossTerms<B>;

    /// Panels for the diagnostic grid, `count` samples each.
    fn preview<B: Backend>(
        &self,
        output: &Self::Output<B>,
        target: &FrameBatch<B>,
        count:  usize,
    ) -> Result<Vec<PreviewPanel>>;
}

// ─── Per-term helpers ─────────────────────────────────────────────────────────

/// Sum everything but dim 0, then average over dim 0.
pub fn sum_then_mean<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, 1> {
    let batch = x.dims()[0] as i32;
    x.reshape([batch, -1]).sum_dim(1).mean()
}

fn check_shapes<const D: usize>(pred: [usize; D], target: [usize; D]) {
    assert_eq!(pred, target, "prediction shape {pred:?} does not match target {target:?}");
}

/// Elementwise binary cross-entropy, sum-then-mean.
pub fn binary_cross_entropy<B: Backend, const D: usize>(
    pred:   Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    check_shapes(pred.dims(), target.dims());
    let miss = pred.clone().neg().add_scalar(1.0);
    let bce  = (target.clone() * floored_log(pred)
        + target.neg().add_scalar(1.0) * floored_log(miss))
    .neg();
    sum_then_mean(bce)
}

/// `ln(x)` with exact zeros mapped to LOG_FLOOR. The input is lifted to
/// the smallest normal f32 before `ln`, so the gradient stays finite.
fn floored_log<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let zero = x.clone().lower_equal_elem(0.0);
    x.clamp_min(f32::MIN_POSITIVE as f64).log().mask_fill(zero, LOG_FLOOR)
}

/// Elementwise squared error, sum-then-mean.
pub fn squared_error<B: Backend, const D: usize>(
    pred:   Tensor<B, D>,
    target: Tensor<B, D>,
) -> Tensor<B, 1> {
    check_shapes(pred.dims(), target.dims());
    sum_then_mean((pred - target).powf_scalar(2.0))
}

// ─── GumbelVaeLoss ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct GumbelVaeLoss {
    pub categorical_dim: usize,
}

impl GumbelVaeLoss {
    pub fn new(categorical_dim: usize) -> Self {
        Self { categorical_dim }
    }

    /// KL(qy ‖ uniform) per sample, batch-averaged. qy: [batch, slots, categories].
    pub fn kl_to_uniform<B: Backend>(&self, qy: Tensor<B, 3>) -> Tensor<B, 1> {
        let log_prior = (1.0 / self.categorical_dim as f64).ln();
        let log_qy    = qy.clone().add_scalar(KL_EPS).log();
        sum_then_mean(qy * log_qy.sub_scalar(log_prior))
    }
}

impl LossStrategy for GumbelVaeLoss {
    type Output<B: Backend> = GumbelOutput<B>;

    fn normalization(&self) -> Normalization {
        Normalization::PerSample
    }

    fn compute<B: Backend>(&self, output: &GumbelOutput<B>, target: &FrameBatch<B>) -> LossTerms<B> {
        let recon = binary_cross_entropy(output.recon.clone(), target.images.clone());
        let kl    = self.kl_to_uniform(output.qy.clone());

        LossTerms {
            objective:  recon.clone() - kl.clone(),
            components: vec![(LossComponent::Image, recon), (LossComponent::Kl, kl)],
        }
    }

    fn preview<B: Backend>(
        &self,
        output: &GumbelOutput<B>,
        target: &FrameBatch<B>,
        count:  usize,
    ) -> Result<Vec<PreviewPanel>> {
        let [n, slots, cats] = output.qy.dims();
        Ok(vec![
            image_panel("input", target.images.clone(), count)?,
            image_panel("reconstruction", output.recon.clone(), count)?,
            vector_panel("posterior", output.qy.clone().reshape([n, slots * cats]), count)?,
        ])
    }
}

// ─── CubeSaeLoss ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy)]
pub struct CubeSaeLoss {
    /// Sparsity weight
    pub alpha:      f64,
    /// Latent-consistency weight
    pub beta:       f64,
    /// Whether sparsity and latent terms join the optimised loss
    pub regularize: bool,
}

impl Default for CubeSaeLoss {
    fn default() -> Self {
        Self { alpha: DEFAULT_ALPHA, beta: DEFAULT_BETA, regularize: true }
    }
}

impl LossStrategy for CubeSaeLoss {
    type Output<B: Backend> = CubeOutput<B>;

    fn normalization(&self) -> Normalization {
        Normalization::PerBatch
    }

    fn compute<B: Backend>(&self, output: &CubeOutput<B>, target: &FrameBatch<B>) -> LossTerms<B> {
        let Some(next) = target.next.clone() else {
            panic!("the cube sae loss needs state/successor frame pairs");
        };

        let image = binary_cross_entropy(output.recon.clone(), target.images.clone())
            + binary_cross_entropy(output.recon_next.clone(), next.clone())
            + binary_cross_entropy(output.recon_pred.clone(), next);

        let sparsity = (sum_then_mean(output.z.clone()) + sum_then_mean(output.z_next.clone()))
            .mul_scalar(self.alpha);

        let latent = squared_error(output.z_next_pred.clone(), output.z_next.clone())
            .mul_scalar(self.beta);

        let objective = if self.regularize {
            image.clone() + sparsity.clone() + latent.clone()
        } else {
            image.clone()
        };

        LossTerms {
            objective,
            components: vec![
                (LossComponent::Image,    image),
                (LossComponent::Latent,   latent),
                (LossComponent::Sparsity, sparsity),
            ],
        }
    }

    fn preview<B: Backend>(
        &self,
        output: &CubeOutput<B>,
        target: &FrameBatch<B>,
        count:  usize,
    ) -> Result<Vec<PreviewPanel>> {
        let mut panels = vec![image_panel("state", target.images.clone(), count)?];
        if let Some(next) = target.next.clone() {
            panels.push(image_panel("successor", next, count)?);
        }
        panels.extend([
            image_panel("state reconstruction", output.recon.clone(), count)?,
            image_panel("successor reconstruction", output.recon_next.clone(), count)?,
            image_panel("predicted successor", output.recon_pred.clone(), count)?,
            vector_panel("state latent", output.z.clone(), count)?,
            vector_panel("successor latent", output.z_next.clone(), count)?,
            vector_panel("action", output.action.clone(), count)?,
        ]);
        Ok(panels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TestBackend = NdArray;

    fn tensor4(values: Vec<f32>, dims: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(values, dims), &Default::default())
    }

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_sum_then_mean_scales_with_sample_size() {
        // two samples, each with four 1.0 values → sum 4, mean over batch 4
        let x = tensor4(vec![1.0; 8], [2, 1, 2, 2]);
        assert_eq!(scalar(sum_then_mean(x)), 4.0);
    }

    #[test]
    fn test_bce_matches_hand_computation() {
        let pred   = tensor4(vec![0.5, 0.25], [1, 1, 1, 2]);
        let target = tensor4(vec![1.0, 0.0], [1, 1, 1, 2]);
        let expected = -(0.5f64.ln()) - (0.75f64.ln());
        assert!((scalar(binary_cross_entropy(pred, target)) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_confident_miss_costs_hundred_per_pixel() {
        // sample 0 fully wrong on both pixels, sample 1 fully right
        let pred   = tensor4(vec![0.0, 1.0, 1.0, 0.0], [2, 1, 1, 2]);
        let target = tensor4(vec![1.0, 0.0, 1.0, 0.0], [2, 1, 1, 2]);
        assert!((scalar(binary_cross_entropy(pred, target)) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_saturated_prediction_has_finite_gradient() {
        type AdBackend = burn::backend::Autodiff<NdArray>;
        let device = Default::default();
        let pred: Tensor<AdBackend, 4> =
            Tensor::from_data(TensorData::new(vec![0.0f32, 1.0, 0.5, 1.0], [1, 1, 2, 2]), &device)
                .require_grad();
        let target: Tensor<AdBackend, 4> =
            Tensor::from_data(TensorData::new(vec![1.0f32, 1.0, 0.0, 0.0], [1, 1, 2, 2]), &device);

        let grads = binary_cross_entropy(pred.clone(), target).backward();
        let grad  = pred.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        assert!(grad.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_reconstruction_losses_non_negative() {
        let pred   = tensor4(vec![0.0, 0.3, 0.9, 1.0, 0.5, 0.1], [2, 1, 1, 3]);
        let target = tensor4(vec![0.0, 1.0, 0.2, 1.0, 0.5, 0.7], [2, 1, 1, 3]);
        assert!(scalar(binary_cross_entropy(pred.clone(), target.clone())) >= 0.0);
        assert!(scalar(squared_error(pred, target)) >= 0.0);
    }

    #[test]
    #[should_panic]
    fn test_shape_mismatch_panics() {
        let pred   = tensor4(vec![0.5; 4], [1, 1, 2, 2]);
        let target = tensor4(vec![0.5; 4], [1, 1, 1, 4]);
        let _ = binary_cross_entropy(pred, target);
    }

    #[test]
    fn test_gumbel_total_subtracts_kl() {
        let device = Default::default();
        let strategy = GumbelVaeLoss::new(2);
        // qy not uniform, so the KL term is strictly positive
        let qy: Tensor<TestBackend, 3> =
            Tensor::from_data(TensorData::new(vec![0.9f32, 0.1, 0.2, 0.8], [1, 2, 2]), &device);
        let output = GumbelOutput {
            recon: tensor4(vec![0.6, 0.4], [1, 1, 1, 2]),
            qy,
        };
        let target = FrameBatch { images: tensor4(vec![1.0, 0.0], [1, 1, 1, 2]), next: None };

        let terms = strategy.compute(&output, &target);
        let parts = terms.component_values();
        let recon = parts[0].1;
        let kl    = parts[1].1;
        assert!(kl > 0.0);
        assert!((terms.objective_value() - (recon - kl)).abs() < 1e-5);
    }

    #[test]
    fn test_kl_of_uniform_posterior_is_zero() {
        let device = Default::default();
        let qy: Tensor<TestBackend, 3> = Tensor::full([3, 4, 5], 0.2, &device);
        let kl = GumbelVaeLoss::new(5).kl_to_uniform(qy);
        assert!(scalar(kl).abs() < 1e-5);
    }

    fn cube_output(device: &<TestBackend as Backend>::Device) -> (CubeOutput<TestBackend>, FrameBatch<TestBackend>) {
        let output = CubeOutput {
            recon:       tensor4(vec![0.8, 0.2], [1, 1, 1, 2]),
            recon_next:  tensor4(vec![0.3, 0.6], [1, 1, 1, 2]),
            recon_pred:  tensor4(vec![0.4, 0.5], [1, 1, 1, 2]),
            z:           Tensor::from_data(TensorData::new(vec![1.0f32, 0.0, 1.0], [1, 3]), device),
            z_next:      Tensor::from_data(TensorData::new(vec![0.0f32, 1.0, 1.0], [1, 3]), device),
            z_next_pred: Tensor::from_data(TensorData::new(vec![0.5f32, 0.5, 1.0], [1, 3]), device),
            action:      Tensor::from_data(TensorData::new(vec![1.0f32, 0.0], [1, 2]), device),
        };
        let target = FrameBatch {
            images: tensor4(vec![1.0, 0.0], [1, 1, 1, 2]),
            next:   Some(tensor4(vec![0.0, 1.0], [1, 1, 1, 2])),
        };
        (output, target)
    }

    #[test]
    fn test_cube_total_is_sum_of_terms() {
        let device = Default::default();
        let (output, target) = cube_output(&device);
        let strategy = CubeSaeLoss { alpha: 0.5, beta: 2.0, regularize: true };

        let terms = strategy.compute(&output, &target);
        let parts: std::collections::BTreeMap<_, _> = terms.component_values().into_iter().collect();

        // sparsity = 0.5 * (2 + 2), latent = 2 * (0.25 + 0.25 + 0)
        assert!((parts[&LossComponent::Sparsity] - 2.0).abs() < 1e-5);
        assert!((parts[&LossComponent::Latent]   - 1.0).abs() < 1e-5);
        let expected = parts[&LossComponent::Image] + 2.0 + 1.0;
        assert!((terms.objective_value() - expected).abs() < 1e-4);
    }

    #[test]
    fn test_cube_without_regularisation_still_reports_terms() {
        let device = Default::default();
        let (output, target) = cube_output(&device);
        let strategy = CubeSaeLoss { alpha: 0.5, beta: 2.0, regularize: false };

        let terms = strategy.compute(&output, &target);
        let parts: std::collections::BTreeMap<_, _> = terms.component_values().into_iter().collect();
        assert_eq!(parts.len(), 3);
        assert!((terms.objective_value() - parts[&LossComponent::Image]).abs() < 1e-6);
    }

    #[test]
    #[should_panic]
    fn test_cube_needs_pairs() {
        let device = Default::default();
        let (output, mut target) = cube_output(&device);
        target.next = None;
        let _ = CubeSaeLoss::default().compute(&output, &target);
    }
}
