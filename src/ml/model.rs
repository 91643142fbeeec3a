use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{relu, sigmoid, softmax},
};

use crate::data::batcher::FrameBatch;
use crate::domain::frame::FrameShape;
use crate::domain::schedule::Temperature;
use crate::ml::loss::{CubeSaeLoss, GumbelVaeLoss, LossStrategy};
use crate::ml::noise::NoiseSource;

const GUMBEL_EPS: f64 = 1e-20;

/// A model the epoch runner can drive. `Strategy` decides how its
/// output is scored.
pub trait PuzzleModel<B: Backend>: Module<B> {
    type Strategy: LossStrategy;

    fn forward(
        &self,
        batch:       FrameBatch<B>,
        temperature: Temperature,
        noise:       &mut NoiseSource,
    ) -> <Self::Strategy as LossStrategy>::Output<B>;
}

/// Relaxed one-hot sample along the last dimension.
pub fn gumbel_softmax<B: Backend, const D: usize>(
    logits:      Tensor<B, D>,
    temperature: f64,
    noise:       &mut NoiseSource,
) -> Tensor<B, D> {
    let u: Tensor<B, D> = noise.uniform(logits.dims(), &logits.device());
    let g = u.add_scalar(GUMBEL_EPS).log().neg().add_scalar(GUMBEL_EPS).log().neg();
    softmax((logits + g).div_scalar(temperature), D - 1)
}

// ─── Gumbel VAE ───────────────────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct GumbelVaeConfig {
    pub shape: FrameShape,
    #[config(default = 36)]
    pub latent_slots:    usize,
    #[config(default = 2)]
    pub categorical_dim: usize,
    #[config(default = 512)]
    pub hidden:          usize,
}

impl GumbelVaeConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GumbelVae<B> {
        let pixels = self.shape.len();
        let latent = self.latent_slots * self.categorical_dim;
        let half   = self.hidden / 2;
        GumbelVae {
            enc1: LinearConfig::new(pixels, self.hidden).init(device),
            enc2: LinearConfig::new(self.hidden, half).init(device),
            enc3: LinearConfig::new(half, latent).init(device),
            dec1: LinearConfig::new(latent, half).init(device),
            dec2: LinearConfig::new(half, self.hidden).init(device),
            dec3: LinearConfig::new(self.hidden, pixels).init(device),
            latent_slots:    self.latent_slots,
            categorical_dim: self.categorical_dim,
        }
    }
}

#[derive(Module, Debug)]
pub struct GumbelVae<B: Backend> {
    pub enc1: Linear<B>,
    pub enc2: Linear<B>,
    pub enc3: Linear<B>,
    pub dec1: Linear<B>,
    pub dec2: Linear<B>,
    pub dec3: Linear<B>,
    pub latent_slots:    usize,
    pub categorical_dim: usize,
}

pub struct GumbelOutput<B: Backend> {
    /// Reconstruction in [0, 1], same shape as the input
    pub recon: Tensor<B, 4>,
    /// Posterior over categories: [batch, slots, categories]
    pub qy:    Tensor<B, 3>,
}

impl<B: Backend> PuzzleModel<B> for GumbelVae<B> {
    type Strategy = GumbelVaeLoss;

    fn forward(
        &self,
        batch:       FrameBatch<B>,
        temperature: Temperature,
        noise:       &mut NoiseSource,
    ) -> GumbelOutput<B> {
        let [n, c, h, w] = batch.images.dims();
        let x = batch.images.reshape([n, c * h * w]);

        let x = relu(self.enc1.forward(x));
        let x = relu(self.enc2.forward(x));
        let q = self.enc3
            .forward(x)
            .reshape([n, self.latent_slots, self.categorical_dim]);

        let z = gumbel_softmax(q.clone(), temperature.state, noise)
            .reshape([n, self.latent_slots * self.categorical_dim]);

        let y     = relu(self.dec1.forward(z));
        let y     = relu(self.dec2.forward(y));
        let recon = sigmoid(self.dec3.forward(y)).reshape([n, c, h, w]);

        GumbelOutput { recon, qy: softmax(q, 2) }
    }
}

// ─── Cube Sae ─────────────────────────────────────────────────────────────────
// Binary latent state z for each frame, a categorical action
// inferred from (z, z′), and an effect model that predicts z′
// from z and the action. The shared decoder renders z, z′ and
// the prediction ẑ′.

#[derive(Config, Debug)]
pub struct CubeSaeConfig {
    pub shape: FrameShape,
    #[config(default = 36)]
    pub latent_dim:  usize,
    #[config(default = 24)]
    pub num_actions: usize,
    #[config(default = 512)]
    pub hidden:      usize,
    #[config(default = 0.2)]
    pub dropout:     f64,
}

impl CubeSaeConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CubeSae<B> {
        let pixels = self.shape.len();
        let half   = self.hidden / 2;
        CubeSae {
            enc1:     LinearConfig::new(pixels, self.hidden).init(device),
            enc2:     LinearConfig::new(self.hidden, half).init(device),
            enc3:     LinearConfig::new(half, self.latent_dim * 2).init(device),
            dec1:     LinearConfig::new(self.latent_dim, half).init(device),
            dec2:     LinearConfig::new(half, self.hidden).init(device),
            dec3:     LinearConfig::new(self.hidden, pixels).init(device),
            act1:     LinearConfig::new(self.latent_dim * 2, half).init(device),
            act2:     LinearConfig::new(half, self.num_actions).init(device),
            state:    LinearConfig::new(self.latent_dim, self.latent_dim).init(device),
            effect:   LinearConfig::new(self.num_actions, self.latent_dim).init(device),
            dropout:  DropoutConfig::new(self.dropout).init(),
            latent_dim: self.latent_dim,
            channels:   self.shape.channels,
            height:     self.shape.height,
            width:      self.shape.width,
        }
    }
}

#[derive(Module, Debug)]
pub struct CubeSae<B: Backend> {
    pub enc1:   Linear<B>,
    pub enc2:   Linear<B>,
    pub enc3:   Linear<B>,
    pub dec1:   Linear<B>,
    pub dec2:   Linear<B>,
    pub dec3:   Linear<B>,
    pub act1:   Linear<B>,
    pub act2:   Linear<B>,
    pub state:  Linear<B>,
    pub effect: Linear<B>,
    pub dropout:    Dropout,
    pub latent_dim: usize,
    pub channels:   usize,
    pub height:     usize,
    pub width:      usize,
}

pub struct CubeOutput<B: Backend> {
    pub recon:       Tensor<B, 4>,
    pub recon_next:  Tensor<B, 4>,
    /// Decoded from the predicted successor latent
    pub recon_pred:  Tensor<B, 4>,
    pub z:           Tensor<B, 2>,
    pub z_next:      Tensor<B, 2>,
    pub z_next_pred: Tensor<B, 2>,
    pub action:      Tensor<B, 2>,
}

impl<B: Backend> CubeSae<B> {
    /// images [n, c, h, w] → binary-concrete latent [n, latent_dim]
    fn encode(&self, images: Tensor<B, 4>, temperature: f64, noise: &mut NoiseSource) -> Tensor<B, 2> {
        let [n, c, h, w] = images.dims();
        let x = images.reshape([n, c * h * w]);
        let x = self.dropout.forward(relu(self.enc1.forward(x)));
        let x = self.dropout.forward(relu(self.enc2.forward(x)));
        let logits = self.enc3.forward(x).reshape([n, self.latent_dim, 2]);

        // First category of each binary pair is the "on" probability
        gumbel_softmax(logits, temperature, noise)
            .slice([0..n, 0..self.latent_dim, 0..1])
            .reshape([n, self.latent_dim])
    }

    fn decode(&self, z: Tensor<B, 2>) -> Tensor<B, 4> {
        let [n, _] = z.dims();
        let (c, h, w) = (self.channels, self.height, self.width);
        let y = relu(self.dec1.forward(z));
        let y = relu(self.dec2.forward(y));
        sigmoid(self.dec3.forward(y)).reshape([n, c, h, w])
    }
}

impl<B: Backend> PuzzleModel<B> for CubeSae<B> {
    type Strategy = CubeSaeLoss;

    fn forward(
        &self,
        batch:       FrameBatch<B>,
        temperature: Temperature,
        noise:       &mut NoiseSource,
    ) -> CubeOutput<B> {
        let Some(next) = batch.next else {
            panic!("the cube sae needs state/successor frame pairs");
        };

        let z      = self.encode(batch.images, temperature.state, noise);
        let z_next = self.encode(next, temperature.state, noise);

        let pair   = Tensor::cat(vec![z.clone(), z_next.clone()], 1);
        let logits = self.act2.forward(relu(self.act1.forward(pair)));
        let action = gumbel_softmax(logits, temperature.action, noise);

        let z_next_pred = sigmoid(
            self.state.forward(z.clone()) + self.effect.forward(action.clone()),
        );

        CubeOutput {
            recon:       self.decode(z.clone()),
            recon_next:  self.decode(z_next.clone()),
            recon_pred:  self.decode(z_next_pred.clone()),
            z,
            z_next,
            z_next_pred,
            action,
        }
    }
}
