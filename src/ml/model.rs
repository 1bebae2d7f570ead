// ============================================================
// Layer 5 — Null Bernoulli Model
// ============================================================
// The smallest model the variational bias layer can live in: no
// features, one output unit. Every instance shares the same
// latent logit, so the model's posterior predictive is a
// distribution over the base rate, which is exactly what a null
// model should learn.
//
// Loss per forward pass:
//
//   loss = mean_batch( mean_samples( bernoulli_nll ) ) + KL/size
//
// The NLL term is computed from logits in softplus form,
// nll = softplus(l) - y*l, which never evaluates log(0) even when
// the sigmoid saturates in f32.

use burn::nn::Initializer;
use burn::prelude::*;
use burn::tensor::activation;

use crate::ml::nll::MetricError;
use crate::ml::vimlts::{
    ConfigError, PriorConfig, VariationalOutput, VimltsLinearNull, VimltsLinearNullConfig,
};

#[derive(Config, Debug)]
pub struct NullBernoulliModelConfig {
    /// Monte-Carlo draws per forward pass.
    #[config(default = 10)]
    pub num_samples: usize,

    /// KL normalisation constant; set this to the training-set size.
    #[config(default = 10)]
    pub size: usize,

    /// Bernstein degree M of the bias warp.
    #[config(default = 2)]
    pub degree: usize,

    #[config(default = "PriorConfig::StandardNormal")]
    pub prior: PriorConfig,
}

impl NullBernoulliModelConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<NullBernoulliModel<B>, ConfigError> {
        let thetas = vec![Initializer::Normal { mean: 0.0, std: 1.0 }; self.degree];
        let bias = VimltsLinearNullConfig::new(1)
            .with_num_samples(self.num_samples)
            .with_size(self.size)
            .with_bias_init_thetas(Some(thetas))
            .with_prior(self.prior.clone())
            .init(device)?;
        Ok(NullBernoulliModel { bias })
    }
}

#[derive(Module, Debug)]
pub struct NullBernoulliModel<B: Backend> {
    bias: VimltsLinearNull<B>,
}

pub struct NullModelOutput<B: Backend> {
    /// Raw latent logits, `[#samples, #batch, 1]`.
    pub logits: Tensor<B, 3>,
    /// `sigmoid(logits)`, the Monte-Carlo predicted probabilities.
    pub probs: Tensor<B, 3>,
    /// The layer's KL term, already scaled by 1/size.
    pub kl_loss: Tensor<B, 1>,
}

impl<B: Backend> NullBernoulliModel<B> {
    /// `input` is `[#batch, #features]`; only the batch dimension is
    /// used. Returns Monte-Carlo probabilities plus the KL term.
    pub fn forward(&self, input: Tensor<B, 2>) -> Result<NullModelOutput<B>, MetricError> {
        let VariationalOutput { samples, kl_loss } = self.bias.forward(input)?;
        let probs = activation::sigmoid(samples.clone());
        Ok(NullModelOutput { logits: samples, probs, kl_loss })
    }

    /// Scaled-ELBO training loss: Monte-Carlo expected Bernoulli NLL
    /// plus the layer's KL contribution.
    pub fn forward_loss(
        &self,
        input: Tensor<B, 2>,
        targets: Tensor<B, 1>,
    ) -> Result<(Tensor<B, 1>, NullModelOutput<B>), MetricError> {
        let output = self.forward(input)?;

        let y = targets.unsqueeze_dim::<2>(0).unsqueeze_dim::<3>(2); // [1, batch, 1]
        let nll = activation::softplus(output.logits.clone(), 1.0) - output.logits.clone() * y;
        let nll = nll.mean_dim(0).mean(); // samples first, then instances

        let loss = nll + output.kl_loss.clone();
        Ok((loss, output))
    }

    /// Diagnostic posterior density of the latent bias, delegated to
    /// the variational layer.
    pub fn posterior_density(&self, points: usize) -> crate::ml::vimlts::PosteriorDensity {
        self.bias.posterior_density(points)
    }

    pub fn num_samples(&self) -> usize {
        self.bias.num_samples()
    }
}
