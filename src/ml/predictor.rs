// ============================================================
// Layer 5 — Posterior Predictor
// ============================================================
// Loads a trained checkpoint and serves Monte-Carlo predictions
// for evaluation. The counterpart of the training loop: rebuilds
// the model from the saved config, restores the weights, and
// exposes tensor-free outputs so the application layer never
// touches burn.

use anyhow::Result;
use burn::prelude::*;

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{NullBernoulliModel, NullBernoulliModelConfig};
use crate::ml::nll::sample_bernoulli_nll;
use crate::ml::vimlts::PosteriorDensity;

type EvalBackend = burn::backend::NdArray;

pub struct PosteriorPredictor {
    model: NullBernoulliModel<EvalBackend>,
    device: burn::backend::ndarray::NdArrayDevice,
}

impl PosteriorPredictor {
    /// Rebuild the trained model from `checkpoint_dir`.
    pub fn from_checkpoint(checkpoint_dir: &str) -> Result<Self> {
        let ckpt = CheckpointManager::new(checkpoint_dir);
        let cfg = ckpt.load_config()?;
        let device = burn::backend::ndarray::NdArrayDevice::default();

        let model = NullBernoulliModelConfig::new()
            .with_num_samples(cfg.num_samples)
            .with_degree(cfg.degree)
            .init(&device)?;
        let model = ckpt.load_model(model, &device)?;

        Ok(Self { model, device })
    }

    /// Monte-Carlo expected Bernoulli NLL of the model on the given
    /// labels, via the shared numeric contract.
    pub fn nll(&self, y_true: &[f64]) -> Result<f64> {
        let out = self.forward(y_true.len())?;
        let targets_vec: Vec<f32> = y_true.iter().map(|&v| v as f32).collect();
        let targets =
            Tensor::<EvalBackend, 1>::from_floats(targets_vec.as_slice(), &self.device);
        Ok(sample_bernoulli_nll(targets, out)?)
    }

    /// Per-instance predictive means, i.e. Monte-Carlo probabilities
    /// averaged over the sample axis. Usable directly as one "reader"
    /// in the bootstrap estimator.
    pub fn predictive_means(&self, n: usize) -> Result<Vec<f64>> {
        let probs = self.forward(n)?;
        let [samples, batch, _] = probs.dims();
        let flat: Vec<f32> = probs.mean_dim(0).reshape([batch]).to_data().iter::<f32>().collect();
        debug_assert_eq!(flat.len(), n);
        tracing::debug!("Predictive means from {} Monte-Carlo samples", samples);
        Ok(flat.into_iter().map(|p| p as f64).collect())
    }

    /// Posterior density curves of the latent bias for external
    /// plotting.
    pub fn posterior_density(&self, points: usize) -> PosteriorDensity {
        self.model.posterior_density(points)
    }

    fn forward(&self, n: usize) -> Result<Tensor<EvalBackend, 3>> {
        anyhow::ensure!(n > 0, "cannot predict for an empty instance set");
        let input = Tensor::<EvalBackend, 2>::zeros([n, 1], &self.device);
        Ok(self.model.forward(input)?.probs)
    }
}
