// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Fits the null Bernoulli model with Adam on the full label set.
//
// There is no mini-batching: the null model has no features, the
// whole dataset is one label vector, and each epoch is a single
// forward/backward pass whose stochasticity comes entirely from
// the layer's Monte-Carlo noise draws.
//
// Backend split, as usual with burn:
//   - TrainBackend (Autodiff<NdArray>) for gradients
//   - model.valid() drops to NdArray for the post-training summary
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::dataset::BinaryDataset;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::model::{NullBernoulliModel, NullBernoulliModelConfig};

type TrainBackend = burn::backend::Autodiff<burn::backend::NdArray>;
type EvalBackend = burn::backend::NdArray;

pub fn run_training(
    cfg: &TrainConfig,
    dataset: BinaryDataset,
    ckpt_manager: CheckpointManager,
) -> Result<()> {
    let device = burn::backend::ndarray::NdArrayDevice::default();
    tracing::info!("Using ndarray device: {:?}", device);
    train_loop(cfg, dataset, ckpt_manager, device)
}

fn train_loop(
    cfg: &TrainConfig,
    dataset: BinaryDataset,
    ckpt_manager: CheckpointManager,
    device: burn::backend::ndarray::NdArrayDevice,
) -> Result<()> {
    if let Some(seed) = cfg.seed {
        TrainBackend::seed(seed);
    }

    let n = dataset.len();

    // ── Build model ───────────────────────────────────────────────────────────
    // size = n wires the 1/size KL scaling to the dataset size
    let model_cfg = NullBernoulliModelConfig::new()
        .with_num_samples(cfg.num_samples)
        .with_degree(cfg.degree)
        .with_size(n);
    let mut model: NullBernoulliModel<TrainBackend> = model_cfg.init(&device)?;
    tracing::info!(
        "Model ready: degree={}, num_samples={}, size={}",
        cfg.degree,
        cfg.num_samples,
        n
    );

    // ── Adam optimiser ────────────────────────────────────────────────────────
    let optim_cfg = AdamConfig::new().with_epsilon(1e-8);
    let mut optim = optim_cfg.init();

    // ── Full-batch tensors ────────────────────────────────────────────────────
    // the null model consumes no features, only the batch dimension
    let inputs = Tensor::<TrainBackend, 2>::zeros([n, 1], &device);
    let labels: Vec<f32> = dataset.labels().iter().map(|&v| v as f32).collect();
    let targets = Tensor::<TrainBackend, 1>::from_floats(labels.as_slice(), &device);

    let logger = MetricsLogger::new(cfg.checkpoint_dir.clone())?;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {
        let (loss, output) = model.forward_loss(inputs.clone(), targets.clone())?;

        let elbo: f64 = loss.clone().into_scalar().elem::<f64>();
        let kl: f64 = output.kl_loss.clone().into_scalar().elem::<f64>();
        let nll = elbo - kl;

        // Backward pass + Adam update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(cfg.lr, model, grads);

        if epoch % cfg.log_every == 0 || epoch == cfg.epochs {
            println!(
                "Epoch {:>4}/{} | elbo={:.4} | nll={:.4} | kl={:.4}",
                epoch, cfg.epochs, elbo, nll, kl,
            );
        }
        logger.log(&EpochMetrics::new(epoch, nll, kl, elbo))?;
        ckpt_manager.save_model(&model, epoch)?;
    }

    // ── Posterior predictive summary ──────────────────────────────────────────
    // dropout-free, autodiff-free evaluation pass
    let model_valid: NullBernoulliModel<EvalBackend> = model.valid();
    let out = model_valid.forward(Tensor::<EvalBackend, 2>::zeros([1, 1], &device))?;
    let probs: Vec<f32> = out.probs.to_data().iter::<f32>().collect();
    let mean = probs.iter().map(|&p| p as f64).sum::<f64>() / probs.len() as f64;
    let var = probs
        .iter()
        .map(|&p| (p as f64 - mean) * (p as f64 - mean))
        .sum::<f64>()
        / probs.len() as f64;
    println!(
        "Posterior predictive: mean={:.4}, std={:.4} (label rate {:.4})",
        mean,
        var.sqrt(),
        dataset.positive_rate()
    );

    tracing::info!("Training complete!");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    // End-to-end fit on synthetic labels: the posterior predictive
    // mean should land near the base rate. Exercises the full
    // forward / KL / backward / Adam path.
    #[test]
    fn test_fit_recovers_base_rate() {
        let device = burn::backend::ndarray::NdArrayDevice::default();
        TrainBackend::seed(7);

        let n = 200usize;
        let rate = 0.8;
        let labels: Vec<f64> = (0..n).map(|i| if i % 5 == 0 { 0.0 } else { 1.0 }).collect();
        let dataset = BinaryDataset::new(labels).unwrap();
        assert_eq!(dataset.positive_rate(), rate);

        let model_cfg = NullBernoulliModelConfig::new()
            .with_num_samples(25)
            .with_size(n);
        let mut model: NullBernoulliModel<TrainBackend> = model_cfg.init(&device).unwrap();
        let mut optim = AdamConfig::new().init();

        let inputs = Tensor::<TrainBackend, 2>::zeros([n, 1], &device);
        let targets_vec: Vec<f32> = dataset.labels().iter().map(|&v| v as f32).collect();
        let targets = Tensor::<TrainBackend, 1>::from_floats(targets_vec.as_slice(), &device);

        let (first_loss, _) = model.forward_loss(inputs.clone(), targets.clone()).unwrap();
        let first: f64 = first_loss.into_scalar().elem::<f64>();

        let mut last = first;
        for _ in 0..400 {
            let (loss, _) = model.forward_loss(inputs.clone(), targets.clone()).unwrap();
            last = loss.clone().into_scalar().elem::<f64>();
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(0.05, model, grads);
        }
        assert!(last < first, "loss should decrease: {last} vs {first}");

        let model_valid: NullBernoulliModel<EvalBackend> = model.valid();
        let out = model_valid
            .forward(Tensor::<EvalBackend, 2>::zeros([1, 1], &device))
            .unwrap();
        let probs: Vec<f32> = out.probs.to_data().iter::<f32>().collect();
        let mean = probs.iter().map(|&p| p as f64).sum::<f64>() / probs.len() as f64;
        assert!(
            (mean - rate).abs() < 0.15,
            "posterior predictive mean {mean} should approach {rate}"
        );
    }
}
