// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a variational fit of the null model:
//
//   Step 1: Load labels (CSV or synthetic)   (Layer 4 - data)
//   Step 2: Validate the dataset             (Layer 3 - domain)
//   Step 3: Save config for evaluation       (Layer 6 - infra)
//   Step 4: Run the training loop            (Layer 5 - ml)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::loader::CsvPredictionLoader;
use crate::data::synthetic::SyntheticLabels;
use crate::domain::traits::LabelSource;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs, serialisable so evaluation can rebuild the
// exact model later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// CSV with a label column; when absent, synthetic labels are
    /// generated instead.
    pub labels_csv: Option<String>,
    pub checkpoint_dir: String,
    pub epochs: usize,
    pub lr: f64,
    /// Monte-Carlo draws per forward pass.
    pub num_samples: usize,
    /// Bernstein degree M of the bias warp.
    pub degree: usize,
    /// Backend seed; None means a fresh noise stream per run.
    pub seed: Option<u64>,
    /// Print an epoch line every this many epochs.
    pub log_every: usize,
    pub synthetic_n: usize,
    pub synthetic_rate: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            labels_csv: None,
            checkpoint_dir: "checkpoints".to_string(),
            epochs: 500,
            lr: 5e-2,
            num_samples: 10,
            degree: 2,
            seed: None,
            log_every: 50,
            synthetic_n: 500,
            synthetic_rate: 0.7,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Load labels ───────────────────────────────────────────────
        let source: Box<dyn LabelSource> = match &cfg.labels_csv {
            Some(path) => {
                tracing::info!("Loading labels from '{}'", path);
                Box::new(CsvPredictionLoader::new(path.clone()))
            }
            None => {
                tracing::info!(
                    "No label file given; generating {} synthetic labels at rate {}",
                    cfg.synthetic_n,
                    cfg.synthetic_rate
                );
                Box::new(SyntheticLabels::new(
                    cfg.synthetic_n,
                    cfg.synthetic_rate,
                    cfg.seed.unwrap_or(0),
                ))
            }
        };

        // ── Step 2: Validate the dataset ──────────────────────────────────────
        let dataset = source.load_labels()?;
        tracing::info!(
            "Dataset: {} labels, {:.1}% positive",
            dataset.len(),
            dataset.positive_rate() * 100.0
        );

        // ── Step 3: Save config for evaluation ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(cfg.checkpoint_dir.clone());
        ckpt_manager.save_config(cfg)?;

        // ── Step 4: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, dataset, ckpt_manager)?;

        Ok(())
    }
}
