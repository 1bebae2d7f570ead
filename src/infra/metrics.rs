// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch so
// learning curves can be inspected or plotted later.
//
// Metrics recorded per epoch:
//   - epoch: the epoch number (1, 2, 3, ...)
//   - nll:   Monte-Carlo expected Bernoulli NLL
//   - kl:    scaled KL divergence contribution
//   - elbo:  nll + kl, the full training loss (lower is better)
//
// Output file: checkpoints/metrics.csv

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics data for a single training epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    /// Monte-Carlo expected NLL over the training labels.
    pub nll: f64,
    /// KL divergence term, already divided by the dataset size.
    pub kl: f64,
    /// The negative evidence lower bound being minimised.
    pub elbo: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, nll: f64, kl: f64, elbo: f64) -> Self {
        Self { epoch, nll, kl, elbo }
    }

    /// True if this epoch improved on the previous best loss.
    pub fn is_improvement(&self, best_elbo: f64) -> bool {
        self.elbo < best_elbo
    }
}

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so a
    /// resumed run appends instead of clobbering earlier epochs.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,nll,kl,elbo")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{},{:.6},{:.6},{:.6}", m.epoch, m.nll, m.kl, m.elbo)?;
        tracing::debug!(
            "Logged epoch {} metrics: nll={:.4}, kl={:.4}",
            m.epoch,
            m.nll,
            m.kl,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 0.6, 0.02, 0.62);
        assert!(m.is_improvement(0.8));
        assert!(!m.is_improvement(0.5));
    }
}
