// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `evaluate`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::evaluate_use_case::EvaluateConfig;
use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit the variational null model to binary labels
    Train(TrainArgs),

    /// Score predictions with bootstrap confidence intervals
    Evaluate(EvaluateArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// CSV file whose first column holds 0/1 labels; omit to train
    /// on synthetic labels instead
    #[arg(long)]
    pub labels_csv: Option<String>,

    /// Directory to save model checkpoints and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Number of full-batch optimisation steps
    #[arg(long, default_value_t = 500)]
    pub epochs: usize,

    /// Adam learning rate
    #[arg(long, default_value_t = 5e-2)]
    pub lr: f64,

    /// Monte-Carlo draws per forward pass; more draws lower the
    /// gradient variance at linear cost
    #[arg(long, default_value_t = 10)]
    pub num_samples: usize,

    /// Bernstein degree M of the bias warp (minimum 2); higher
    /// degrees buy a more flexible posterior shape
    #[arg(long, default_value_t = 2)]
    pub degree: usize,

    /// Backend seed for reproducible noise draws
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print an epoch line every N epochs
    #[arg(long, default_value_t = 50)]
    pub log_every: usize,

    /// Synthetic dataset size (used when --labels-csv is absent)
    #[arg(long, default_value_t = 500)]
    pub synthetic_n: usize,

    /// Synthetic positive-label rate
    #[arg(long, default_value_t = 0.7)]
    pub synthetic_rate: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2; the
/// application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            labels_csv: a.labels_csv,
            checkpoint_dir: a.checkpoint_dir,
            epochs: a.epochs,
            lr: a.lr,
            num_samples: a.num_samples,
            degree: a.degree,
            seed: a.seed,
            log_every: a.log_every.max(1),
            synthetic_n: a.synthetic_n,
            synthetic_rate: a.synthetic_rate,
        }
    }
}

/// All arguments for the `evaluate` command
#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// CSV with a y_true column followed by one prediction column
    /// per reader
    #[arg(long)]
    pub predictions_csv: String,

    /// Also score the trained model saved in this checkpoint
    /// directory (Monte-Carlo NLL and log score)
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Number of bootstrap resamples
    #[arg(long, default_value_t = 2000)]
    pub n_bootstraps: usize,

    /// Two-sided interval coverage
    #[arg(long, default_value_t = 0.95)]
    pub confidence_level: f64,

    /// Seed for reproducible resampling; omit for a fresh stream
    #[arg(long)]
    pub seed: Option<u64>,

    /// Keep resamples whose labels collapse to a single class
    /// (scores like AUC are undefined there)
    #[arg(long, default_value_t = false)]
    pub keep_one_class_samples: bool,

    /// Decision threshold for the accuracy score
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f64,

    /// Write the report as JSON to this path
    #[arg(long)]
    pub report_path: Option<String>,
}

impl From<EvaluateArgs> for EvaluateConfig {
    fn from(a: EvaluateArgs) -> Self {
        EvaluateConfig {
            predictions_csv: a.predictions_csv,
            checkpoint_dir: a.checkpoint_dir,
            n_bootstraps: a.n_bootstraps,
            confidence_level: a.confidence_level,
            seed: a.seed,
            reject_one_class_samples: !a.keep_one_class_samples,
            threshold: a.threshold,
            report_path: a.report_path,
        }
    }
}
