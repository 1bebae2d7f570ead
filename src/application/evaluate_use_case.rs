// ============================================================
// Layer 2 — EvaluateUseCase
// ============================================================
// Scores predictions against true labels with bootstrap
// confidence intervals:
//
//   Step 1: Load the evaluation CSV          (Layer 4 - data)
//   Step 2: Accuracy CI + AUC CI + log score (Layer 3 - domain)
//   Step 3: Optional checkpoint scoring      (Layer 5 - ml)
//   Step 4: Print / persist the report       (Layer 2 + serde)
//
// With one reader column the intervals come from score_ci (point
// estimate on the full data); with several, from score_stat_ci
// with mean aggregation across readers.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::data::loader::CsvPredictionLoader;
use crate::domain::bootstrap::{mean, score_ci, score_stat_ci, BootstrapOptions};
use crate::domain::dataset::EvaluationSet;
use crate::domain::scores::{accuracy_at, clip_probabilities, log_score, roc_auc};
use crate::domain::traits::PredictionSource;
use crate::ml::predictor::PosteriorPredictor;

/// Probabilities are clipped this far away from 0/1 before the log
/// score so perfectly confident readers stay finite.
const LOG_SCORE_EPS: f64 = 1e-7;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateConfig {
    pub predictions_csv: String,
    /// When set, also score the trained model from this checkpoint.
    pub checkpoint_dir: Option<String>,
    pub n_bootstraps: usize,
    pub confidence_level: f64,
    pub seed: Option<u64>,
    pub reject_one_class_samples: bool,
    /// Decision threshold for the accuracy score.
    pub threshold: f64,
    /// Optional JSON output path for the report.
    pub report_path: Option<String>,
}

impl Default for EvaluateConfig {
    fn default() -> Self {
        Self {
            predictions_csv: "predictions.csv".to_string(),
            checkpoint_dir: None,
            n_bootstraps: 2000,
            confidence_level: 0.95,
            seed: None,
            reject_one_class_samples: true,
            threshold: 0.5,
            report_path: None,
        }
    }
}

/// A point (or reader-mean) estimate with its interval bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiSummary {
    pub estimate: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub instances: usize,
    pub readers: usize,
    pub confidence_level: f64,
    pub accuracy: CiSummary,
    pub auc: CiSummary,
    /// Mean clipped log score across readers.
    pub log_score: f64,
    /// Monte-Carlo NLL of the checkpointed model, when requested.
    pub model_nll: Option<f64>,
    /// Log score of the model's predictive means, when requested.
    pub model_log_score: Option<f64>,
}

// ─── EvaluateUseCase ──────────────────────────────────────────────────────────
pub struct EvaluateUseCase {
    config: EvaluateConfig,
}

impl EvaluateUseCase {
    pub fn new(config: EvaluateConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvaluationReport> {
        let cfg = &self.config;

        // ── Step 1: Load the evaluation set ───────────────────────────────────
        let set = CsvPredictionLoader::new(cfg.predictions_csv.clone()).load()?;
        anyhow::ensure!(
            set.reader_count() > 0,
            "'{}' has no prediction columns to evaluate",
            cfg.predictions_csv
        );

        let opts = BootstrapOptions {
            n_bootstraps: cfg.n_bootstraps,
            confidence_level: cfg.confidence_level,
            seed: cfg.seed,
            reject_one_class_samples: cfg.reject_one_class_samples,
        };

        // ── Step 2: Bootstrap intervals and log score ─────────────────────────
        let threshold = cfg.threshold;
        let accuracy_ci =
            self.interval(&set, &opts, |y, p| accuracy_at(y, p, threshold))?;
        let auc_ci = self.interval(&set, &opts, roc_auc)?;

        let reader_log_score = mean(
            &set.readers
                .iter()
                .map(|r| log_score(&set.y_true, &clip_probabilities(&r.y_pred, LOG_SCORE_EPS)))
                .collect::<Vec<_>>(),
        );

        // ── Step 3: Optional model scoring from a checkpoint ──────────────────
        let (model_nll, model_log_score) = match &cfg.checkpoint_dir {
            Some(dir) => {
                let predictor = PosteriorPredictor::from_checkpoint(dir)?;
                let nll = predictor.nll(&set.y_true)?;
                let means = predictor.predictive_means(set.len())?;
                let ls = log_score(&set.y_true, &clip_probabilities(&means, LOG_SCORE_EPS));
                (Some(nll), Some(ls))
            }
            None => (None, None),
        };

        let report = EvaluationReport {
            instances: set.len(),
            readers: set.reader_count(),
            confidence_level: cfg.confidence_level,
            accuracy: accuracy_ci,
            auc: auc_ci,
            log_score: reader_log_score,
            model_nll,
            model_log_score,
        };

        // ── Step 4: Print and persist ─────────────────────────────────────────
        self.print(&report);
        if let Some(path) = &cfg.report_path {
            std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
            tracing::info!("Wrote evaluation report to '{}'", path);
        }

        Ok(report)
    }

    /// One bootstrap interval for the given score function, routed
    /// through score_ci or score_stat_ci depending on reader count.
    fn interval<F>(
        &self,
        set: &EvaluationSet,
        opts: &BootstrapOptions,
        score_fun: F,
    ) -> Result<CiSummary>
    where
        F: Fn(&[f64], &[f64]) -> f64,
    {
        if set.reader_count() == 1 {
            let r = score_ci(&set.y_true, &set.readers[0].y_pred, score_fun, opts)?;
            Ok(CiSummary { estimate: r.point, ci_lower: r.ci_lower, ci_upper: r.ci_upper })
        } else {
            let matrix = set.prediction_matrix();
            let r = score_stat_ci(&set.y_true, &matrix, score_fun, mean, opts)?;
            Ok(CiSummary {
                estimate: r.mean_score,
                ci_lower: r.ci_lower,
                ci_upper: r.ci_upper,
            })
        }
    }

    fn print(&self, report: &EvaluationReport) {
        let level = report.confidence_level * 100.0;
        println!(
            "Evaluated {} instances across {} reader(s)",
            report.instances, report.readers
        );
        println!(
            "Accuracy  : {:.4}  [{:.4}, {:.4}] @ {:.0}%",
            report.accuracy.estimate, report.accuracy.ci_lower, report.accuracy.ci_upper, level
        );
        println!(
            "AUC       : {:.4}  [{:.4}, {:.4}] @ {:.0}%",
            report.auc.estimate, report.auc.ci_lower, report.auc.ci_upper, level
        );
        println!("Log score : {:.4}", report.log_score);
        if let (Some(nll), Some(ls)) = (report.model_nll, report.model_log_score) {
            println!("Model NLL : {:.4}", nll);
            println!("Model LS  : {:.4}", ls);
        }
    }
}
