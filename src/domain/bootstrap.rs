// ============================================================
// Layer 3 — Bootstrap Confidence Intervals
// ============================================================
// Percentile-bootstrap confidence intervals for an arbitrary
// scalar score over paired true/predicted labels.
//
// The procedure resamples instances (and readers, when several
// prediction sets are supplied) uniformly with replacement,
// recomputes the score on each resample, and reads the interval
// bounds off the sorted bootstrap distribution with nearest-rank
// indexing. No interpolation between ranks.
//
// Randomness is drawn from a locally constructed `StdRng`: a
// supplied seed makes the whole resampling sequence reproducible,
// and concurrent calls with different seeds can never interfere
// through shared global state.
//
// Reference: Efron & Tibshirani (1993), An Introduction to the
//            Bootstrap

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Failure modes of the bootstrap procedure. All of them abort the
/// single call that triggered them; retrying with the same inputs is
/// pointless, retrying with a different seed or relaxed rejection
/// policy is the caller's decision.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("length mismatch: y_true has {expected} entries but reader {reader} has {got}")]
    LengthMismatch {
        reader: usize,
        expected: usize,
        got: usize,
    },

    #[error("at least one reader prediction sequence is required")]
    NoReaders,

    #[error(
        "insufficient bootstrap samples: all {rejected} resamples were rejected as \
         single-class; check the label balance or disable reject_one_class_samples"
    )]
    InsufficientBootstrapSamples { rejected: usize },
}

/// Tuning knobs for the resampling procedure.
///
/// `seed: None` is an explicit choice of non-reproducibility: repeated
/// runs will draw different resamples and report (slightly) different
/// intervals.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Number of resampling iterations.
    pub n_bootstraps: usize,
    /// Two-sided coverage of the interval, e.g. 0.95.
    pub confidence_level: f64,
    /// Seed for the locally scoped random generator.
    pub seed: Option<u64>,
    /// Discard resamples whose label draw contains fewer than two
    /// distinct classes. Scores like AUC are undefined there.
    pub reject_one_class_samples: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            n_bootstraps: 2000,
            confidence_level: 0.95,
            seed: None,
            reject_one_class_samples: true,
        }
    }
}

/// Result of [`score_ci`]: the unresampled point estimate, the interval
/// bounds, and the raw accepted bootstrap scores.
#[derive(Debug, Clone)]
pub struct ScoreCi {
    /// `score_fun(y_true, y_pred)` on the full, unresampled data.
    pub point: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub scores: Vec<f64>,
}

/// Result of [`score_stat_ci`]. Unlike [`ScoreCi::point`], the first
/// value here is the mean of the accepted bootstrap scores.
#[derive(Debug, Clone)]
pub struct ScoreStatCi {
    pub mean_score: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub scores: Vec<f64>,
}

/// Point estimate and bootstrap confidence interval for a single
/// reader's predictions.
///
/// The point estimate is computed once on the full data; the interval
/// comes from [`score_stat_ci`] with this reader as the only one.
pub fn score_ci<F>(
    y_true: &[f64],
    y_pred: &[f64],
    score_fun: F,
    opts: &BootstrapOptions,
) -> Result<ScoreCi, BootstrapError>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    if y_true.len() != y_pred.len() {
        return Err(BootstrapError::LengthMismatch {
            reader: 0,
            expected: y_true.len(),
            got: y_pred.len(),
        });
    }

    let point = score_fun(y_true, y_pred);
    let stat = score_stat_ci(y_true, &[y_pred], &score_fun, mean, opts)?;

    Ok(ScoreCi {
        point,
        ci_lower: stat.ci_lower,
        ci_upper: stat.ci_upper,
        scores: stat.scores,
    })
}

/// Bootstrap interval for a score aggregated over several readers.
///
/// Each iteration draws a set of reader indices and a set of instance
/// indices, both uniform with replacement; evaluates `score_fun` for
/// every drawn reader on the shared instance resample; and collapses
/// the per-reader scores with `stat_fun` into one bootstrap score.
pub fn score_stat_ci<P, F, S>(
    y_true: &[f64],
    y_preds: &[P],
    score_fun: F,
    stat_fun: S,
    opts: &BootstrapOptions,
) -> Result<ScoreStatCi, BootstrapError>
where
    P: AsRef<[f64]>,
    F: Fn(&[f64], &[f64]) -> f64,
    S: Fn(&[f64]) -> f64,
{
    if y_preds.is_empty() {
        return Err(BootstrapError::NoReaders);
    }
    for (reader, preds) in y_preds.iter().enumerate() {
        if preds.as_ref().len() != y_true.len() {
            return Err(BootstrapError::LengthMismatch {
                reader,
                expected: y_true.len(),
                got: preds.as_ref().len(),
            });
        }
    }

    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let n = y_true.len();
    let n_readers = y_preds.len();
    let mut scores = Vec::with_capacity(opts.n_bootstraps);
    let mut rejected = 0usize;

    // resample buffers, reused across iterations
    let mut true_sample = vec![0.0; n];
    let mut pred_sample = vec![0.0; n];
    let mut reader_scores = Vec::with_capacity(n_readers);

    for _ in 0..opts.n_bootstraps {
        let readers: Vec<usize> = (0..n_readers).map(|_| rng.gen_range(0..n_readers)).collect();
        let indices: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        for (slot, &i) in true_sample.iter_mut().zip(&indices) {
            *slot = y_true[i];
        }
        if opts.reject_one_class_samples && single_class(&true_sample) {
            // the iteration contributes nothing; no replacement draw
            rejected += 1;
            continue;
        }

        reader_scores.clear();
        for &reader in &readers {
            let preds = y_preds[reader].as_ref();
            for (slot, &i) in pred_sample.iter_mut().zip(&indices) {
                *slot = preds[i];
            }
            reader_scores.push(score_fun(&true_sample, &pred_sample));
        }
        scores.push(stat_fun(&reader_scores));
    }

    if scores.is_empty() {
        return Err(BootstrapError::InsufficientBootstrapSamples { rejected });
    }

    let mean_score = mean(&scores);
    let mut sorted = scores.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));

    // nearest-rank quantiles, clamped to the last valid index
    let alpha = (1.0 - opts.confidence_level) / 2.0;
    let last = sorted.len() - 1;
    let lower_idx = ((alpha * sorted.len() as f64).round() as usize).min(last);
    let upper_idx = (((1.0 - alpha) * sorted.len() as f64).round() as usize).min(last);

    Ok(ScoreStatCi {
        mean_score,
        ci_lower: sorted[lower_idx],
        ci_upper: sorted[upper_idx],
        scores,
    })
}

/// Arithmetic mean, the default `stat_fun` for aggregating readers.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn single_class(labels: &[f64]) -> bool {
    labels.windows(2).all(|w| w[0] == w[1])
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::scores::accuracy;

    fn variance(values: &[f64]) -> f64 {
        let m = mean(values);
        values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_point_estimate_equals_score_fun() {
        let y_true = vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let y_pred = vec![0.2, 0.8, 0.4, 0.1, 0.9, 0.6];
        let opts = BootstrapOptions {
            n_bootstraps: 1,
            seed: Some(7),
            reject_one_class_samples: false,
            ..Default::default()
        };
        let result = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap();
        // regardless of bootstrap count, the point estimate is the
        // score on the full unresampled data
        assert_eq!(result.point, accuracy(&y_true, &y_pred));
        assert_eq!(result.scores.len(), 1);
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let y_true = vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        let y_pred = vec![0.2, 0.8, 0.4, 0.1, 0.9, 0.6, 0.7, 0.55];
        let opts = BootstrapOptions {
            n_bootstraps: 50,
            seed: Some(1234),
            reject_one_class_samples: false,
            ..Default::default()
        };
        let a = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap();
        let b = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap();
        assert_eq!(a.point, b.point);
        assert_eq!(a.ci_lower, b.ci_lower);
        assert_eq!(a.ci_upper, b.ci_upper);
        assert_eq!(a.scores, b.scores);
    }

    #[test]
    fn test_length_mismatch_fails_fast() {
        let y_true = vec![0.0, 1.0, 1.0];
        let y_pred = vec![0.2, 0.8];
        let err = score_ci(&y_true, &y_pred, accuracy, &BootstrapOptions::default()).unwrap_err();
        assert!(matches!(err, BootstrapError::LengthMismatch { .. }));
    }

    #[test]
    fn test_no_readers_is_an_error() {
        let y_true = vec![0.0, 1.0];
        let empty: Vec<Vec<f64>> = Vec::new();
        let err = score_stat_ci(&y_true, &empty, accuracy, mean, &BootstrapOptions::default())
            .unwrap_err();
        assert!(matches!(err, BootstrapError::NoReaders));
    }

    #[test]
    fn test_all_rejected_reports_insufficient_samples() {
        // every resample of single-class labels is single-class
        let y_true = vec![1.0, 1.0, 1.0, 1.0];
        let y_pred = vec![0.9, 0.8, 0.7, 0.95];
        let opts = BootstrapOptions {
            n_bootstraps: 25,
            seed: Some(3),
            ..Default::default()
        };
        let err = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap_err();
        match err {
            BootstrapError::InsufficientBootstrapSamples { rejected } => assert_eq!(rejected, 25),
            other => panic!("expected InsufficientBootstrapSamples, got {other:?}"),
        }
    }

    #[test]
    fn test_perfect_predictions_scenario() {
        // perfect predictions at threshold 0.5: every resample that
        // survives the one-class check still scores 1.0
        let y_true = vec![0.0, 1.0, 1.0, 0.0, 1.0];
        let y_pred = vec![0.1, 0.9, 0.8, 0.2, 0.7];
        let opts = BootstrapOptions {
            n_bootstraps: 500,
            seed: Some(42),
            ..Default::default()
        };
        let result = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap();
        assert_eq!(result.point, 1.0);
        assert!(result.ci_lower <= 1.0 && 1.0 <= result.ci_upper);
        assert!(result.scores.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_multi_reader_aggregation() {
        let y_true = vec![0.0, 1.0, 1.0, 0.0, 1.0, 0.0];
        let readers = vec![
            vec![0.2, 0.8, 0.7, 0.3, 0.9, 0.1],
            vec![0.4, 0.6, 0.2, 0.45, 0.8, 0.3],
        ];
        let opts = BootstrapOptions {
            n_bootstraps: 200,
            seed: Some(9),
            ..Default::default()
        };
        let result = score_stat_ci(&y_true, &readers, accuracy, mean, &opts).unwrap();
        assert!(result.ci_lower <= result.mean_score);
        assert!(result.mean_score <= result.ci_upper);
        assert!(!result.scores.is_empty());
    }

    #[test]
    fn test_more_bootstraps_stabilise_interval_width() {
        // distributional property: across repeated seeded runs, the
        // width of the interval fluctuates less with more resamples
        let y_true: Vec<f64> = (0..40).map(|i| (i % 2) as f64).collect();
        let y_pred: Vec<f64> = y_true
            .iter()
            .enumerate()
            .map(|(i, &y)| {
                let noisy = if i % 5 == 0 { 1.0 - y } else { y };
                noisy * 0.8 + 0.1
            })
            .collect();

        let widths = |n_bootstraps: usize| -> Vec<f64> {
            (0..30u64)
                .map(|seed| {
                    let opts = BootstrapOptions {
                        n_bootstraps,
                        seed: Some(seed),
                        ..Default::default()
                    };
                    let r = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap();
                    r.ci_upper - r.ci_lower
                })
                .collect()
        };

        let coarse = variance(&widths(10));
        let fine = variance(&widths(2000));
        assert!(
            fine < coarse,
            "width variance should shrink with more resamples: {fine} vs {coarse}"
        );
    }

    #[test]
    fn test_quantile_index_clamped_for_tiny_bootstraps() {
        // round((1 - alpha/2) * N) lands past the end for small N;
        // the index must clamp instead of panicking
        let y_true = vec![0.0, 1.0, 0.0, 1.0];
        let y_pred = vec![0.1, 0.9, 0.2, 0.8];
        let opts = BootstrapOptions {
            n_bootstraps: 3,
            seed: Some(11),
            reject_one_class_samples: false,
            ..Default::default()
        };
        let result = score_ci(&y_true, &y_pred, accuracy, &opts).unwrap();
        assert!(result.ci_lower <= result.ci_upper);
    }
}
