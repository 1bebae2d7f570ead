// ============================================================
// Layer 3 — Scoring Functions
// ============================================================
// Pure scalar scores over paired label/prediction slices.
// Every function here is a plain `(labels, scores) -> f64` map,
// which is exactly the shape the bootstrap estimator expects
// for its `score_fun` argument.
//
// No tensors, no I/O: these run on `&[f64]` so they can be
// tested in isolation and reused by any caller.

/// Mean Bernoulli log-likelihood of predicted probabilities.
///
/// `log_score = mean( y·ln(p) + (1-y)·ln(1-p) )`
///
/// Undefined (±infinity) when a prediction is exactly 0 or 1 for the
/// respective class. Callers that cannot rule this out must clip their
/// predictions away from the boundaries first; see
/// [`clip_probabilities`].
pub fn log_score(y_obs: &[f64], y_pred: &[f64]) -> f64 {
    let n = y_obs.len();
    if n == 0 {
        return f64::NAN;
    }
    let total: f64 = y_obs
        .iter()
        .zip(y_pred)
        .map(|(&y, &p)| y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        .sum();
    total / n as f64
}

/// Clip probabilities into `[eps, 1-eps]` so the log score stays finite.
pub fn clip_probabilities(y_pred: &[f64], eps: f64) -> Vec<f64> {
    y_pred.iter().map(|&p| p.clamp(eps, 1.0 - eps)).collect()
}

/// Classification accuracy of scores thresholded at `threshold`.
pub fn accuracy_at(y_true: &[f64], y_score: &[f64], threshold: f64) -> f64 {
    let n = y_true.len();
    if n == 0 {
        return f64::NAN;
    }
    let correct = y_true
        .iter()
        .zip(y_score)
        .filter(|(&y, &s)| (s >= threshold) == (y > 0.5))
        .count();
    correct as f64 / n as f64
}

/// Classification accuracy at the conventional 0.5 threshold.
pub fn accuracy(y_true: &[f64], y_score: &[f64]) -> f64 {
    accuracy_at(y_true, y_score, 0.5)
}

/// One ROC operating point per distinct score threshold.
///
/// The three vectors are parallel: `(fpr[k], tpr[k])` is the operating
/// point obtained by predicting positive for `score >= thresholds[k]`.
/// This is the numeric input consumed by external ROC plotting; the
/// rendering itself is out of scope here.
#[derive(Debug, Clone)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Sweep all distinct score values (descending) and record the
/// false-positive / true-positive rates at each threshold.
///
/// A leading `(0, 0)` point with a threshold above the maximum score is
/// prepended so the curve always starts at the origin. If the labels
/// contain only one class the rates for the missing class are NaN; the
/// bootstrap estimator's one-class rejection keeps resampled inputs out
/// of that regime.
pub fn roc_curve(y_true: &[f64], y_score: &[f64]) -> RocCurve {
    let n = y_true.len();
    let pos = y_true.iter().filter(|&&y| y > 0.5).count() as f64;
    let neg = n as f64 - pos;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| y_score[b].total_cmp(&y_score[a]));

    let max_score = order
        .first()
        .map(|&i| y_score[i])
        .unwrap_or(f64::NEG_INFINITY);

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![max_score + 1.0];

    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut k = 0;
    while k < n {
        let threshold = y_score[order[k]];
        // consume every instance tied at this threshold before
        // emitting the operating point
        while k < n && y_score[order[k]] == threshold {
            if y_true[order[k]] > 0.5 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            k += 1;
        }
        fpr.push(fp / neg);
        tpr.push(tp / pos);
        thresholds.push(threshold);
    }

    RocCurve { fpr, tpr, thresholds }
}

/// Area under the ROC curve via the trapezoidal rule.
///
/// Usable directly as a `score_fun` for the bootstrap estimator, which
/// is its primary role here: bootstrapping AUC confidence intervals.
pub fn roc_auc(y_true: &[f64], y_score: &[f64]) -> f64 {
    let curve = roc_curve(y_true, y_score);
    let mut auc = 0.0;
    for k in 1..curve.fpr.len() {
        auc += (curve.fpr[k] - curve.fpr[k - 1]) * (curve.tpr[k] + curve.tpr[k - 1]) / 2.0;
    }
    auc
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_score_perfect_predictions_near_zero() {
        let y = vec![0.0, 1.0, 1.0, 0.0];
        // predictions equal to the labels, clipped away from 0/1
        let p = clip_probabilities(&y, 1e-6);
        let score = log_score(&y, &p);
        assert!(score < 0.0, "log score approaches 0 from below");
        assert!(score > -1e-5, "clipped perfect predictions score near 0, got {score}");
    }

    #[test]
    fn test_log_score_inverted_predictions_large_negative() {
        let y = vec![0.0, 1.0, 1.0, 0.0];
        let inverted: Vec<f64> = y.iter().map(|&v| 1.0 - v).collect();
        let p = clip_probabilities(&inverted, 1e-6);
        assert!(log_score(&y, &p) < -10.0);
    }

    #[test]
    fn test_accuracy_threshold() {
        let y = vec![0.0, 1.0, 1.0, 0.0];
        let s = vec![0.1, 0.9, 0.4, 0.2];
        assert_eq!(accuracy(&y, &s), 0.75);
        // lowering the threshold flips the 0.4 prediction to positive
        assert_eq!(accuracy_at(&y, &s, 0.3), 1.0);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let y = vec![0.0, 0.0, 1.0, 1.0];
        let s = vec![0.1, 0.2, 0.8, 0.9];
        assert!((roc_auc(&y, &s) - 1.0).abs() < 1e-12);
        let s_inv = vec![0.9, 0.8, 0.2, 0.1];
        assert!(roc_auc(&y, &s_inv).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_ties_give_half() {
        // all scores identical: the curve is the single diagonal segment
        let y = vec![0.0, 1.0, 0.0, 1.0];
        let s = vec![0.5, 0.5, 0.5, 0.5];
        assert!((roc_auc(&y, &s) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_roc_curve_starts_at_origin() {
        let y = vec![0.0, 1.0];
        let s = vec![0.3, 0.7];
        let curve = roc_curve(&y, &s);
        assert_eq!((curve.fpr[0], curve.tpr[0]), (0.0, 0.0));
        assert!(curve.thresholds[0] > 0.7);
        // one point per distinct threshold plus the origin
        assert_eq!(curve.fpr.len(), 3);
    }
}
