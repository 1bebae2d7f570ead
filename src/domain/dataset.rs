use serde::{Deserialize, Serialize};

/// Binary labels the null model is fitted against.
/// Labels are 0.0 / 1.0; anything else is rejected at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryDataset {
    labels: Vec<f64>,
}

impl BinaryDataset {
    pub fn new(labels: Vec<f64>) -> anyhow::Result<Self> {
        anyhow::ensure!(!labels.is_empty(), "dataset must contain at least one label");
        if let Some(bad) = labels.iter().find(|&&v| v != 0.0 && v != 1.0) {
            anyhow::bail!("labels must be 0 or 1, found {bad}");
        }
        Ok(Self { labels })
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fraction of positive labels, the quantity the null model's
    /// posterior predictive should recover.
    pub fn positive_rate(&self) -> f64 {
        self.labels.iter().sum::<f64>() / self.labels.len() as f64
    }
}

/// One reader's predicted scores over the shared instance set.
/// A "reader" is any independent prediction source: a human rater,
/// a model variant, a Monte-Carlo predictive mean.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderPredictions {
    pub name: String,
    pub y_pred: Vec<f64>,
}

/// True labels plus one or more reader prediction columns, the input
/// to the evaluation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSet {
    pub y_true: Vec<f64>,
    pub readers: Vec<ReaderPredictions>,
}

impl EvaluationSet {
    pub fn len(&self) -> usize {
        self.y_true.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y_true.is_empty()
    }

    pub fn reader_count(&self) -> usize {
        self.readers.len()
    }

    /// Prediction columns as plain slices-of-vectors for the bootstrap
    /// estimator.
    pub fn prediction_matrix(&self) -> Vec<&[f64]> {
        self.readers.iter().map(|r| r.y_pred.as_slice()).collect()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_binary_labels() {
        assert!(BinaryDataset::new(vec![0.0, 0.5, 1.0]).is_err());
        assert!(BinaryDataset::new(vec![]).is_err());
    }

    #[test]
    fn test_positive_rate() {
        let ds = BinaryDataset::new(vec![1.0, 0.0, 1.0, 1.0]).unwrap();
        assert_eq!(ds.positive_rate(), 0.75);
    }
}
