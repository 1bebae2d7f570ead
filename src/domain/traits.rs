// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer programs against these traits, not
// against concrete loaders, so a different input format only
// touches Layer 4.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;

use crate::domain::dataset::{BinaryDataset, EvaluationSet};

// ─── LabelSource ──────────────────────────────────────────────────────────────
/// Any component that can produce the binary labels a training run
/// fits against.
///
/// Implementations:
///   - CsvPredictionLoader -> first column of a CSV file
///   - SyntheticLabels     -> seeded Bernoulli draws
pub trait LabelSource {
    fn load_labels(&self) -> Result<BinaryDataset>;
}

// ─── PredictionSource ─────────────────────────────────────────────────────────
/// Any component that can produce a full evaluation set: true labels
/// plus one or more reader prediction columns.
///
/// Implementations:
///   - CsvPredictionLoader -> labels and reader columns from a CSV file
pub trait PredictionSource {
    fn load(&self) -> Result<EvaluationSet>;
}
